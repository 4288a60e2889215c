//! Domain records handed to the host.

use chrono::{DateTime, Utc};

/// Base URL for station logos.
const LOGO_BASE_URL: &str = "https://media.cinergy.ch/t_station";

/// A TV station available for streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Stable backend station id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Logo URL, derived from `id`.
    pub logo_url: String,
}

impl Channel {
    /// Creates a channel, deriving the logo URL from the id.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            logo_url: format!("{LOGO_BASE_URL}/{id}/icon320_dark.png"),
        }
    }
}

/// One broadcast occurrence in the program guide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpgEntry {
    /// Backend broadcast id.
    pub broadcast_id: i64,
    /// Channel the broadcast airs on.
    pub channel_id: i64,
    /// Title.
    pub title: String,
    /// Original-language title.
    pub original_title: String,
    /// Episode name (`subtitle`).
    pub episode_name: String,
    /// Short plot outline (`headline`).
    pub plot_outline: String,
    /// Plot (`short_description`).
    pub plot: String,
    /// Genre label (`type`).
    pub genre: String,
    /// Broadcast start.
    pub start: DateTime<Utc>,
    /// Broadcast end.
    pub end: DateTime<Utc>,
    /// Production year.
    pub year: Option<i32>,
    /// Season number.
    pub season: Option<i32>,
    /// Episode number.
    pub episode: Option<i32>,
}

/// A planned recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    /// Backend recording id (also the EPG uid).
    pub id: i64,
    /// Channel the recording is scheduled on.
    pub channel_id: i64,
    /// Title.
    pub title: String,
    /// Summary (`subtitle`).
    pub summary: String,
    /// Scheduled start.
    pub start: DateTime<Utc>,
    /// Scheduled end.
    pub end: DateTime<Utc>,
}

/// A completed recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// Backend recording id.
    pub id: String,
    /// Channel the recording was made on.
    pub channel_id: i64,
    /// Channel name, empty when the channel is not in the lineup.
    pub channel_name: String,
    /// Channel logo, empty when the channel is not in the lineup.
    pub icon_url: String,
    /// Title.
    pub title: String,
    /// Episode name.
    pub episode_name: String,
    /// Plot.
    pub plot: String,
    /// Plot outline.
    pub plot_outline: String,
    /// Start of the recorded broadcast.
    pub recorded_at: DateTime<Utc>,
    /// Duration in seconds.
    pub duration_secs: i64,
    /// EPG event id of the recorded broadcast.
    pub epg_event_id: i64,
}
