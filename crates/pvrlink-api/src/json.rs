//! JSON envelope and wire item types, plus lenient field deserializers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// Deserializes any value as a string, mapping non-strings and `null` to `""`.
pub fn deserialize_string_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// Deserializes an optional integer, mapping non-integers and `null` to `None`.
pub fn deserialize_lenient_i32<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64().and_then(|n| i32::try_from(n).ok()))
}

/// Uniform `{"success": bool, "data": ...}` response wrapper.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// Backend success flag.
    #[serde(default)]
    pub success: bool,
    /// Payload (absent on most errors).
    pub data: Option<T>,
}

/// Parses an envelope, failing unless `success` is true and `data` is present.
///
/// # Errors
///
/// Returns [`Error::Json`] on malformed JSON and [`Error::Protocol`] on an
/// unsuccessful or empty envelope.
pub fn parse_data<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if !envelope.success {
        return Err(Error::Protocol(String::from("success=false")));
    }
    envelope
        .data
        .ok_or_else(|| Error::Protocol(String::from("missing data")))
}

/// Parses an envelope where only the success flag matters.
///
/// # Errors
///
/// Same as [`parse_data`], except that a missing `data` is accepted.
pub fn parse_success(body: &str) -> Result<()> {
    let envelope: Envelope<Value> = serde_json::from_str(body)?;
    if envelope.success {
        Ok(())
    } else {
        Err(Error::Protocol(String::from("success=false")))
    }
}

/// A paginated listing.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    /// Server-reported total item count.
    #[serde(default)]
    pub total: usize,
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// A non-paginated listing.
#[derive(Debug, Deserialize)]
pub struct Items<T> {
    /// Items.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Station catalog item.
#[derive(Debug, Deserialize)]
pub struct StationItem {
    /// Station id.
    pub id: i64,
    /// Station name.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub name: String,
    /// Whether the station can be streamed.
    #[serde(default)]
    pub has_stream: bool,
}

/// Broadcast listing item.
#[derive(Debug, Deserialize)]
pub struct BroadcastItem {
    /// Broadcast id.
    pub id: i64,
    /// Title.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub title: String,
    /// Start time.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub begin: String,
    /// End time.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub end: String,
    /// Short headline.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub headline: String,
    /// Short description.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub short_description: String,
    /// Original title.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub original_title: String,
    /// Episode subtitle.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub subtitle: String,
    /// Genre label.
    #[serde(default, rename = "type", deserialize_with = "deserialize_string_or_empty")]
    pub kind: String,
    /// Production year.
    #[serde(default, deserialize_with = "deserialize_lenient_i32")]
    pub year: Option<i32>,
    /// Season number.
    #[serde(default, deserialize_with = "deserialize_lenient_i32")]
    pub serie_season: Option<i32>,
    /// Episode number.
    #[serde(default, deserialize_with = "deserialize_lenient_i32")]
    pub serie_episode: Option<i32>,
}

/// Recording listing item (planned or completed).
#[derive(Debug, Deserialize)]
pub struct RecordingItem {
    /// Recording id.
    pub id: i64,
    /// Station the recording belongs to.
    #[serde(default)]
    pub station_id: i64,
    /// Title.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub title: String,
    /// Episode subtitle.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub subtitle: String,
    /// Long description.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub description: String,
    /// Short description.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub short_description: String,
    /// Start time.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub begin: String,
    /// End time.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub end: String,
}

/// Stream descriptor payload.
#[derive(Debug, Deserialize)]
pub struct StreamData {
    /// Stream details.
    #[serde(default)]
    pub stream: Option<StreamInfo>,
}

/// Stream details.
#[derive(Debug, Deserialize)]
pub struct StreamInfo {
    /// Initial (redirecting) stream URL.
    #[serde(default, deserialize_with = "deserialize_string_or_empty")]
    pub url: String,
}
