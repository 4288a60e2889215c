//! Request parameter formatting for the backend's query strings.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Page size for broadcast listings.
pub const BROADCAST_PAGE_LIMIT: usize = 500;

/// Page size for recording listings.
pub const RECORDING_PAGE_LIMIT: usize = 100;

/// Formats a timestamp as the backend's `YYYY-MM-DD+HH:MM:SS` (UTC).
///
/// The `+` is a literal separator and must reach the server unescaped.
#[must_use]
pub fn format_query_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d+%H:%M:%S").to_string()
}

/// Parses a backend timestamp.
///
/// Accepts RFC 3339, `%Y-%m-%dT%H:%M:%S%z` (offset without colon) and a bare
/// `%Y-%m-%d %H:%M:%S` taken as UTC. Returns `None` for anything else.
#[must_use]
pub fn parse_api_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses a backend timestamp, falling back to the Unix epoch.
pub(crate) fn parse_api_datetime_or_epoch(s: &str) -> DateTime<Utc> {
    parse_api_datetime(s).unwrap_or_else(|| {
        if !s.is_empty() {
            tracing::debug!(value = s, "Unparsable timestamp, using epoch");
        }
        DateTime::UNIX_EPOCH
    })
}

/// Path and query for one page of a channel's broadcasts.
#[must_use]
pub fn broadcasts_path(
    user_id: &str,
    channel_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    skip: usize,
) -> String {
    format!(
        "users/{user_id}/broadcasts?begin={}&end={}&expand=logos&limit={BROADCAST_PAGE_LIMIT}&skip={skip}&sort=station&station={channel_id}",
        format_query_datetime(start),
        format_query_datetime(end),
    )
}

/// Path and query for one page of recordings of the given type.
#[must_use]
pub fn recordings_path(user_id: &str, kind: &str, skip: usize) -> String {
    format!(
        "users/{user_id}/recordings/{kind}?desc=1&expand=flags,logos&limit={RECORDING_PAGE_LIMIT}&skip={skip}&sort=date"
    )
}
