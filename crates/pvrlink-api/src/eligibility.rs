//! Replay and recording eligibility rules.

use chrono::{DateTime, Duration, Utc};

use crate::session::Membership;

/// Default catch-up window: seven days.
pub const DEFAULT_CATCHUP_WINDOW: Duration = Duration::days(7);

/// Whether the event ended less than `window` ago (or has not ended yet).
fn within_catchup(end: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(end) < window
}

/// An event can be replayed by a paid member once it has started, until it
/// falls out of the catch-up window.
#[must_use]
pub fn is_playable(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    membership: Membership,
    window: Duration,
) -> bool {
    membership.is_paid() && within_catchup(end, now, window) && start < now
}

/// An event can be recorded until it falls out of the catch-up window.
#[must_use]
pub fn is_recordable(end: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    within_catchup(end, now, window)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLUS: Membership = Membership {
        plus: true,
        comfort: false,
    };

    fn at(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
        now + Duration::hours(hours)
    }

    #[test]
    fn test_non_member_never_playable() {
        // Arrange
        let now = Utc::now();

        // Act & Assert
        assert!(!is_playable(
            at(now, -2),
            at(now, -1),
            now,
            Membership::default(),
            DEFAULT_CATCHUP_WINDOW
        ));
    }

    #[test]
    fn test_plus_member_recent_event_playable() {
        // Arrange
        let now = Utc::now();

        // Act & Assert
        assert!(is_playable(at(now, -2), at(now, -1), now, PLUS, DEFAULT_CATCHUP_WINDOW));
    }

    #[test]
    fn test_event_older_than_window_not_playable() {
        // Arrange
        let now = Utc::now();
        let end = now - Duration::days(8);

        // Act & Assert
        assert!(!is_playable(end - Duration::hours(1), end, now, PLUS, DEFAULT_CATCHUP_WINDOW));
        assert!(!is_recordable(end, now, DEFAULT_CATCHUP_WINDOW));
    }

    #[test]
    fn test_future_event_recordable_but_not_playable() {
        // Arrange
        let now = Utc::now();

        // Act & Assert
        assert!(!is_playable(at(now, 1), at(now, 2), now, PLUS, DEFAULT_CATCHUP_WINDOW));
        assert!(is_recordable(at(now, 2), now, DEFAULT_CATCHUP_WINDOW));
    }

    #[test]
    fn test_comfort_member_is_paid() {
        // Arrange
        let now = Utc::now();
        let comfort = Membership {
            plus: false,
            comfort: true,
        };

        // Act & Assert
        assert!(is_playable(at(now, -2), at(now, -1), now, comfort, DEFAULT_CATCHUP_WINDOW));
    }
}
