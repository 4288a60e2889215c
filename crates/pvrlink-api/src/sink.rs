//! Host callbacks that receive records and refresh requests.

use crate::types::{Channel, EpgEntry, Recording, Timer};

/// Receiver for data pushed to the host media player.
///
/// Called from foreground tasks and scheduler workers alike, so
/// implementations must be thread-safe.
pub trait PvrSink: Send + Sync {
    /// Receives one program-guide entry.
    fn emit_epg_entry(&self, entry: EpgEntry);

    /// Receives one channel with its display number.
    fn emit_channel(&self, channel: &Channel, number: u32);

    /// Receives one completed recording.
    fn emit_recording(&self, recording: Recording);

    /// Receives one planned recording.
    fn emit_timer(&self, timer: Timer);

    /// Asks the host to pull timers again.
    fn request_timers_refresh(&self);

    /// Asks the host to pull recordings again.
    fn request_recordings_refresh(&self);
}
