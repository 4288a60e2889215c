//! Host-facing facade combining the API client, update scheduler, and sink.
//!
//! Every operation here logs its failure and reports it as `bool` or
//! `Option`; callers retry by asking again.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::api::EpgSource;
use crate::client::{ApiClient, StreamKind};
use crate::scheduler::{EpgJob, UpdateScheduler, UpdateSchedulerBuilder};
use crate::sink::PvrSink;
use crate::types::EpgEntry;

/// Session, channel, guide, and recording operations for a media host.
pub struct PvrService {
    client: Arc<ApiClient>,
    scheduler: UpdateScheduler,
    sink: Arc<dyn PvrSink>,
    favorites_only: bool,
}

impl fmt::Debug for PvrService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PvrService")
            .field("client", &self.client)
            .field("scheduler", &self.scheduler)
            .field("favorites_only", &self.favorites_only)
            .finish_non_exhaustive()
    }
}

impl PvrService {
    /// Starts the update workers and wraps `client`.
    ///
    /// The workers share the client's scheduler state, so timers listed
    /// through this service pull the periodic refresh forward.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start(
        client: ApiClient,
        scheduler: UpdateSchedulerBuilder,
        sink: Arc<dyn PvrSink>,
        favorites_only: bool,
    ) -> Self {
        let client = Arc::new(client);
        let scheduler = scheduler.start(
            Arc::clone(client.scheduler_state()),
            Arc::clone(&client),
            Arc::clone(&sink),
        );
        Self {
            client,
            scheduler,
            sink,
            favorites_only,
        }
    }

    /// Underlying API client.
    #[must_use]
    pub const fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Logs in; every other operation fails until this succeeds.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        match self.client.login(username, password).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Login failed");
                false
            }
        }
    }

    /// Drops the session.
    pub fn logout(&self) {
        self.client.logout();
    }

    /// Reloads the channel lineup.
    pub async fn load_channels(&self) -> bool {
        self.client.load_channels().await.is_ok()
    }

    /// Number of channels [`Self::list_channels`] emits.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.client.channel_count(self.favorites_only)
    }

    /// Emits the channel lineup to `sink`.
    pub fn list_channels(&self, sink: &dyn PvrSink) {
        self.client.list_channels(self.favorites_only, sink);
    }

    /// Queues a guide refresh for the update workers.
    pub fn request_epg_window(&self, channel_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.scheduler.submit_epg_job(EpgJob::new(channel_id, start, end));
    }

    /// Loads a guide window on the calling task, emitting to the service sink.
    #[instrument(skip(self))]
    pub async fn fetch_epg_window_sync(
        &self,
        channel_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> bool {
        let job = EpgJob::new(channel_id, start, end);
        match self.client.fetch_epg_window(&job, self.sink.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(channel_id, error = %e, "Error getting epg for channel");
                false
            }
        }
    }

    /// Emits planned (`planned`) or finished (`ready`) recordings to `sink`.
    pub async fn list_recordings(&self, kind: &str, sink: &dyn PvrSink) -> bool {
        self.client.list_recordings(kind, sink).await.is_ok()
    }

    /// Schedules a recording and asks the host to refresh its timers.
    pub async fn record(&self, program_id: i64) -> bool {
        match self.client.record(program_id).await {
            Ok(()) => {
                self.sink.request_timers_refresh();
                true
            }
            Err(e) => {
                tracing::error!(program_id, error = %e, "Error scheduling recording");
                false
            }
        }
    }

    /// Deletes a recording or timer and asks the host to refresh both lists.
    pub async fn delete_recording(&self, recording_id: &str) -> bool {
        match self.client.delete_recording(recording_id).await {
            Ok(()) => {
                self.sink.request_timers_refresh();
                self.sink.request_recordings_refresh();
                true
            }
            Err(e) => {
                tracing::error!(recording_id, error = %e, "Error deleting recording");
                false
            }
        }
    }

    async fn resolve(&self, kind: StreamKind) -> Option<String> {
        self.client
            .resolve_stream_url(&kind)
            .await
            .inspect_err(|e| tracing::error!(?kind, error = %e, "Error resolving stream url"))
            .ok()
    }

    /// Playable URL of a channel's live stream.
    pub async fn resolve_channel_stream_url(&self, channel_id: i64) -> Option<String> {
        self.resolve(StreamKind::Live(channel_id)).await
    }

    /// Playable URL of a finished recording.
    pub async fn resolve_recording_stream_url(&self, recording_id: &str) -> Option<String> {
        self.resolve(StreamKind::Recording(recording_id.to_owned())).await
    }

    /// Playable URL of a past broadcast.
    pub async fn resolve_epg_stream_url(&self, entry: &EpgEntry) -> Option<String> {
        self.resolve_replay_stream_url(entry.broadcast_id).await
    }

    /// Playable URL of a past broadcast known only by id.
    pub async fn resolve_replay_stream_url(&self, broadcast_id: i64) -> Option<String> {
        self.resolve(StreamKind::Replay(broadcast_id)).await
    }

    /// Whether `entry` can be replayed now.
    #[must_use]
    pub fn is_playable(&self, entry: &EpgEntry) -> bool {
        self.client.is_playable(entry)
    }

    /// Whether `entry` can be recorded now.
    #[must_use]
    pub fn is_recordable(&self, entry: &EpgEntry) -> bool {
        self.client.is_recordable(entry)
    }

    /// Stops the update workers. Queued guide requests are abandoned.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        tracing::info!("Service stopped");
    }
}
