//! Background workers draining EPG jobs and firing periodic refreshes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::state::{EpgJob, SchedulerState};
use crate::api::EpgSource;
use crate::sink::PvrSink;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 5;

/// Default polling cadence.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Default time a worker is given to exit after a stop request.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(200);

/// Builder for `UpdateScheduler`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct UpdateSchedulerBuilder {
    workers: usize,
    tick: Duration,
    stop_timeout: Duration,
}

impl UpdateSchedulerBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            tick: DEFAULT_TICK,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Sets the worker count (default: 5, minimum: 1).
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the sleep between loop iterations (default: 100ms).
    #[must_use]
    pub const fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sets how long `shutdown` waits per worker before warning (default: 200ms).
    #[must_use]
    pub const fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Spawns the workers on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<S>(
        self,
        state: Arc<SchedulerState>,
        source: Arc<S>,
        sink: Arc<dyn PvrSink>,
    ) -> UpdateScheduler
    where
        S: EpgSource + Send + Sync + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handles = (0..self.workers)
            .map(|id| {
                let worker = Worker {
                    state: Arc::clone(&state),
                    source: Arc::clone(&source),
                    sink: Arc::clone(&sink),
                    tick: self.tick,
                    stop: stop_rx.clone(),
                };
                tokio::spawn(
                    worker
                        .run()
                        .instrument(tracing::debug_span!("update_worker", id)),
                )
            })
            .collect();
        tracing::debug!(workers = self.workers, "Update scheduler started");
        UpdateScheduler {
            state,
            stop_tx,
            handles,
            stop_timeout: self.stop_timeout,
        }
    }
}

/// Running pool of update workers.
///
/// Dropping the scheduler signals the workers to stop without waiting.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct UpdateScheduler {
    state: Arc<SchedulerState>,
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl UpdateScheduler {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> UpdateSchedulerBuilder {
        UpdateSchedulerBuilder::new()
    }

    /// Queues an EPG job for the workers.
    pub fn submit_epg_job(&self, job: EpgJob) {
        self.state.submit(job);
    }

    /// Stops every worker and waits for it to exit.
    ///
    /// A worker busy with a job is allowed to finish it; jobs still queued
    /// are abandoned.
    pub async fn shutdown(mut self) {
        self.stop_tx.send_replace(true);
        for (id, mut handle) in self.handles.drain(..).enumerate() {
            if tokio::time::timeout(self.stop_timeout, &mut handle)
                .await
                .is_err()
            {
                tracing::warn!(id, "Update worker still busy, waiting for in-flight job");
                if let Err(e) = handle.await {
                    tracing::error!(id, error = %e, "Update worker panicked");
                }
            }
        }
        let abandoned = self.state.abandon_pending();
        if abandoned > 0 {
            tracing::debug!(abandoned, "Dropped queued EPG jobs at shutdown");
        }
        tracing::debug!("Update scheduler stopped");
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

/// Fires the periodic refresh if `now` has reached the deadline.
///
/// Returns whether this caller won the deadline and triggered the host.
pub fn fire_if_due(state: &SchedulerState, sink: &dyn PvrSink, now: DateTime<Utc>) -> bool {
    if !state.try_fire(now) {
        return false;
    }
    sink.request_timers_refresh();
    sink.request_recordings_refresh();
    tracing::debug!("Update thread triggered update");
    true
}

struct Worker<S> {
    state: Arc<SchedulerState>,
    source: Arc<S>,
    sink: Arc<dyn PvrSink>,
    tick: Duration,
    stop: watch::Receiver<bool>,
}

impl<S: EpgSource + Send + Sync + 'static> Worker<S> {
    async fn run(mut self) {
        tracing::debug!("Update worker started");
        loop {
            tokio::select! {
                changed = self.stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.tick) => {}
            }
            if *self.stop.borrow() {
                break;
            }

            if let Some(job) = self.state.pop_job() {
                self.process(&job).await;
            }

            fire_if_due(&self.state, self.sink.as_ref(), Utc::now());
        }
        tracing::debug!("Update worker stopped");
    }

    async fn process(&self, job: &EpgJob) {
        match self.source.fetch_epg_window(job, self.sink.as_ref()).await {
            Ok(count) => {
                tracing::debug!(channel_id = job.channel_id, count, "EPG job done");
            }
            Err(e) => {
                tracing::error!(channel_id = job.channel_id, error = %e, "Error getting epg for channel");
            }
        }
    }
}
