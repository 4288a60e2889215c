//! Shared scheduling state: the pending EPG job queue and the refresh deadline.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// Default period between forced timer/recording refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::seconds(600);

/// Request to load one channel's program guide over a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpgJob {
    /// Channel to load.
    pub channel_id: i64,
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
}

impl EpgJob {
    /// Creates a job.
    #[must_use]
    pub const fn new(channel_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            channel_id,
            start,
            end,
        }
    }
}

#[derive(Debug)]
struct Inner {
    deadline: DateTime<Utc>,
    queue: VecDeque<EpgJob>,
}

/// Queue and deadline behind one lock, shared by workers and foreground callers.
///
/// The lock is only held for the duration of a single queue or deadline
/// mutation, never across I/O.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct SchedulerState {
    inner: Mutex<Inner>,
    interval: Duration,
}

impl SchedulerState {
    /// Creates state whose first refresh is due one `interval` after `now`.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)]
    pub fn new(interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                deadline: now + interval,
                queue: VecDeque::new(),
            }),
            interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refresh period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Appends a job to the queue. Never rejects.
    pub fn submit(&self, job: EpgJob) {
        let mut inner = self.lock();
        inner.queue.push_back(job);
        tracing::trace!(channel_id = job.channel_id, pending = inner.queue.len(), "EPG job queued");
    }

    /// Removes and returns the oldest job.
    pub fn pop_job(&self) -> Option<EpgJob> {
        self.lock().queue.pop_front()
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.lock().queue.len()
    }

    /// Drops every queued job, returning how many were dropped.
    pub fn abandon_pending(&self) -> usize {
        let mut inner = self.lock();
        let dropped = inner.queue.len();
        inner.queue.clear();
        dropped
    }

    /// Next time a timer/recording refresh is due.
    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.lock().deadline
    }

    /// Moves the deadline to `candidate` if it is strictly earlier.
    ///
    /// Returns whether the deadline changed.
    pub fn lower_deadline(&self, candidate: DateTime<Utc>) -> bool {
        let mut inner = self.lock();
        if candidate < inner.deadline {
            inner.deadline = candidate;
            true
        } else {
            false
        }
    }

    /// Claims an expired deadline.
    ///
    /// If `now` has reached the deadline, advances it to `now + interval`
    /// and returns `true`. Only one of several concurrent callers observing
    /// the same expired deadline gets `true`.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn try_fire(&self, now: DateTime<Utc>) -> bool {
        let mut inner = self.lock();
        if now >= inner.deadline {
            inner.deadline = now + self.interval;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn job(id: i64) -> EpgJob {
        EpgJob::new(id, t0(), t0() + Duration::hours(6))
    }

    #[test]
    fn test_initial_deadline_is_one_interval_ahead() {
        // Arrange & Act
        let state = SchedulerState::new(DEFAULT_REFRESH_INTERVAL, t0());

        // Assert
        assert_eq!(state.deadline(), t0() + Duration::seconds(600));
    }

    #[test]
    fn test_jobs_drain_in_fifo_order() {
        // Arrange
        let state = SchedulerState::new(DEFAULT_REFRESH_INTERVAL, t0());
        for id in 1..=4 {
            state.submit(job(id));
        }

        // Act
        let drained: Vec<i64> = std::iter::from_fn(|| state.pop_job())
            .map(|j| j.channel_id)
            .collect();

        // Assert
        assert_eq!(drained, vec![1, 2, 3, 4]);
        assert_eq!(state.pending_jobs(), 0);
    }

    #[test]
    fn test_lower_deadline_only_decreases() {
        // Arrange
        let state = SchedulerState::new(DEFAULT_REFRESH_INTERVAL, t0());
        let d1 = t0() + Duration::seconds(300);
        let d2 = t0() + Duration::seconds(450);
        let d3 = t0() + Duration::seconds(120);

        // Act
        let changed = [
            state.lower_deadline(d1),
            state.lower_deadline(d2),
            state.lower_deadline(d3),
            state.lower_deadline(d3),
        ];

        // Assert
        assert_eq!(changed, [true, false, true, false]);
        assert_eq!(state.deadline(), d3);
    }

    #[test]
    fn test_try_fire_advances_by_interval_from_fire_time() {
        // Arrange
        let state = SchedulerState::new(DEFAULT_REFRESH_INTERVAL, t0());
        state.lower_deadline(t0() + Duration::seconds(10));
        let fire_at = t0() + Duration::seconds(42);

        // Act
        let early = state.try_fire(t0() + Duration::seconds(5));
        let fired = state.try_fire(fire_at);
        let again = state.try_fire(fire_at);

        // Assert
        assert!(!early);
        assert!(fired);
        assert!(!again);
        assert_eq!(state.deadline(), fire_at + Duration::seconds(600));
    }

    #[test]
    fn test_concurrent_fire_has_single_winner() {
        // Arrange
        let state = Arc::new(SchedulerState::new(DEFAULT_REFRESH_INTERVAL, t0()));
        let fire_at = t0() + Duration::seconds(600);
        let winners = Arc::new(AtomicUsize::new(0));

        // Act
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if state.try_fire(fire_at) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Assert
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(state.deadline(), fire_at + Duration::seconds(600));
    }

    #[test]
    fn test_concurrent_pop_consumes_each_job_once() {
        // Arrange
        let state = Arc::new(SchedulerState::new(DEFAULT_REFRESH_INTERVAL, t0()));
        for id in 0..1_000 {
            state.submit(job(id));
        }

        // Act
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    let mut popped = Vec::new();
                    while let Some(j) = state.pop_job() {
                        popped.push(j.channel_id);
                    }
                    popped
                })
            })
            .collect();
        let per_thread: Vec<Vec<i64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Assert: every job exactly once, and each worker saw jobs in FIFO order
        let mut all: Vec<i64> = per_thread.iter().flatten().copied().collect();
        for seq in &per_thread {
            assert!(seq.windows(2).all(|w| w[0] < w[1]));
        }
        all.sort_unstable();
        assert_eq!(all, (0..1_000).collect::<Vec<_>>());
    }

    #[test]
    fn test_abandon_pending() {
        // Arrange
        let state = SchedulerState::new(DEFAULT_REFRESH_INTERVAL, t0());
        state.submit(job(1));
        state.submit(job(2));

        // Act & Assert
        assert_eq!(state.abandon_pending(), 2);
        assert!(state.pop_job().is_none());
    }
}
