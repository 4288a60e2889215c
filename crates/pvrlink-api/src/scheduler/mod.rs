//! Update scheduler: a small pool of workers that drains queued EPG jobs and
//! periodically asks the host to refresh timers and recordings.

mod state;
mod worker;

#[allow(clippy::module_name_repetitions)]
pub use state::{DEFAULT_REFRESH_INTERVAL, EpgJob, SchedulerState};
#[allow(clippy::module_name_repetitions)]
pub use worker::{
    DEFAULT_STOP_TIMEOUT, DEFAULT_TICK, DEFAULT_WORKERS, UpdateScheduler, UpdateSchedulerBuilder,
    fire_if_due,
};
