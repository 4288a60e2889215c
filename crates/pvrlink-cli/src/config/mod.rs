//! The pvrlink profile: Teleboy account, channel listing mode, replay
//! window and update-worker tuning, stored as TOML.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, PASSWORD_ENV};
pub use paths::resolve_config_path;
