//! Client library for the Teleboy TV backend.
//!
//! Provides the scrape-based session login, the JSON API client, and an
//! update scheduler that drains queued EPG requests and periodically asks
//! the host to refresh timers and recordings.

/// `EpgSource` trait consumed by the update workers.
pub mod api;

/// Channel lineup and display numbering.
pub mod channels;

/// Backend API client.
pub mod client;

/// Catch-up eligibility rules.
pub mod eligibility;

/// Error types.
pub mod error;

/// JSON envelope and wire items.
pub mod json;

/// Query path and date helpers.
pub mod params;

/// Update scheduler.
pub mod scheduler;

/// Host-facing facade.
pub mod service;

/// Login handshake and session state.
pub mod session;

/// Host callbacks.
pub mod sink;

/// HTTP transport.
pub mod transport;

/// Domain records.
pub mod types;

pub use client::{ApiClient, ApiClientBuilder, RECORDINGS_PLANNED, RECORDINGS_READY, StreamKind};
pub use error::{Error, LoginError, Result};
pub use service::PvrService;
pub use sink::PvrSink;
pub use types::{Channel, EpgEntry, Recording, Timer};
