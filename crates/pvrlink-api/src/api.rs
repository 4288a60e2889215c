//! `EpgSource` trait definition.
#![allow(clippy::future_not_send)]

use crate::error::Result;
use crate::scheduler::EpgJob;
use crate::sink::PvrSink;

/// Loader the update scheduler drains EPG jobs into.
///
/// Abstracts the API client for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[trait_variant::make(EpgSource: Send)]
pub trait LocalEpgSource {
    /// Loads the job's window page by page, emitting entries to `sink` as
    /// each page arrives. Returns the number of entries emitted.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failed page; entries already emitted
    /// stay emitted.
    async fn fetch_epg_window(&self, job: &EpgJob, sink: &dyn PvrSink) -> Result<usize>;
}
