//! Result types returned by the generation entry points.

use crate::error::ResourceError;
use serde::{Deserialize, Serialize};

/// Outcome of a full [`crate::generate`] run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub record_id: String,
    /// Durable URL of the published artifact.
    pub url: String,
    /// Storage path the artifact was uploaded to.
    pub path: String,
    /// Summary page plus one page per embedded image.
    pub page_count: usize,
    /// Size of the artifact in bytes.
    pub bytes: usize,
    /// Whether the record's artifact URL field was updated.
    pub record_updated: bool,
    /// Images that were left out, in URL order.
    pub skipped: Vec<ResourceError>,
    pub stats: GenerationStats,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub images_requested: usize,
    pub images_embedded: usize,
    pub images_failed: usize,
    pub fetch_duration_ms: u64,
    pub assemble_duration_ms: u64,
    /// Zero when nothing was published (e.g. [`crate::generate_to_file`]).
    pub publish_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// An assembled artifact that has not been published.
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub skipped: Vec<ResourceError>,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// `true` when every requested image made it into the artifact.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}
