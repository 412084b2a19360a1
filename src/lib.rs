//! # orderform
//!
//! Turn a stored enquiry record into a printable PDF order form and publish
//! it to blob storage.
//!
//! The form is a single summary page listing the enquiry's fields, followed
//! by one page per attached photograph. The PDF is written directly (no
//! external renderer): objects are numbered up front, serialised in order,
//! and indexed by a cross-reference table whose offsets are exact.
//!
//! ## Pipeline Overview
//!
//! ```text
//! record id
//!  │
//!  ├─ 1. Lookup    read the record from the record store
//!  ├─ 2. Fetch     download photographs concurrently, keep URL order
//!  ├─ 3. Decode    JPEG passthrough, PNG → flattened zlib samples
//!  ├─ 4. Layout    summary page + one centred image page per photo
//!  ├─ 5. Assemble  PDF 1.4 objects, xref table, trailer
//!  └─ 6. Publish   overwrite <id>/order-form.pdf, write URL back to record
//! ```
//!
//! Photographs that cannot be fetched or decoded are skipped and reported;
//! they never fail the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orderform::{generate, GenerationConfig, SupabaseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads SUPABASE_URL / SUPABASE_SERVICE_ROLE_KEY
//!     let backend = SupabaseConfig::from_env()?.backend()?;
//!     let config = GenerationConfig::default();
//!     let output = generate("8f14e45f", &backend, &config).await?;
//!     println!("{}", output.url);
//!     eprintln!("{} page(s), {} image(s) skipped", output.page_count, output.skipped.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `orderform` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! orderform = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod font;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod store;
pub mod supabase;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder, PageLayout};
pub use error::{AssemblyError, OrderFormError, ResourceError, StoreError};
pub use generate::{
    artifact_url, build_artifact, generate, generate_sync, generate_to_file, validate_record_id,
};
pub use output::{BuiltArtifact, GenerationOutput, GenerationStats};
pub use pipeline::assemble::assemble_document;
pub use pipeline::inspect::{inspect_artifact, ArtifactSummary};
pub use pipeline::layout::{build_document, Document};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{ColorModel, FetchedBlob, ImageKind, ImageResource, SourceRecord};
pub use store::{
    Backend, BlobFetcher, BlobStore, HttpFetcher, MemoryBlobStore, MemoryRecordStore, RecordStore,
};
pub use supabase::SupabaseConfig;
