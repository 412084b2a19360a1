//! Error types for the orderform library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`OrderFormError`]: **Fatal**: generation cannot complete (unknown
//!   record, upload rejected, assembler defect). Returned as
//!   `Err(OrderFormError)` from the top-level `generate*` functions.
//!
//! * [`ResourceError`]: **Non-fatal**: a single image could not be fetched
//!   or decoded. The image is left out of the document and the error is
//!   reported in [`crate::output::GenerationOutput::skipped`].
//!
//! * [`AssemblyError`]: an internal invariant of the PDF writer was broken.
//!   This always indicates a bug; the writer aborts instead of emitting a
//!   malformed file.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the orderform library.
#[derive(Debug, Error)]
pub enum OrderFormError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The identifier contains characters that cannot form a storage path.
    #[error("Invalid record id '{id}': expected 1–128 characters of [A-Za-z0-9_-]")]
    InvalidRecordId { id: String },

    /// The record store has no record with this identifier.
    #[error("Record '{id}' not found")]
    RecordNotFound { id: String },

    /// The record store could not be reached or returned garbage.
    #[error("Record store error for '{id}': {source}")]
    RecordStore {
        id: String,
        #[source]
        source: StoreError,
    },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The PDF writer detected a broken invariant.
    #[error("Internal defect while assembling the artifact: {0}")]
    Assembly(#[from] AssemblyError),

    // ── Publish errors ────────────────────────────────────────────────────
    /// The artifact was built but the blob store rejected the upload.
    #[error("Artifact built ({bytes} bytes) but upload to '{path}' failed: {source}")]
    PublishFailed {
        path: String,
        bytes: usize,
        #[source]
        source: StoreError,
    },

    /// The record exists but no artifact has been published for it yet.
    #[error("No artifact has been published for record '{id}'")]
    ArtifactNotFound { id: String },

    // ── Artifact inspection ───────────────────────────────────────────────
    /// The bytes are not a well-formed artifact.
    #[error("Artifact is corrupt: {detail}")]
    CorruptArtifact { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broken writer invariants. Seeing one of these is a bug in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// A stream's declared `/Length` differs from the bytes written.
    #[error("object {id}: declared stream length {declared} but payload is {actual} bytes")]
    LengthMismatch {
        id: u32,
        declared: usize,
        actual: usize,
    },

    /// Objects must be written once each, in ascending id order from 1.
    #[error("object {found} written out of order (expected {expected})")]
    NonSequentialId { expected: u32, found: u32 },

    /// Fewer objects were written than were allocated.
    #[error("{allocated} objects allocated but only {written} written")]
    MissingObjects { allocated: u32, written: u32 },

    /// An image without a PDF filter reached the writer.
    #[error("image {index} has no embeddable encoding")]
    UnembeddableImage { index: usize },

    /// A page points at an image the document does not hold.
    #[error("page {page} references missing image {image}")]
    DanglingImage { page: usize, image: usize },
}

/// A non-fatal error for a single image.
///
/// The `index` is the 0-based position of the URL in the record's list.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ResourceError {
    /// Transport-level failure (DNS, TLS, connection reset, bad data URI).
    #[error("Image {index} ({url}): fetch failed: {detail}")]
    FetchFailed {
        index: usize,
        url: String,
        detail: String,
    },

    /// The server answered with a non-success status.
    #[error("Image {index} ({url}): HTTP {status}")]
    HttpStatus {
        index: usize,
        url: String,
        status: u16,
    },

    /// The fetch did not complete in time.
    #[error("Image {index} ({url}): timed out after {secs}s")]
    Timeout { index: usize, url: String, secs: u64 },

    /// Neither JPEG nor PNG, or larger than the configured limit.
    #[error("Image {index} ({url}): unsupported content ({detail})")]
    Unsupported {
        index: usize,
        url: String,
        detail: String,
    },

    /// The bytes claimed to be an image but could not be decoded.
    #[error("Image {index} ({url}): decode failed: {detail}")]
    DecodeFailed {
        index: usize,
        url: String,
        detail: String,
    },
}

impl ResourceError {
    /// Position of the failed URL in the record's image list.
    pub fn index(&self) -> usize {
        match self {
            ResourceError::FetchFailed { index, .. }
            | ResourceError::HttpStatus { index, .. }
            | ResourceError::Timeout { index, .. }
            | ResourceError::Unsupported { index, .. }
            | ResourceError::DecodeFailed { index, .. } => *index,
        }
    }
}

/// Failure reported by a record store, blob store or fetcher.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not talk to the backend at all.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with an error status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be interpreted.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The request did not complete in time.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The body was larger than the caller allows.
    #[error("body exceeds limit of {limit} bytes")]
    TooLarge { limit: usize },
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}
