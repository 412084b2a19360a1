//! Top-level generation entry points.
//!
//! [`generate`] runs the whole pipeline for a stored record and publishes
//! the result. [`build_artifact`] and [`generate_to_file`] stop short of
//! publishing and need no record or blob store, which is what the CLI's
//! `--output` mode and most tests use.

use crate::config::GenerationConfig;
use crate::error::OrderFormError;
use crate::output::{BuiltArtifact, GenerationOutput, GenerationStats};
use crate::pipeline::{assemble, fetch, layout, publish};
use crate::record::SourceRecord;
use crate::store::{Backend, BlobFetcher, HttpFetcher};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

static RE_RECORD_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap());

/// Reject identifiers that would not form a clean storage path.
pub fn validate_record_id(record_id: &str) -> Result<(), OrderFormError> {
    if RE_RECORD_ID.is_match(record_id) {
        Ok(())
    } else {
        Err(OrderFormError::InvalidRecordId {
            id: record_id.to_string(),
        })
    }
}

/// Generate and publish the order form for `record_id`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(GenerationOutput)` once the artifact is uploaded, even if some
/// images were skipped (see `output.skipped`) or the record's URL field
/// could not be updated (see `output.record_updated`).
///
/// # Errors
/// - [`OrderFormError::InvalidRecordId`] before any I/O
/// - [`OrderFormError::RecordNotFound`] / [`OrderFormError::RecordStore`]
/// - [`OrderFormError::PublishFailed`] when the upload is rejected
/// - [`OrderFormError::Assembly`] on an internal writer defect
pub async fn generate(
    record_id: impl AsRef<str>,
    backend: &Backend,
    config: &GenerationConfig,
) -> Result<GenerationOutput, OrderFormError> {
    let total_start = Instant::now();
    let record_id = record_id.as_ref();
    validate_record_id(record_id)?;
    info!("Generating order form for record '{}'", record_id);

    // ── Step 1: Look up the record ──────────────────────────────────────
    let record = backend
        .records
        .get(record_id)
        .await
        .map_err(|source| OrderFormError::RecordStore {
            id: record_id.to_string(),
            source,
        })?
        .ok_or_else(|| OrderFormError::RecordNotFound {
            id: record_id.to_string(),
        })?;

    // ── Step 2-4: Fetch, lay out, assemble ──────────────────────────────
    let built = build_artifact(&record, config).await?;

    // ── Step 5: Publish and write back ──────────────────────────────────
    let publish_start = Instant::now();
    let bytes = built.bytes.len();
    let published = publish::publish_artifact(record_id, built.bytes, backend, config).await?;

    let stats = GenerationStats {
        publish_duration_ms: publish_start.elapsed().as_millis() as u64,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ..built.stats
    };
    info!(
        "Order form for '{}' published: {} page(s), {} bytes, {}ms total",
        record_id, built.page_count, bytes, stats.total_duration_ms
    );

    Ok(GenerationOutput {
        record_id: record_id.to_string(),
        url: published.url,
        path: published.path,
        page_count: built.page_count,
        bytes,
        record_updated: published.record_updated,
        skipped: built.skipped,
        stats,
    })
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    record_id: impl AsRef<str>,
    backend: &Backend,
    config: &GenerationConfig,
) -> Result<GenerationOutput, OrderFormError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OrderFormError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(record_id, backend, config))
}

/// Fetch images, lay out and assemble the artifact for `record`.
///
/// Touches no store; only the image fetcher does I/O.
pub async fn build_artifact(
    record: &SourceRecord,
    config: &GenerationConfig,
) -> Result<BuiltArtifact, OrderFormError> {
    let total_start = Instant::now();
    let requested = record.image_urls.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(requested);
    }

    let fetch_start = Instant::now();
    let (images, skipped) = if requested == 0 {
        (Vec::new(), Vec::new())
    } else {
        let fetcher = resolve_fetcher(config)?;
        fetch::load_images(&record.image_urls, fetcher, config).await
    };
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
    info!(
        "Loaded {}/{} images in {}ms",
        images.len(),
        requested,
        fetch_duration_ms
    );

    let assemble_start = Instant::now();
    let embedded = images.len();
    let document = layout::build_document(record, images, &config.layout);
    let page_count = document.pages.len();
    let bytes = assemble::assemble_document(&document)?;
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;
    info!(
        "Assembled {} page(s), {} bytes in {}ms",
        page_count,
        bytes.len(),
        assemble_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_assembled(page_count, bytes.len());
    }

    let stats = GenerationStats {
        images_requested: requested,
        images_embedded: embedded,
        images_failed: skipped.len(),
        fetch_duration_ms,
        assemble_duration_ms,
        publish_duration_ms: 0,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    Ok(BuiltArtifact {
        bytes,
        page_count,
        skipped,
        stats,
    })
}

/// Build the artifact for `record` and write it to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_to_file(
    record: &SourceRecord,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<BuiltArtifact, OrderFormError> {
    let built = build_artifact(record, config).await?;
    let path = output_path.as_ref();
    let write_failed = |source| OrderFormError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &built.bytes)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;

    info!("Wrote {} bytes to {}", built.bytes.len(), path.display());
    Ok(built)
}

/// Durable URL of the artifact previously published for `record_id`.
pub async fn artifact_url(
    record_id: impl AsRef<str>,
    backend: &Backend,
) -> Result<String, OrderFormError> {
    let record_id = record_id.as_ref();
    validate_record_id(record_id)?;
    let record = backend
        .records
        .get(record_id)
        .await
        .map_err(|source| OrderFormError::RecordStore {
            id: record_id.to_string(),
            source,
        })?
        .ok_or_else(|| OrderFormError::RecordNotFound {
            id: record_id.to_string(),
        })?;
    record
        .artifact_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| OrderFormError::ArtifactNotFound {
            id: record_id.to_string(),
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// An injected fetcher wins; otherwise build an HTTP one from the config.
fn resolve_fetcher(config: &GenerationConfig) -> Result<Arc<dyn BlobFetcher>, OrderFormError> {
    if let Some(ref fetcher) = config.fetcher {
        return Ok(Arc::clone(fetcher));
    }
    debug!(
        "Using HTTP fetcher with {}s timeout, {} byte limit",
        config.fetch_timeout_secs, config.max_image_bytes
    );
    let fetcher = HttpFetcher::new(config.fetch_timeout_secs, config.max_image_bytes)
        .map_err(|e| OrderFormError::Internal(format!("HTTP client: {e}")))?;
    Ok(Arc::new(fetcher))
}
