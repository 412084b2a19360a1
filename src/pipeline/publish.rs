//! Artifact publishing: upload to blob storage, then point the record at it.
//!
//! The upload uses a path derived only from the record id, so regenerating
//! replaces the previous artifact in place. The write-back to the record is
//! best-effort: once the upload succeeded the artifact exists and its URL is
//! returned even if the record could not be updated.

use crate::config::GenerationConfig;
use crate::error::OrderFormError;
use crate::store::Backend;
use tracing::{info, warn};

pub const CONTENT_TYPE: &str = "application/pdf";

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub path: String,
    pub url: String,
    /// `false` when the record's artifact URL could not be written back.
    pub record_updated: bool,
}

/// Upload `bytes` for `record_id` and record the resulting URL.
pub async fn publish_artifact(
    record_id: &str,
    bytes: Vec<u8>,
    backend: &Backend,
    config: &GenerationConfig,
) -> Result<Published, OrderFormError> {
    let path = config.artifact_path(record_id);
    let size = bytes.len();

    let url = backend
        .blobs
        .put(&path, bytes, CONTENT_TYPE)
        .await
        .map_err(|source| OrderFormError::PublishFailed {
            path: path.clone(),
            bytes: size,
            source,
        })?;
    info!("Uploaded {} bytes to {}", size, path);

    let record_updated = match backend.records.set_artifact_url(record_id, &url).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Artifact for '{}' is at {} but the record was not updated: {}",
                record_id, url, e
            );
            false
        }
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_published(&url);
    }

    Ok(Published {
        path,
        url,
        record_updated,
    })
}
