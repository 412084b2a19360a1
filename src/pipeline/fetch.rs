//! Resource loading: URL list → decoded images, in input order.
//!
//! Fetches run concurrently (bounded by `fetch_concurrency`) but results are
//! yielded in the order of the record's URL list, because page order in the
//! artifact follows that list. A URL that cannot be fetched or decoded is
//! dropped with a warning and reported back as a [`ResourceError`]; it never
//! fails the run.

use crate::config::GenerationConfig;
use crate::error::{ResourceError, StoreError};
use crate::pipeline::decode::decode_image;
use crate::record::ImageResource;
use crate::store::BlobFetcher;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetch and decode every URL.
///
/// Returns the images that survived, in URL order, and one error per URL
/// that did not.
pub async fn load_images(
    urls: &[String],
    fetcher: Arc<dyn BlobFetcher>,
    config: &GenerationConfig,
) -> (Vec<ImageResource>, Vec<ResourceError>) {
    let total = urls.len();
    let results: Vec<Result<ImageResource, ResourceError>> =
        stream::iter(urls.iter().enumerate().map(|(index, url)| {
            let fetcher = Arc::clone(&fetcher);
            let url = url.clone();
            async move {
                let result = load_one(index, url, fetcher, config).await;
                report(index, &result, total, config);
                result
            }
        }))
        .buffered(config.fetch_concurrency.max(1))
        .collect()
        .await;

    let (images, skipped): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let images: Vec<ImageResource> = images.into_iter().filter_map(Result::ok).collect();
    let skipped: Vec<ResourceError> = skipped.into_iter().filter_map(Result::err).collect();

    debug!(
        "Loaded {}/{} images ({} skipped)",
        images.len(),
        total,
        skipped.len()
    );
    (images, skipped)
}

/// Fire the progress callback for one URL as soon as it settles.
fn report(
    index: usize,
    result: &Result<ImageResource, ResourceError>,
    total: usize,
    config: &GenerationConfig,
) {
    match result {
        Ok(image) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_image_fetched(index, total, image.data.len());
            }
        }
        Err(e) => {
            warn!("Skipping image: {}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_image_failed(e.index(), total, &e.to_string());
            }
        }
    }
}

async fn load_one(
    index: usize,
    url: String,
    fetcher: Arc<dyn BlobFetcher>,
    config: &GenerationConfig,
) -> Result<ImageResource, ResourceError> {
    let blob = fetcher
        .fetch(&url)
        .await
        .map_err(|e| fetch_error(index, &url, e))?;
    debug!("Fetched image {} ({} bytes)", index, blob.bytes.len());

    let max_bytes = config.max_image_bytes;
    let task_url = url.clone();
    tokio::task::spawn_blocking(move || decode_image(index, &task_url, blob, max_bytes))
        .await
        .map_err(|e| ResourceError::DecodeFailed {
            index,
            url,
            detail: format!("decode task panicked: {e}"),
        })?
}

fn fetch_error(index: usize, url: &str, err: StoreError) -> ResourceError {
    let url = url.to_string();
    match err {
        StoreError::Http { status, .. } => ResourceError::HttpStatus { index, url, status },
        StoreError::Timeout { secs } => ResourceError::Timeout { index, url, secs },
        StoreError::TooLarge { limit } => ResourceError::Unsupported {
            index,
            url,
            detail: format!("larger than {limit} bytes"),
        },
        other => ResourceError::FetchFailed {
            index,
            url,
            detail: other.to_string(),
        },
    }
}
