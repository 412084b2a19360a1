//! Progress-callback trait for generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the pipeline fetches images, assembles and publishes.
//!
//! # Example
//!
//! ```rust
//! use orderform::{GenerationProgressCallback, GenerationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     fetched: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_image_fetched(&self, index: usize, total: usize, bytes: usize) {
//!         self.fetched.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Image {}/{} ({} bytes)", index + 1, total, bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { fetched: AtomicUsize::new(0) });
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the generation pipeline at each stage boundary.
///
/// Image events may arrive concurrently and out of order (fetches run in
/// parallel). All methods have default no-op implementations.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once the record is loaded, before any image is fetched.
    fn on_generation_start(&self, image_count: usize) {
        let _ = image_count;
    }

    /// An image was fetched and decoded. `index` is 0-based.
    fn on_image_fetched(&self, index: usize, total: usize, bytes: usize) {
        let _ = (index, total, bytes);
    }

    /// An image was dropped; `error` is human-readable.
    fn on_image_failed(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// The PDF buffer is complete.
    fn on_assembled(&self, page_count: usize, bytes: usize) {
        let _ = (page_count, bytes);
    }

    /// The artifact is stored and reachable at `url`.
    fn on_published(&self, url: &str) {
        let _ = url;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
