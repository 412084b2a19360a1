//! Configuration types for order-form generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. Page geometry lives in [`PageLayout`]
//! so tests and callers can reason about wrapping and scaling with the same
//! numbers the layout stage uses.

use crate::error::OrderFormError;
use crate::progress::ProgressCallback;
use crate::store::BlobFetcher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for one or more generation runs.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use orderform::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .fetch_concurrency(8)
///     .fetch_timeout_secs(15)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Number of image fetches in flight at once. Default: 4.
    ///
    /// Output order never depends on this; results are collected in the
    /// order the URLs appear on the record.
    pub fetch_concurrency: usize,

    /// Per-image fetch timeout in seconds. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Images larger than this are dropped as unsupported. Default: 20 MiB.
    pub max_image_bytes: usize,

    /// File name of the artifact under the record's folder. Default: `order-form.pdf`.
    ///
    /// The full blob path is `<record_id>/<artifact_name>`, so regenerating
    /// overwrites the previous artifact instead of adding another one.
    pub artifact_name: String,

    /// Page geometry and type sizes.
    pub layout: PageLayout,

    /// Pre-constructed fetcher. If None, an HTTP fetcher is built from
    /// `fetch_timeout_secs`.
    pub fetcher: Option<Arc<dyn BlobFetcher>>,

    /// Receives pipeline events. If None, no events are emitted.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 4,
            fetch_timeout_secs: 30,
            max_image_bytes: 20 * 1024 * 1024,
            artifact_name: "order-form.pdf".to_string(),
            layout: PageLayout::default(),
            fetcher: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("artifact_name", &self.artifact_name)
            .field("layout", &self.layout)
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<dyn BlobFetcher>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Blob path of the artifact for `record_id`.
    pub fn artifact_path(&self, record_id: &str) -> String {
        format!("{}/{}", record_id, self.artifact_name)
    }
}

/// Builder for [`GenerationConfig`].
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn fetch_concurrency(mut self, n: usize) -> Self {
        self.config.fetch_concurrency = n.max(1);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn artifact_name(mut self, name: impl Into<String>) -> Self {
        self.config.artifact_name = name.into();
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn BlobFetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, OrderFormError> {
        let c = &self.config;
        if c.artifact_name.is_empty() || c.artifact_name.contains('/') {
            return Err(OrderFormError::InvalidConfig(format!(
                "artifact name must be a non-empty file name, got {:?}",
                c.artifact_name
            )));
        }
        if c.max_image_bytes == 0 {
            return Err(OrderFormError::InvalidConfig(
                "max_image_bytes must be > 0".into(),
            ));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

/// Page geometry shared by every page of a document, in PDF points.
///
/// The defaults describe A4 portrait with a 50 pt margin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    /// Horizontal space reserved for the row labels on the summary page.
    pub label_width: f32,
    pub font_size: f32,
    pub title_font_size: f32,
    pub line_height: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin: 50.0,
            label_width: 120.0,
            font_size: 11.0,
            title_font_size: 18.0,
            line_height: 16.0,
        }
    }
}

impl PageLayout {
    /// Width left for a row's value once margins and the label column are taken.
    pub fn value_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin - self.label_width
    }

    /// Width and height of the margin-bounded printable area.
    pub fn printable_area(&self) -> (f32, f32) {
        (
            self.page_width - 2.0 * self.margin,
            self.page_height - 2.0 * self.margin,
        )
    }

    fn validate(&self) -> Result<(), OrderFormError> {
        let positive = [
            self.page_width,
            self.page_height,
            self.font_size,
            self.title_font_size,
            self.line_height,
        ];
        if positive.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(OrderFormError::InvalidConfig(
                "page dimensions, type sizes and line height must be positive".into(),
            ));
        }
        // NaN compares false against everything, so `< 0.0` alone lets it through.
        if [self.margin, self.label_width]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(OrderFormError::InvalidConfig(
                "margin and label width must be finite and non-negative".into(),
            ));
        }
        if self.value_width() <= 0.0 || self.printable_area().1 <= 0.0 {
            return Err(OrderFormError::InvalidConfig(format!(
                "margins and label column leave no room on a {}x{} page",
                self.page_width, self.page_height
            )));
        }
        Ok(())
    }
}
