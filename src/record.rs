//! Input types: the enquiry record and the images resolved from it.
//!
//! [`SourceRecord`] mirrors one row of the record store. Column names used by
//! the store (`mobile`, `district`, `sq_feet_area`, `pdf_url`) are mapped onto
//! descriptive field names here so the rest of the crate never deals with
//! untyped JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One enquiry, as read from the record store. The pipeline never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "mobile", alias = "contact")]
    pub contact: Option<String>,

    #[serde(default, rename = "district", alias = "location")]
    pub location: Option<String>,

    /// Older rows stored the location here instead of `district`.
    #[serde(default)]
    pub place: Option<String>,

    #[serde(default)]
    pub service: Option<String>,

    #[serde(default, rename = "sq_feet_area", alias = "area")]
    pub area_sq_ft: Option<f64>,

    #[serde(default)]
    pub requirements: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub image_urls: Vec<String>,

    /// Durable URL of the last published artifact.
    #[serde(default, rename = "pdf_url", alias = "artifact_url")]
    pub artifact_url: Option<String>,
}

impl SourceRecord {
    /// A record with only an identifier; every other field is empty.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            contact: None,
            location: None,
            place: None,
            service: None,
            area_sq_ft: None,
            requirements: None,
            created_at: None,
            image_urls: Vec::new(),
            artifact_url: None,
        }
    }
}

fn null_as_empty<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(de)?.unwrap_or_default())
}

/// Compression kind of a fetched image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    /// Embedded verbatim with `/DCTDecode`.
    Jpeg,
    /// Decoded and re-compressed with `/FlateDecode`.
    Png,
    Unsupported,
}

impl ImageKind {
    /// Classify by declared MIME type, falling back to magic bytes.
    pub fn detect(content_type: Option<&str>, data: &[u8]) -> Self {
        if let Some(ct) = content_type {
            let ct = ct.to_ascii_lowercase();
            if ct.contains("jpeg") || ct.contains("jpg") {
                return ImageKind::Jpeg;
            }
            if ct.contains("png") {
                return ImageKind::Png;
            }
        }
        match image::guess_format(data) {
            Ok(image::ImageFormat::Jpeg) => ImageKind::Jpeg,
            Ok(image::ImageFormat::Png) => ImageKind::Png,
            _ => ImageKind::Unsupported,
        }
    }

    /// The PDF stream filter name for this kind.
    pub fn filter(self) -> Option<&'static str> {
        match self {
            ImageKind::Jpeg => Some("DCTDecode"),
            ImageKind::Png => Some("FlateDecode"),
            ImageKind::Unsupported => None,
        }
    }
}

/// PDF colour space of an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorModel {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
}

impl ColorModel {
    pub fn pdf_name(self) -> &'static str {
        match self {
            ColorModel::DeviceGray => "DeviceGray",
            ColorModel::DeviceRgb => "DeviceRGB",
            ColorModel::DeviceCmyk => "DeviceCMYK",
        }
    }

    pub fn components(self) -> u8 {
        match self {
            ColorModel::DeviceGray => 1,
            ColorModel::DeviceRgb => 3,
            ColorModel::DeviceCmyk => 4,
        }
    }
}

/// A successfully fetched and decoded image, ready to embed.
///
/// `data` is the stream payload exactly as it will appear in the PDF:
/// the original JPEG bytes, or zlib-compressed RGB samples for PNG input.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResource {
    pub source_url: String,
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub color: ColorModel,
    pub bits_per_component: u8,
    pub data: Vec<u8>,
}

/// Raw bytes returned by a [`crate::store::BlobFetcher`].
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}
