//! Image decoding: fetched bytes → embeddable [`ImageResource`].
//!
//! JPEG data is already in a form PDF understands (`/DCTDecode`), so it is
//! embedded byte-for-byte after a trial decode proves it is readable. PNG
//! has no PDF filter of its own: the image is decoded, flattened onto white,
//! and the raw samples are zlib-compressed for `/FlateDecode`.
//!
//! Decoding is CPU-bound; callers run it on the blocking pool.

use crate::error::ResourceError;
use crate::record::{ColorModel, FetchedBlob, ImageKind, ImageResource};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Write;
use tracing::debug;

/// Decode the image fetched for position `index` of the record's URL list.
pub fn decode_image(
    index: usize,
    url: &str,
    blob: FetchedBlob,
    max_bytes: usize,
) -> Result<ImageResource, ResourceError> {
    if blob.bytes.len() > max_bytes {
        return Err(ResourceError::Unsupported {
            index,
            url: url.to_string(),
            detail: format!("{} bytes exceeds limit of {}", blob.bytes.len(), max_bytes),
        });
    }

    let kind = ImageKind::detect(blob.content_type.as_deref(), &blob.bytes);
    let decode_failed = |detail: String| ResourceError::DecodeFailed {
        index,
        url: url.to_string(),
        detail,
    };

    let resource = match kind {
        ImageKind::Jpeg => {
            let img = image::load_from_memory_with_format(&blob.bytes, ImageFormat::Jpeg)
                .map_err(|e| decode_failed(e.to_string()))?;
            let (width, height) = img.dimensions();
            let color = match jpeg_components(&blob.bytes) {
                Some(1) => ColorModel::DeviceGray,
                Some(4) => ColorModel::DeviceCmyk,
                Some(3) => ColorModel::DeviceRgb,
                _ if !img.color().has_color() => ColorModel::DeviceGray,
                _ => ColorModel::DeviceRgb,
            };
            ImageResource {
                source_url: url.to_string(),
                kind,
                width,
                height,
                color,
                bits_per_component: 8,
                data: blob.bytes,
            }
        }
        ImageKind::Png => {
            let img = image::load_from_memory_with_format(&blob.bytes, ImageFormat::Png)
                .map_err(|e| decode_failed(e.to_string()))?;
            let (width, height) = img.dimensions();
            let (color, samples) = flatten(&img);
            let data = zlib(&samples).map_err(|e| decode_failed(e.to_string()))?;
            ImageResource {
                source_url: url.to_string(),
                kind,
                width,
                height,
                color,
                bits_per_component: 8,
                data,
            }
        }
        ImageKind::Unsupported => {
            return Err(ResourceError::Unsupported {
                index,
                url: url.to_string(),
                detail: format!(
                    "content type {}",
                    blob.content_type.as_deref().unwrap_or("unknown")
                ),
            });
        }
    };

    debug!(
        "Image {} decoded: {:?} {}x{} {} → {} bytes",
        index,
        resource.kind,
        resource.width,
        resource.height,
        resource.color.pdf_name(),
        resource.data.len()
    );
    Ok(resource)
}

/// 8-bit samples with any alpha composited over white.
fn flatten(img: &DynamicImage) -> (ColorModel, Vec<u8>) {
    let color = img.color();
    match (color.has_color(), color.has_alpha()) {
        (false, false) => (ColorModel::DeviceGray, img.to_luma8().into_raw()),
        (false, true) => {
            let la = img.to_luma_alpha8();
            let samples = la.pixels().map(|p| over_white(p.0[0], p.0[1])).collect();
            (ColorModel::DeviceGray, samples)
        }
        (true, false) => (ColorModel::DeviceRgb, img.to_rgb8().into_raw()),
        (true, true) => {
            let rgba = img.to_rgba8();
            let mut samples = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 3);
            for p in rgba.pixels() {
                let [r, g, b, a] = p.0;
                samples.extend_from_slice(&[over_white(r, a), over_white(g, a), over_white(b, a)]);
            }
            (ColorModel::DeviceRgb, samples)
        }
    }
}

fn over_white(value: u8, alpha: u8) -> u8 {
    let (v, a) = (u32::from(value), u32::from(alpha));
    ((v * a + 255 * (255 - a) + 127) / 255) as u8
}

fn zlib(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Number of colour components declared in the JPEG frame header.
fn jpeg_components(data: &[u8]) -> Option<u8> {
    if data.get(0..2)? != [0xFF, 0xD8] {
        return None;
    }
    let mut i = 2;
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        if marker == 0xFF {
            i += 1;
            continue;
        }
        // Standalone markers carry no length.
        if (0xD0..=0xD9).contains(&marker) || marker == 0x01 {
            i += 2;
            continue;
        }
        let len = usize::from(u16::from_be_bytes([data[i + 2], data[i + 3]]));
        // SOF0..SOF15, excluding DHT, JPG and DAC.
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            return data.get(i + 9).copied();
        }
        i += 2 + len;
    }
    None
}
