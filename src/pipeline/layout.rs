//! Document model: record + images → pages of drawing instructions.
//!
//! The first page is a text summary of the enquiry; every embedded image
//! then gets a page of its own, in the order the images were supplied.
//! This stage never fails. Missing fields render as [`PLACEHOLDER`], and a
//! summary that runs past the bottom margin is cut off rather than spilling
//! onto another page.

use crate::config::PageLayout;
use crate::font::{self, FONT_RESOURCE};
use crate::record::{ImageResource, SourceRecord};
use tracing::debug;

/// Rendered in place of any empty or missing field.
pub const PLACEHOLDER: &str = "N/A";

/// First line of the summary page.
pub const TITLE: &str = "ORDER FORM / ENQUIRY DETAILS";

/// Resource name of the image drawn on an image page.
pub const IMAGE_RESOURCE: &str = "Im1";

/// One instruction in a page's content stream. Coordinates are PDF points
/// from the bottom-left corner.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Show `text` with the shared font, baseline starting at (`x`, `y`).
    Text { x: f32, y: f32, size: f32, text: String },
    /// Stroke a straight line.
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
    },
    /// Paint the page's image resource into the given rectangle.
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

impl DrawOp {
    fn write(&self, out: &mut Vec<u8>) {
        match self {
            DrawOp::Text { x, y, size, text } => {
                out.extend_from_slice(
                    format!(
                        "BT /{} {} Tf {} {} Td (",
                        FONT_RESOURCE,
                        fmt_num(*size),
                        fmt_num(*x),
                        fmt_num(*y)
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(&font::encode_literal(text));
                out.extend_from_slice(b") Tj ET\n");
            }
            DrawOp::Line {
                x1,
                y1,
                x2,
                y2,
                width,
            } => {
                out.extend_from_slice(
                    format!(
                        "{} w {} {} m {} {} l S\n",
                        fmt_num(*width),
                        fmt_num(*x1),
                        fmt_num(*y1),
                        fmt_num(*x2),
                        fmt_num(*y2)
                    )
                    .as_bytes(),
                );
            }
            DrawOp::Image {
                x,
                y,
                width,
                height,
            } => {
                out.extend_from_slice(
                    format!(
                        "q {} 0 0 {} {} {} cm /{} Do Q\n",
                        fmt_num(*width),
                        fmt_num(*height),
                        fmt_num(*x),
                        fmt_num(*y),
                        IMAGE_RESOURCE
                    )
                    .as_bytes(),
                );
            }
        }
    }
}

/// A page's drawing instructions together with their serialised bytes.
///
/// The bytes are produced once, at construction, and `declared_length` is
/// recorded alongside them; the assembler writes the latter as `/Length`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentStream {
    ops: Vec<DrawOp>,
    data: Vec<u8>,
    declared_length: usize,
}

impl ContentStream {
    pub fn new(ops: Vec<DrawOp>) -> Self {
        let mut data = Vec::new();
        for op in &ops {
            op.write(&mut data);
        }
        let declared_length = data.len();
        Self {
            ops,
            data,
            declared_length,
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn declared_length(&self) -> usize {
        self.declared_length
    }

    /// Text of every `Text` op, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// One page of the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub content: ContentStream,
    /// Index into [`Document::images`] of the image this page shows.
    pub image: Option<usize>,
}

/// The in-memory document handed to the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub layout: PageLayout,
    pub pages: Vec<Page>,
    pub images: Vec<ImageResource>,
}

/// Summary-page values, resolved from the record once.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryFields {
    pub name: String,
    pub contact: String,
    pub location: String,
    pub service: String,
    pub area: String,
    pub requirements: String,
    pub date: String,
    /// Present only when the record lists at least one image URL.
    pub images: Option<String>,
}

impl SummaryFields {
    pub fn from_record(record: &SourceRecord, embedded: usize) -> Self {
        let text = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let area = record
            .area_sq_ft
            .filter(|a| a.is_finite())
            .map(|a| format!("{} sq.ft", fmt_num(a)));
        let attached = record.image_urls.len();
        let images = (attached > 0).then(|| {
            if embedded == attached {
                attached.to_string()
            } else {
                format!("{attached} ({embedded} embedded)")
            }
        });

        Self {
            name: text(&record.name).unwrap_or_else(|| PLACEHOLDER.into()),
            contact: text(&record.contact).unwrap_or_else(|| PLACEHOLDER.into()),
            location: text(&record.location)
                .or_else(|| text(&record.place))
                .unwrap_or_else(|| PLACEHOLDER.into()),
            // Older rows carried the service in `place`.
            service: text(&record.service)
                .or_else(|| text(&record.place))
                .unwrap_or_else(|| PLACEHOLDER.into()),
            area: area.unwrap_or_else(|| PLACEHOLDER.into()),
            requirements: text(&record.requirements).unwrap_or_else(|| PLACEHOLDER.into()),
            date: record
                .created_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| PLACEHOLDER.into()),
            images,
        }
    }

    /// Label/value rows in display order.
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        let mut rows = vec![
            ("Name:", self.name.as_str()),
            ("Phone:", self.contact.as_str()),
            ("Location:", self.location.as_str()),
            ("Service:", self.service.as_str()),
            ("Area:", self.area.as_str()),
            ("Requirements:", self.requirements.as_str()),
            ("Date:", self.date.as_str()),
        ];
        if let Some(ref images) = self.images {
            rows.push(("Images:", images.as_str()));
        }
        rows
    }
}

/// Build the page list: one summary page, then one page per image.
pub fn build_document(
    record: &SourceRecord,
    images: Vec<ImageResource>,
    layout: &PageLayout,
) -> Document {
    let fields = SummaryFields::from_record(record, images.len());
    let mut pages = Vec::with_capacity(1 + images.len());
    pages.push(Page {
        content: summary_page(&fields, layout),
        image: None,
    });
    for (i, image) in images.iter().enumerate() {
        pages.push(Page {
            content: image_page(image, layout),
            image: Some(i),
        });
    }
    debug!(
        "Document model for '{}': {} page(s), {} image(s)",
        record.id,
        pages.len(),
        images.len()
    );
    Document {
        layout: layout.clone(),
        pages,
        images,
    }
}

fn summary_page(fields: &SummaryFields, layout: &PageLayout) -> ContentStream {
    let mut ops = Vec::new();
    let mut y = layout.page_height - layout.margin;

    ops.push(DrawOp::Text {
        x: layout.margin,
        y,
        size: layout.title_font_size,
        text: TITLE.to_string(),
    });
    y -= layout.line_height * 1.5;
    let rule_y = y + layout.line_height * 0.5;
    ops.push(DrawOp::Line {
        x1: layout.margin,
        y1: rule_y,
        x2: layout.page_width - layout.margin,
        y2: rule_y,
        width: 0.5,
    });

    let value_x = layout.margin + layout.label_width;
    'rows: for (label, value) in fields.rows() {
        let lines = wrap_text(value, layout.font_size, layout.value_width());
        for (i, line) in lines.into_iter().enumerate() {
            if y < layout.margin {
                debug!("Summary truncated at row '{}'", label);
                break 'rows;
            }
            if i == 0 {
                ops.push(DrawOp::Text {
                    x: layout.margin,
                    y,
                    size: layout.font_size,
                    text: label.to_string(),
                });
            }
            ops.push(DrawOp::Text {
                x: value_x,
                y,
                size: layout.font_size,
                text: line,
            });
            y -= layout.line_height;
        }
    }

    ContentStream::new(ops)
}

fn image_page(image: &ImageResource, layout: &PageLayout) -> ContentStream {
    let (x, y, width, height) = fit_image(image.width, image.height, layout);
    ContentStream::new(vec![DrawOp::Image {
        x,
        y,
        width,
        height,
    }])
}

/// Scale a `width`×`height` pixel image proportionally into the printable
/// area and centre it on the page. Returns `(x, y, width, height)` in points.
pub fn fit_image(width: u32, height: u32, layout: &PageLayout) -> (f32, f32, f32, f32) {
    let (avail_w, avail_h) = layout.printable_area();
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    let scale = (avail_w / w).min(avail_h / h);
    let (dw, dh) = (w * scale, h * scale);
    (
        (layout.page_width - dw) / 2.0,
        (layout.page_height - dh) / 2.0,
        dw,
        dh,
    )
}

/// Greedy word wrap against the built-in font's metrics.
///
/// A word wider than `max_width` on its own still gets a line to itself;
/// words are never split. Always returns at least one line.
pub fn wrap_text(text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if font::text_width(&candidate, size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Format a number for content streams: at most two decimals, no trailing zeros.
pub(crate) fn fmt_num(value: impl Into<f64>) -> String {
    let s = format!("{:.2}", value.into());
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ColorModel, ImageKind};
    use chrono::TimeZone;

    fn asha() -> SourceRecord {
        SourceRecord {
            name: Some("Asha".into()),
            contact: Some("9999999999".into()),
            location: Some("Kochi".into()),
            service: Some("Renovation".into()),
            area_sq_ft: Some(1200.0),
            requirements: Some("Open kitchen, 2BHK, budget paint".into()),
            created_at: Some(chrono::Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()),
            ..SourceRecord::new("rec-1")
        }
    }

    fn image(width: u32, height: u32) -> ImageResource {
        ImageResource {
            source_url: "u".into(),
            kind: ImageKind::Jpeg,
            width,
            height,
            color: ColorModel::DeviceRgb,
            bits_per_component: 8,
            data: vec![0; 4],
        }
    }

    #[test]
    fn fmt_num_trims() {
        assert_eq!(fmt_num(50.0f32), "50");
        assert_eq!(fmt_num(371.25f32), "371.25");
        assert_eq!(fmt_num(0.5f32), "0.5");
        assert_eq!(fmt_num(1200.0f64), "1200");
        assert_eq!(fmt_num(-0.001f64), "0");
    }

    #[test]
    fn missing_fields_use_placeholder() {
        let rec = SourceRecord {
            name: Some("   ".into()),
            place: Some("Thrissur".into()),
            ..SourceRecord::new("x")
        };
        let f = SummaryFields::from_record(&rec, 0);
        assert_eq!(f.name, PLACEHOLDER);
        assert_eq!(f.contact, PLACEHOLDER);
        assert_eq!(f.location, "Thrissur");
        assert_eq!(f.service, "Thrissur");
        assert_eq!(f.area, PLACEHOLDER);
        assert_eq!(f.date, PLACEHOLDER);
        assert!(f.images.is_none());
        assert_eq!(f.rows().len(), 7);
    }

    #[test]
    fn service_falls_back_to_place() {
        let rec = SourceRecord {
            service: Some("Interior painting".into()),
            place: Some("Kochi".into()),
            ..SourceRecord::new("x")
        };
        assert_eq!(SummaryFields::from_record(&rec, 0).service, "Interior painting");

        let rec = SourceRecord {
            service: Some("".into()),
            place: Some("Kochi".into()),
            ..SourceRecord::new("x")
        };
        assert_eq!(SummaryFields::from_record(&rec, 0).service, "Kochi");

        assert_eq!(SummaryFields::from_record(&SourceRecord::new("x"), 0).service, PLACEHOLDER);
    }

    #[test]
    fn image_count_row() {
        let mut rec = asha();
        rec.image_urls = vec!["a".into(), "b".into()];
        let f = SummaryFields::from_record(&rec, 1);
        assert_eq!(f.images.as_deref(), Some("2 (1 embedded)"));
        assert_eq!(f.rows().len(), 8);
        assert_eq!(SummaryFields::from_record(&rec, 2).images.as_deref(), Some("2"));
    }

    #[test]
    fn wrap_splits_long_values_within_width() {
        let text = "Open kitchen with island, two bedrooms with attached baths, \
                    budget paint in every room and a balcony garden";
        let lines = wrap_text(text, 11.0, 375.0);
        assert!(lines.len() >= 2, "got {lines:?}");
        for line in &lines {
            assert!(font::text_width(line, 11.0) <= 375.0, "too wide: {line}");
        }
        assert_eq!(lines.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn wrap_keeps_oversized_word_alone() {
        let long = "x".repeat(200);
        let lines = wrap_text(&format!("a {long} b"), 11.0, 375.0);
        assert_eq!(lines, vec!["a".to_string(), long, "b".to_string()]);
    }

    #[test]
    fn wrap_empty_yields_one_line() {
        assert_eq!(wrap_text("", 11.0, 100.0), vec![String::new()]);
        assert_eq!(wrap_text("short", 11.0, 375.0), vec!["short".to_string()]);
    }

    #[test]
    fn summary_page_layout() {
        let doc = build_document(&asha(), Vec::new(), &PageLayout::default());
        assert_eq!(doc.pages.len(), 1);
        let content = &doc.pages[0].content;
        let texts: Vec<&str> = content.texts().collect();
        assert_eq!(texts[0], TITLE);
        assert!(texts.contains(&"Name:"));
        assert!(texts.contains(&"Asha"));
        assert!(texts.contains(&"1200 sq.ft"));
        assert!(texts.contains(&"2026-03-01"));

        match &content.ops()[0] {
            DrawOp::Text { y, size, .. } => {
                assert_eq!(*y, 792.0);
                assert_eq!(*size, 18.0);
            }
            other => panic!("unexpected first op {other:?}"),
        }
        assert!(matches!(content.ops()[1], DrawOp::Line { .. }));
        // First row sits 1.5 line heights below the title.
        match &content.ops()[2] {
            DrawOp::Text { x, y, text, .. } => {
                assert_eq!((*x, *y), (50.0, 768.0));
                assert_eq!(text, "Name:");
            }
            other => panic!("unexpected op {other:?}"),
        }
        assert_eq!(content.declared_length(), content.data().len());
    }

    #[test]
    fn summary_truncates_at_bottom_margin() {
        let mut rec = asha();
        rec.requirements = Some("word ".repeat(2000));
        let doc = build_document(&rec, Vec::new(), &PageLayout::default());
        let content = &doc.pages[0].content;
        let mut min_y = f32::MAX;
        for op in content.ops() {
            if let DrawOp::Text { y, .. } = op {
                min_y = min_y.min(*y);
            }
        }
        assert!(min_y >= 50.0, "text below margin at {min_y}");
        assert!(!content.texts().any(|t| t == "Date:"));
        assert_eq!(doc.pages.len(), 1);
    }

    #[test]
    fn image_pages_follow_in_order() {
        let images = vec![image(100, 50), image(10, 1000)];
        let doc = build_document(&asha(), images, &PageLayout::default());
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.pages[1].image, Some(0));
        assert_eq!(doc.pages[2].image, Some(1));
    }

    #[test]
    fn fit_image_scales_and_centres() {
        let layout = PageLayout::default();
        // Landscape: width-bound.
        let (x, y, w, h) = fit_image(1000, 500, &layout);
        assert!((w - 495.0).abs() < 1e-3);
        assert!((h - 247.5).abs() < 1e-3);
        assert!((x - 50.0).abs() < 1e-3);
        assert!((y - (842.0 - 247.5) / 2.0).abs() < 1e-3);
        // Tall: height-bound.
        let (x, y, w, h) = fit_image(100, 1000, &layout);
        assert!((h - 742.0).abs() < 1e-3);
        assert!((w - 74.2).abs() < 1e-3);
        assert!((y - 50.0).abs() < 1e-3);
        assert!((x - (595.0 - 74.2) / 2.0).abs() < 1e-3);
    }

    #[test]
    fn content_stream_bytes() {
        let cs = ContentStream::new(vec![
            DrawOp::Text {
                x: 50.0,
                y: 700.0,
                size: 11.0,
                text: "a(b)".into(),
            },
            DrawOp::Image {
                x: 50.0,
                y: 60.5,
                width: 495.0,
                height: 100.0,
            },
        ]);
        assert_eq!(
            cs.data(),
            b"BT /F1 11 Tf 50 700 Td (a\\(b\\)) Tj ET\nq 495 0 0 100 50 60.5 cm /Im1 Do Q\n"
        );
        assert_eq!(cs.declared_length(), cs.data().len());
    }
}
