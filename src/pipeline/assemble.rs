//! PDF assembly: [`Document`] → complete PDF byte buffer.
//!
//! ## Two phases
//!
//! 1. [`ObjectPlan::allocate`] numbers every object up front, in a fixed
//!    walk order: catalog, page tree, font, images, content streams, pages.
//!    Forward references (the page tree's `/Kids`, each page's `/Contents`)
//!    therefore resolve to numbers that are already known.
//! 2. [`PdfWriter`] appends each object exactly once, in ascending id order,
//!    recording the offset at which it starts. Nothing already written is
//!    ever touched again, so the offsets in the cross-reference table are
//!    exact by construction.
//!
//! The writer refuses to emit a stream whose declared `/Length` differs from
//! its payload, an object out of sequence, or a table with holes. Each of
//! those is a bug, reported as [`AssemblyError`].

use crate::error::AssemblyError;
use crate::font::{BASE_FONT, FONT_RESOURCE};
use crate::pipeline::layout::{fmt_num, Document, IMAGE_RESOURCE};
use crate::record::{ColorModel, ImageKind, ImageResource};
use tracing::debug;

/// File header. The second line marks the file as binary for transfer tools.
pub const HEADER: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n";

/// Object numbers for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPlan {
    pub catalog: u32,
    pub page_tree: u32,
    pub font: u32,
    pub images: Vec<u32>,
    pub contents: Vec<u32>,
    pub pages: Vec<u32>,
}

struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    fn next(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    fn take(&mut self, n: usize) -> Vec<u32> {
        (0..n).map(|_| self.next()).collect()
    }
}

impl ObjectPlan {
    pub fn allocate(doc: &Document) -> Self {
        let mut ids = IdAllocator { next: 1 };
        let catalog = ids.next();
        let page_tree = ids.next();
        let font = ids.next();
        let images = ids.take(doc.images.len());
        let contents = ids.take(doc.pages.len());
        let pages = ids.take(doc.pages.len());
        Self {
            catalog,
            page_tree,
            font,
            images,
            contents,
            pages,
        }
    }

    /// Highest allocated object number.
    pub fn object_count(&self) -> u32 {
        3 + (self.images.len() + self.contents.len() + self.pages.len()) as u32
    }
}

/// Serialise `doc` into a complete PDF.
pub fn assemble_document(doc: &Document) -> Result<Vec<u8>, AssemblyError> {
    let plan = ObjectPlan::allocate(doc);
    let mut w = PdfWriter::new();

    w.write_object(
        plan.catalog,
        &format!("<< /Type /Catalog /Pages {} 0 R >>", plan.page_tree),
    )?;

    let kids = plan
        .pages
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ");
    w.write_object(
        plan.page_tree,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            plan.pages.len()
        ),
    )?;

    w.write_object(
        plan.font,
        &format!(
            "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
            BASE_FONT
        ),
    )?;

    for (index, (&id, image)) in plan.images.iter().zip(&doc.images).enumerate() {
        let entries = image_entries(index, image)?;
        w.write_stream(id, &entries, image.data.len(), &image.data)?;
    }

    for (&id, page) in plan.contents.iter().zip(&doc.pages) {
        w.write_stream(
            id,
            "",
            page.content.declared_length(),
            page.content.data(),
        )?;
    }

    let layout = &doc.layout;
    for (page_index, ((&id, &content_id), page)) in plan
        .pages
        .iter()
        .zip(&plan.contents)
        .zip(&doc.pages)
        .enumerate()
    {
        let mut resources = format!("/Font << /{} {} 0 R >>", FONT_RESOURCE, plan.font);
        if let Some(image) = page.image {
            let image_id = plan.images.get(image).ok_or(AssemblyError::DanglingImage {
                page: page_index,
                image,
            })?;
            resources.push_str(&format!(" /XObject << /{} {} 0 R >>", IMAGE_RESOURCE, image_id));
        }
        w.write_object(
            id,
            &format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources << {} >> /Contents {} 0 R >>",
                plan.page_tree,
                fmt_num(layout.page_width),
                fmt_num(layout.page_height),
                resources,
                content_id
            ),
        )?;
    }

    let bytes = w.finish(&plan)?;
    debug!(
        "Assembled {} objects, {} pages, {} bytes",
        plan.object_count(),
        plan.pages.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Dictionary entries (minus `/Length`) for an image XObject.
fn image_entries(index: usize, image: &ImageResource) -> Result<String, AssemblyError> {
    let filter = image
        .kind
        .filter()
        .ok_or(AssemblyError::UnembeddableImage { index })?;
    let mut entries = format!(
        "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /{} /BitsPerComponent {} /Filter /{}",
        image.width,
        image.height,
        image.color.pdf_name(),
        image.bits_per_component,
        filter
    );
    // Adobe writes CMYK JPEGs inverted.
    if image.kind == ImageKind::Jpeg && image.color == ColorModel::DeviceCmyk {
        entries.push_str(" /Decode [1 0 1 0 1 0 1 0]");
    }
    Ok(entries)
}

/// Append-only PDF object writer with offset bookkeeping.
pub struct PdfWriter {
    buf: Vec<u8>,
    /// `offsets[i]` is where object `i + 1` starts.
    offsets: Vec<usize>,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self {
            buf: HEADER.to_vec(),
            offsets: Vec::new(),
        }
    }

    fn begin(&mut self, id: u32) -> Result<(), AssemblyError> {
        let expected = self.offsets.len() as u32 + 1;
        if id != expected {
            return Err(AssemblyError::NonSequentialId {
                expected,
                found: id,
            });
        }
        self.offsets.push(self.buf.len());
        self.buf.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
        Ok(())
    }

    /// Write a non-stream object.
    pub fn write_object(&mut self, id: u32, body: &str) -> Result<(), AssemblyError> {
        self.begin(id)?;
        self.buf.extend_from_slice(body.as_bytes());
        self.buf.extend_from_slice(b"\nendobj\n");
        Ok(())
    }

    /// Write a stream object. `entries` are extra dictionary entries; the
    /// writer adds `/Length declared` itself after checking it against `data`.
    pub fn write_stream(
        &mut self,
        id: u32,
        entries: &str,
        declared: usize,
        data: &[u8],
    ) -> Result<(), AssemblyError> {
        if declared != data.len() {
            return Err(AssemblyError::LengthMismatch {
                id,
                declared,
                actual: data.len(),
            });
        }
        self.begin(id)?;
        let dict = if entries.is_empty() {
            format!("<< /Length {} >>", declared)
        } else {
            format!("<< {} /Length {} >>", entries, declared)
        };
        self.buf.extend_from_slice(dict.as_bytes());
        self.buf.extend_from_slice(b"\nstream\n");
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        Ok(())
    }

    /// Append the cross-reference table and trailer.
    pub fn finish(mut self, plan: &ObjectPlan) -> Result<Vec<u8>, AssemblyError> {
        let written = self.offsets.len() as u32;
        let allocated = plan.object_count();
        if written != allocated {
            return Err(AssemblyError::MissingObjects { allocated, written });
        }

        let size = written + 1;
        let xref_start = self.buf.len();
        self.buf
            .extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        self.buf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &self.offsets {
            self.buf
                .extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        self.buf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
                size, plan.catalog, xref_start
            )
            .as_bytes(),
        );
        Ok(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageLayout;
    use crate::pipeline::layout::build_document;
    use crate::record::SourceRecord;

    fn image() -> ImageResource {
        ImageResource {
            source_url: "u".into(),
            kind: ImageKind::Jpeg,
            width: 4,
            height: 3,
            color: ColorModel::DeviceRgb,
            bits_per_component: 8,
            data: vec![0xFF, 0xD8, 0x00, 0xFF, 0xD9],
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn plan_order() {
        let doc = build_document(
            &SourceRecord::new("r"),
            vec![image(), image()],
            &PageLayout::default(),
        );
        let plan = ObjectPlan::allocate(&doc);
        assert_eq!(plan.catalog, 1);
        assert_eq!(plan.page_tree, 2);
        assert_eq!(plan.font, 3);
        assert_eq!(plan.images, vec![4, 5]);
        assert_eq!(plan.contents, vec![6, 7, 8]);
        assert_eq!(plan.pages, vec![9, 10, 11]);
        assert_eq!(plan.object_count(), 11);
    }

    #[test]
    fn objects_appear_in_id_order_at_recorded_offsets() {
        let doc = build_document(&SourceRecord::new("r"), vec![image()], &PageLayout::default());
        let bytes = assemble_document(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.4\n"));
        assert!(bytes.ends_with(b"%%EOF\n"));

        let mut last = 0;
        for id in 1..=8 {
            let pos = find(&bytes, format!("\n{} 0 obj\n", id).as_bytes()).unwrap() + 1;
            assert!(pos > last, "object {id} out of order");
            last = pos;
            let entry = format!("{:010} 00000 n \n", pos);
            assert!(find(&bytes, entry.as_bytes()).is_some(), "no xref entry for {id}");
        }
        assert!(find(&bytes, b"xref\n0 9\n0000000000 65535 f \n").is_some());
        assert!(find(&bytes, b"/Size 9 /Root 1 0 R").is_some());
    }

    #[test]
    fn page_references() {
        let doc = build_document(&SourceRecord::new("r"), vec![image()], &PageLayout::default());
        let bytes = assemble_document(&doc).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Type /Pages /Kids [7 0 R 8 0 R] /Count 2"));
        assert!(text.contains("/MediaBox [0 0 595 842]"));
        assert!(text.contains("/Resources << /Font << /F1 3 0 R >> >> /Contents 5 0 R"));
        assert!(text.contains(
            "/Resources << /Font << /F1 3 0 R >> /XObject << /Im1 4 0 R >> >> /Contents 6 0 R"
        ));
        assert!(text.contains(
            "/Width 4 /Height 3 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode /Length 5"
        ));
    }

    #[test]
    fn cmyk_jpeg_gets_decode_array() {
        let mut img = image();
        img.color = ColorModel::DeviceCmyk;
        let entries = image_entries(0, &img).unwrap();
        assert!(entries.contains("/ColorSpace /DeviceCMYK"));
        assert!(entries.contains("/Decode [1 0 1 0 1 0 1 0]"));
    }

    #[test]
    fn unsupported_image_is_a_defect() {
        let mut img = image();
        img.kind = ImageKind::Unsupported;
        let doc = build_document(&SourceRecord::new("r"), vec![img], &PageLayout::default());
        assert_eq!(
            assemble_document(&doc).unwrap_err(),
            AssemblyError::UnembeddableImage { index: 0 }
        );
    }

    #[test]
    fn dangling_image_reference_is_a_defect() {
        let mut doc = build_document(&SourceRecord::new("r"), Vec::new(), &PageLayout::default());
        doc.pages[0].image = Some(3);
        assert_eq!(
            assemble_document(&doc).unwrap_err(),
            AssemblyError::DanglingImage { page: 0, image: 3 }
        );
    }

    #[test]
    fn writer_rejects_length_mismatch() {
        let mut w = PdfWriter::new();
        let err = w.write_stream(1, "", 4, b"abc").unwrap_err();
        assert_eq!(
            err,
            AssemblyError::LengthMismatch {
                id: 1,
                declared: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn writer_rejects_out_of_order_and_duplicates() {
        let mut w = PdfWriter::new();
        assert_eq!(
            w.write_object(2, "<< >>").unwrap_err(),
            AssemblyError::NonSequentialId {
                expected: 1,
                found: 2
            }
        );
        w.write_object(1, "<< >>").unwrap();
        assert_eq!(
            w.write_object(1, "<< >>").unwrap_err(),
            AssemblyError::NonSequentialId {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn writer_rejects_missing_objects() {
        let doc = build_document(&SourceRecord::new("r"), Vec::new(), &PageLayout::default());
        let plan = ObjectPlan::allocate(&doc);
        let mut w = PdfWriter::new();
        w.write_object(1, "<< >>").unwrap();
        assert_eq!(
            w.finish(&plan).unwrap_err(),
            AssemblyError::MissingObjects {
                allocated: 5,
                written: 1
            }
        );
    }
}
