//! Structural check of an assembled artifact.
//!
//! This reads back what [`crate::pipeline::assemble`] writes: it follows
//! `startxref` to the cross-reference table, confirms that every in-use
//! entry lands exactly on its `<id> 0 obj` line, and re-measures every
//! stream against its `/Length`. It understands the single-section,
//! uncompressed layout this crate produces, not arbitrary PDFs.

use crate::error::OrderFormError;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::Serialize;

static RE_STARTXREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"startxref\s+(\d+)\s+%%EOF\s*$").unwrap());
static RE_SUBSECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^xref\r?\n0 (\d+)\r?\n").unwrap());
static RE_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Size (\d+)").unwrap());
static RE_ROOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Root (\d+) 0 R").unwrap());
static RE_LENGTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Length (\d+)").unwrap());
static RE_PAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Type /Page(?-u:\b)").unwrap());
static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Subtype /Image(?-u:\b)").unwrap());

/// What [`inspect_artifact`] found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
    /// Header version, e.g. `1.4`.
    pub version: String,
    /// Number of in-use objects (trailer `/Size` minus the free entry).
    pub object_count: u32,
    pub root: u32,
    pub xref_offset: usize,
    /// `offsets[i]` is the start of object `i + 1`.
    pub offsets: Vec<usize>,
    pub page_count: usize,
    pub image_count: usize,
    pub bytes: usize,
}

fn corrupt(detail: impl Into<String>) -> OrderFormError {
    OrderFormError::CorruptArtifact {
        detail: detail.into(),
    }
}

fn parse_num<T: std::str::FromStr>(raw: &[u8], what: &str) -> Result<T, OrderFormError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| corrupt(format!("unreadable {what}")))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Validate `bytes` and summarise its structure.
pub fn inspect_artifact(bytes: &[u8]) -> Result<ArtifactSummary, OrderFormError> {
    let version = bytes
        .strip_prefix(b"%PDF-")
        .and_then(|rest| rest.split(|&b| b == b'\n').next())
        .map(|v| String::from_utf8_lossy(v).trim().to_string())
        .ok_or_else(|| corrupt("missing %PDF- header"))?;

    // The trailer and xref table live in the tail, which is plain ASCII.
    let tail_start = bytes.len().saturating_sub(64);
    let caps = RE_STARTXREF
        .captures(&bytes[tail_start..])
        .ok_or_else(|| corrupt("missing startxref / %%EOF"))?;
    let xref_offset: usize = parse_num(&caps[1], "startxref offset")?;
    let xref = bytes
        .get(xref_offset..)
        .ok_or_else(|| corrupt("startxref points past end of file"))?;

    let sub = RE_SUBSECTION
        .captures(xref)
        .ok_or_else(|| corrupt(format!("no xref table at offset {xref_offset}")))?;
    let size: u32 = parse_num(&sub[1], "xref entry count")?;
    let mut cursor = sub.get(0).map_or(0, |m| m.end());

    let mut offsets = Vec::with_capacity(size as usize);
    for id in 0..size {
        let entry = xref
            .get(cursor..cursor + 20)
            .ok_or_else(|| corrupt(format!("xref entry {id} truncated")))?;
        cursor += 20;
        let offset: usize = parse_num(&entry[0..10], "xref offset")?;
        match (id, entry[17]) {
            (0, b'f') => {}
            (0, _) => return Err(corrupt("xref entry 0 is not the free-list head")),
            (_, b'n') => offsets.push(offset),
            (_, _) => return Err(corrupt(format!("xref entry {id} is not in use"))),
        }
    }

    let trailer = &xref[cursor..];
    if !trailer.starts_with(b"trailer") {
        return Err(corrupt("xref table not followed by trailer"));
    }
    let trailer_size: u32 = RE_SIZE
        .captures(trailer)
        .ok_or_else(|| corrupt("trailer has no /Size"))
        .and_then(|c| parse_num(&c[1], "/Size"))?;
    if trailer_size != size {
        return Err(corrupt(format!(
            "trailer /Size {trailer_size} disagrees with {size} xref entries"
        )));
    }
    let root: u32 = RE_ROOT
        .captures(trailer)
        .ok_or_else(|| corrupt("trailer has no /Root"))
        .and_then(|c| parse_num(&c[1], "/Root"))?;
    if root == 0 || root >= size {
        return Err(corrupt(format!("/Root {root} is not a listed object")));
    }

    let mut page_count = 0;
    let mut image_count = 0;
    for (i, &offset) in offsets.iter().enumerate() {
        let id = i + 1;
        let marker = format!("{id} 0 obj\n");
        let body_start = offset + marker.len();
        if bytes.get(offset..body_start) != Some(marker.as_bytes()) {
            return Err(corrupt(format!(
                "xref offset {offset} for object {id} does not start '{id} 0 obj'"
            )));
        }
        if offset >= xref_offset {
            return Err(corrupt(format!("object {id} lies inside the xref section")));
        }
        let region = &bytes[body_start..xref_offset];
        let dict_end = match (find(region, b"stream\n"), find(region, b"endobj")) {
            (Some(s), Some(e)) if s < e => {
                let dict = &region[..s];
                let length: usize = RE_LENGTH
                    .captures(dict)
                    .ok_or_else(|| corrupt(format!("stream object {id} has no /Length")))
                    .and_then(|c| parse_num(&c[1], "/Length"))?;
                let data_start = s + b"stream\n".len();
                let after = region
                    .get(data_start + length..)
                    .ok_or_else(|| corrupt(format!("stream {id} runs past end of file")))?;
                if !after.starts_with(b"\nendstream") {
                    return Err(corrupt(format!(
                        "stream {id} /Length {length} does not reach endstream"
                    )));
                }
                s
            }
            (_, Some(e)) => e,
            (_, None) => return Err(corrupt(format!("object {id} has no endobj"))),
        };
        let dict = &region[..dict_end];
        if RE_PAGE.is_match(dict) {
            page_count += 1;
        }
        if RE_IMAGE.is_match(dict) {
            image_count += 1;
        }
    }

    Ok(ArtifactSummary {
        version,
        object_count: size.saturating_sub(1),
        root,
        xref_offset,
        offsets,
        page_count,
        image_count,
        bytes: bytes.len(),
    })
}
