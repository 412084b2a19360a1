//! Built-in font metrics and string encoding.
//!
//! Every page uses one of the standard 14 fonts (Helvetica), which PDF
//! viewers must provide, so nothing is embedded. Text is written in
//! WinAnsiEncoding; the advance widths below are Helvetica's AFM widths in
//! 1/1000 em for the printable ASCII range.

/// Resource name the content streams use for the shared font.
pub const FONT_RESOURCE: &str = "F1";

/// PostScript name of the built-in font.
pub const BASE_FONT: &str = "Helvetica";

/// Advance widths for U+0020 ..= U+007E.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space … /
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0 … 9
    278, 278, 584, 584, 584, 556, 1015, // : … @
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A … M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N … Z
    278, 278, 278, 469, 556, 333, // [ … `
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a … m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n … z
    334, 260, 334, 584, // { … ~
];

/// Width used for anything outside the table.
const DEFAULT_WIDTH: u16 = 556;

/// Width of a single character in 1/1000 em.
pub fn char_width(ch: char) -> u16 {
    match ch {
        ' '..='~' => HELVETICA_ASCII[(ch as u32 - 0x20) as usize],
        '\u{00A0}' => 278,
        '\u{2018}' | '\u{2019}' => 222,
        '\u{201C}' | '\u{201D}' => 333,
        '\u{2022}' => 350,
        '\u{2014}' => 1000,
        _ => DEFAULT_WIDTH,
    }
}

/// Rendered width of `text` in points at `size`.
pub fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c))).sum();
    units as f32 * size / 1000.0
}

/// Map one character to its WinAnsiEncoding byte, if it has one.
fn win_ansi(ch: char) -> Option<u8> {
    match ch {
        ' '..='~' => Some(ch as u8),
        '\u{00A0}'..='\u{00FF}' => Some(ch as u32 as u8),
        '\u{20AC}' => Some(0x80),
        '\u{2018}' => Some(0x91),
        '\u{2019}' => Some(0x92),
        '\u{201C}' => Some(0x93),
        '\u{201D}' => Some(0x94),
        '\u{2022}' => Some(0x95),
        '\u{2013}' => Some(0x96),
        '\u{2014}' => Some(0x97),
        _ => None,
    }
}

/// Encode `text` as the body of a PDF literal string (without the parens).
///
/// Parentheses and backslashes are escaped; characters WinAnsi cannot
/// represent become `?`; control characters become spaces.
pub fn encode_literal(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(ch as u8);
            }
            c if c.is_control() => out.push(b' '),
            c => out.push(win_ansi(c).unwrap_or(b'?')),
        }
    }
    out
}
