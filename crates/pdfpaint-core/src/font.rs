//! Font contract for text showing: turn shown bytes into glyph units.
//!
//! Decoding is lazy: [`Font::glyphs`] yields one [`Glyph`] per character code
//! as the text engine advances, so a show operator never materializes more
//! than the glyph it is placing.

use std::fmt;

/// Character code 32 (and the NUL code 0) count as word-space glyphs,
/// whatever encoding produced them.
pub fn is_whitespace_code(code: u32) -> bool {
    code == 0 || code == 32
}

/// One decoded glyph unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Character code as read from the shown string.
    pub code: u32,
    /// Horizontal displacement in glyph space (1/1000 of text space).
    pub width: f64,
    /// Whether word spacing applies after this glyph.
    pub is_whitespace: bool,
}

impl Glyph {
    pub fn new(code: u32, width: f64) -> Self {
        Self {
            code,
            width,
            is_whitespace: is_whitespace_code(code),
        }
    }
}

/// A font as seen by the text engine.
pub trait Font: fmt::Debug + Send + Sync {
    /// Base font name (e.g. `Helvetica`).
    fn name(&self) -> &str;

    /// Decode `bytes` into glyph units.
    fn glyphs<'a>(&'a self, bytes: &'a [u8]) -> Box<dyn Iterator<Item = Glyph> + 'a>;
}

/// Font with one-byte codes and a `/FirstChar` + `/Widths` table.
#[derive(Debug, Clone)]
pub struct SimpleFont {
    name: String,
    first_char: u32,
    widths: Vec<f64>,
    missing_width: f64,
}

impl SimpleFont {
    pub fn new(name: impl Into<String>, first_char: u32, widths: Vec<f64>, missing_width: f64) -> Self {
        Self {
            name: name.into(),
            first_char,
            widths,
            missing_width,
        }
    }

    /// Width of `code` in glyph space, `missing_width` outside the table.
    pub fn width(&self, code: u32) -> f64 {
        code.checked_sub(self.first_char)
            .and_then(|index| self.widths.get(index as usize))
            .copied()
            .unwrap_or(self.missing_width)
    }
}

impl Font for SimpleFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn glyphs<'a>(&'a self, bytes: &'a [u8]) -> Box<dyn Iterator<Item = Glyph> + 'a> {
        Box::new(bytes.iter().map(move |&b| {
            let code = u32::from(b);
            Glyph::new(code, self.width(code))
        }))
    }
}

/// Font with two-byte codes (Identity CMap) and CID width ranges.
#[derive(Debug, Clone)]
pub struct CompositeFont {
    name: String,
    default_width: f64,
    /// `(first, last, width)` ranges sorted by `first`.
    ranges: Vec<(u32, u32, f64)>,
}

impl CompositeFont {
    pub fn new(name: impl Into<String>, default_width: f64, mut ranges: Vec<(u32, u32, f64)>) -> Self {
        ranges.sort_by_key(|&(first, _, _)| first);
        Self {
            name: name.into(),
            default_width,
            ranges,
        }
    }

    pub fn width(&self, cid: u32) -> f64 {
        let idx = self.ranges.partition_point(|&(first, _, _)| first <= cid);
        idx.checked_sub(1)
            .map(|i| self.ranges[i])
            .filter(|&(_, last, _)| cid <= last)
            .map_or(self.default_width, |(_, _, w)| w)
    }
}

impl Font for CompositeFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn glyphs<'a>(&'a self, bytes: &'a [u8]) -> Box<dyn Iterator<Item = Glyph> + 'a> {
        // A trailing odd byte is padded with zero, as a truncated code.
        Box::new(bytes.chunks(2).map(move |pair| {
            let hi = u32::from(pair[0]);
            let lo = pair.get(1).copied().map_or(0, u32::from);
            let cid = (hi << 8) | lo;
            Glyph::new(cid, self.width(cid))
        }))
    }
}
