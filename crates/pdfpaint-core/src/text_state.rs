//! Text state: the `Tc Tw Tz TL Tf Tr Ts` parameters plus the text matrices.
//!
//! The three derived quantities used by glyph placement (`advance_factor`,
//! `scaled_char_spacing`, `scaled_word_spacing`) are private and recomputed by
//! every setter that feeds them, so they can never be read stale.

use std::fmt;
use std::sync::Arc;

use crate::font::{Font, Glyph};
use crate::geometry::{Affine, matrix, premultiply, translation};

/// Text rendering mode values (`Tr` operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRenderMode {
    #[default]
    Fill = 0,
    Stroke = 1,
    FillStroke = 2,
    Invisible = 3,
    FillClip = 4,
    StrokeClip = 5,
    FillStrokeClip = 6,
    Clip = 7,
}

impl TextRenderMode {
    /// Create a mode from the `Tr` operand (0-7). Returns `None` otherwise.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Fill),
            1 => Some(Self::Stroke),
            2 => Some(Self::FillStroke),
            3 => Some(Self::Invisible),
            4 => Some(Self::FillClip),
            5 => Some(Self::StrokeClip),
            6 => Some(Self::FillStrokeClip),
            7 => Some(Self::Clip),
            _ => None,
        }
    }
}

/// The font selected by `Tf`: its resource name and, when it was resolved,
/// the font itself.
#[derive(Clone)]
pub struct FontRef {
    pub name: String,
    pub font: Option<Arc<dyn Font>>,
}

impl FontRef {
    pub fn new(name: impl Into<String>, font: Option<Arc<dyn Font>>) -> Self {
        Self {
            name: name.into(),
            font,
        }
    }
}

impl PartialEq for FontRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && match (&self.font, &other.font) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Debug for FontRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontRef")
            .field("name", &self.name)
            .field("resolved", &self.font.as_ref().map(|font| font.name().to_string()))
            .finish()
    }
}

/// Text state tracked as part of the graphics state.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    font: Option<FontRef>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// Percentage, 100 = normal.
    horizontal_scaling: f64,
    leading: f64,
    render_mode: TextRenderMode,
    rise: f64,
    text_matrix: Affine,
    line_matrix: Affine,
    /// `text_matrix × CTM`
    global_matrix: Affine,
    in_text_object: bool,

    advance_factor: f64,
    scaled_char_spacing: f64,
    scaled_word_spacing: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self::new()
    }
}

impl TextState {
    pub fn new() -> Self {
        let mut state = Self {
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            render_mode: TextRenderMode::default(),
            rise: 0.0,
            text_matrix: Affine::IDENTITY,
            line_matrix: Affine::IDENTITY,
            global_matrix: Affine::IDENTITY,
            in_text_object: false,
            advance_factor: 0.0,
            scaled_char_spacing: 0.0,
            scaled_word_spacing: 0.0,
        };
        state.refresh();
        state
    }

    // --- Parameters ---

    /// `Tf` operator.
    pub fn set_font(&mut self, font: FontRef, size: f64) {
        self.font = Some(font);
        self.font_size = size;
        self.refresh();
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.font_size = size;
        self.refresh();
    }

    /// `Tc` operator.
    pub fn set_char_spacing(&mut self, spacing: f64) {
        self.char_spacing = spacing;
        self.refresh();
    }

    /// `Tw` operator.
    pub fn set_word_spacing(&mut self, spacing: f64) {
        self.word_spacing = spacing;
        self.refresh();
    }

    /// `Tz` operator, in percent.
    pub fn set_horizontal_scaling(&mut self, percent: f64) {
        self.horizontal_scaling = percent;
        self.refresh();
    }

    /// `TL` operator.
    pub fn set_leading(&mut self, leading: f64) {
        self.leading = leading;
    }

    /// `Tr` operator.
    pub fn set_render_mode(&mut self, mode: TextRenderMode) {
        self.render_mode = mode;
    }

    /// `Ts` operator.
    pub fn set_rise(&mut self, rise: f64) {
        self.rise = rise;
    }

    pub fn font(&self) -> Option<&FontRef> {
        self.font.as_ref()
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    pub fn char_spacing(&self) -> f64 {
        self.char_spacing
    }

    pub fn word_spacing(&self) -> f64 {
        self.word_spacing
    }

    pub fn horizontal_scaling(&self) -> f64 {
        self.horizontal_scaling
    }

    pub fn leading(&self) -> f64 {
        self.leading
    }

    pub fn render_mode(&self) -> TextRenderMode {
        self.render_mode
    }

    pub fn rise(&self) -> f64 {
        self.rise
    }

    /// `font_size / 1000 * horizontal_scaling / 100`
    pub fn advance_factor(&self) -> f64 {
        self.advance_factor
    }

    pub fn scaled_char_spacing(&self) -> f64 {
        self.scaled_char_spacing
    }

    pub fn scaled_word_spacing(&self) -> f64 {
        self.scaled_word_spacing
    }

    fn refresh(&mut self) {
        self.advance_factor = self.font_size / 1000.0 * self.horizontal_scaling / 100.0;
        self.scaled_char_spacing = self.char_spacing * self.horizontal_scaling / 100.0;
        self.scaled_word_spacing = self.word_spacing * self.horizontal_scaling / 100.0;
    }

    // --- Text objects and positioning ---

    pub fn in_text_object(&self) -> bool {
        self.in_text_object
    }

    pub fn text_matrix(&self) -> Affine {
        self.text_matrix
    }

    pub fn line_matrix(&self) -> Affine {
        self.line_matrix
    }

    /// Text space to device space: `text_matrix × CTM`.
    pub fn global_matrix(&self) -> Affine {
        self.global_matrix
    }

    /// `BT` operator: reset both matrices and seed the global matrix from `ctm`.
    pub fn begin_text(&mut self, ctm: Affine) {
        self.in_text_object = true;
        self.text_matrix = Affine::IDENTITY;
        self.line_matrix = Affine::IDENTITY;
        self.global_matrix = ctm;
    }

    /// `ET` operator.
    pub fn end_text(&mut self) {
        self.in_text_object = false;
    }

    /// `Tm` operator: replace both matrices.
    pub fn set_text_matrix(&mut self, m: Affine, ctm: Affine) {
        self.text_matrix = m;
        self.line_matrix = m;
        self.sync_ctm(ctm);
    }

    /// `Td` operator: move to the start of the next line, offset by `(tx, ty)`.
    pub fn move_text_position(&mut self, tx: f64, ty: f64, ctm: Affine) {
        self.line_matrix = premultiply(translation(tx, ty), self.line_matrix);
        self.text_matrix = self.line_matrix;
        self.sync_ctm(ctm);
    }

    /// `TD` operator: `-ty TL` followed by `tx ty Td`.
    pub fn move_text_position_and_set_leading(&mut self, tx: f64, ty: f64, ctm: Affine) {
        self.leading = -ty;
        self.move_text_position(tx, ty, ctm);
    }

    /// `T*` operator: `0 -leading Td`.
    pub fn next_line(&mut self, ctm: Affine) {
        self.move_text_position(0.0, -self.leading, ctm);
    }

    /// Recompute the global matrix after the CTM changed.
    pub fn sync_ctm(&mut self, ctm: Affine) {
        self.global_matrix = premultiply(self.text_matrix, ctm);
    }

    // --- Glyph placement ---

    /// Horizontal displacement after showing `glyph`, in unscaled text space.
    pub fn glyph_advance(&self, glyph: &Glyph) -> f64 {
        let word = if glyph.is_whitespace {
            self.scaled_word_spacing
        } else {
            0.0
        };
        self.advance_factor * glyph.width + word + self.scaled_char_spacing
    }

    /// Displacement for a `TJ` number `value` (thousandths of text space).
    pub fn adjustment_offset(&self, value: f64) -> f64 {
        -value * self.advance_factor
    }

    /// Translate the text and global matrices by `tx` along the baseline.
    pub fn advance(&mut self, tx: f64) {
        let shift = translation(tx, 0.0);
        self.text_matrix = premultiply(shift, self.text_matrix);
        self.global_matrix = premultiply(shift, self.global_matrix);
    }

    /// Glyph space to device space for the next glyph:
    /// `[size*Th 0 0 size 0 rise] × text_matrix × CTM`.
    pub fn rendering_matrix(&self) -> Affine {
        let params = matrix(
            self.font_size * self.horizontal_scaling / 100.0,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        );
        premultiply(params, self.global_matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::SimpleFont;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-10,
            "expected {expected}, got {actual}"
        );
    }

    fn translation_of(m: Affine) -> (f64, f64) {
        let c = m.as_coeffs();
        (c[4], c[5])
    }

    // --- Derived fields ---

    #[test]
    fn defaults() {
        let ts = TextState::new();
        assert_eq!(ts.horizontal_scaling(), 100.0);
        assert_eq!(ts.font_size(), 0.0);
        assert_eq!(ts.advance_factor(), 0.0);
        assert!(ts.font().is_none());
        assert!(!ts.in_text_object());
    }

    #[test]
    fn advance_factor_follows_size_then_scaling() {
        let mut ts = TextState::new();
        ts.set_font_size(12.0);
        ts.set_horizontal_scaling(50.0);
        assert_eq!(ts.advance_factor(), 12.0 / 1000.0 * 50.0 / 100.0);
    }

    #[test]
    fn advance_factor_follows_scaling_then_size() {
        let mut ts = TextState::new();
        ts.set_horizontal_scaling(80.0);
        ts.set_font(FontRef::new("F1", None), 9.0);
        assert_eq!(ts.advance_factor(), 9.0 / 1000.0 * 80.0 / 100.0);
    }

    #[test]
    fn scaled_spacing_tracks_scaling() {
        let mut ts = TextState::new();
        ts.set_char_spacing(2.0);
        ts.set_word_spacing(4.0);
        ts.set_horizontal_scaling(50.0);
        assert_approx(ts.scaled_char_spacing(), 1.0);
        assert_approx(ts.scaled_word_spacing(), 2.0);
        ts.set_horizontal_scaling(200.0);
        assert_approx(ts.scaled_char_spacing(), 4.0);
        assert_approx(ts.scaled_word_spacing(), 8.0);
    }

    // --- Positioning ---

    #[test]
    fn begin_text_seeds_global_from_ctm() {
        let mut ts = TextState::new();
        ts.set_text_matrix(matrix(1.0, 0.0, 0.0, 1.0, 50.0, 50.0), Affine::IDENTITY);
        let ctm = matrix(2.0, 0.0, 0.0, 2.0, 5.0, 5.0);
        ts.begin_text(ctm);
        assert!(ts.in_text_object());
        assert_eq!(ts.text_matrix(), Affine::IDENTITY);
        assert_eq!(ts.line_matrix(), Affine::IDENTITY);
        assert_eq!(ts.global_matrix(), ctm);
    }

    #[test]
    fn td_translates_line_matrix_and_reseeds_text_matrix() {
        let mut ts = TextState::new();
        ts.begin_text(Affine::IDENTITY);
        ts.move_text_position(10.0, 20.0, Affine::IDENTITY);
        ts.advance(5.0);
        ts.move_text_position(0.0, -12.0, Affine::IDENTITY);
        assert_eq!(translation_of(ts.line_matrix()), (10.0, 8.0));
        assert_eq!(ts.text_matrix(), ts.line_matrix());
    }

    #[test]
    fn td_respects_scaled_line_matrix() {
        let mut ts = TextState::new();
        ts.set_text_matrix(matrix(2.0, 0.0, 0.0, 2.0, 100.0, 100.0), Affine::IDENTITY);
        ts.move_text_position(10.0, 5.0, Affine::IDENTITY);
        assert_eq!(translation_of(ts.text_matrix()), (120.0, 110.0));
    }

    #[test]
    fn capital_td_sets_leading() {
        let mut ts = TextState::new();
        ts.move_text_position_and_set_leading(0.0, -14.0, Affine::IDENTITY);
        assert_eq!(ts.leading(), 14.0);
        ts.next_line(Affine::IDENTITY);
        assert_eq!(translation_of(ts.line_matrix()), (0.0, -28.0));
    }

    #[test]
    fn global_matrix_combines_text_matrix_and_ctm() {
        let mut ts = TextState::new();
        let ctm = matrix(1.0, 0.0, 0.0, 1.0, 10.0, 10.0);
        ts.set_text_matrix(matrix(1.0, 0.0, 0.0, 1.0, 72.0, 700.0), ctm);
        assert_eq!(translation_of(ts.global_matrix()), (82.0, 710.0));
        ts.sync_ctm(Affine::IDENTITY);
        assert_eq!(translation_of(ts.global_matrix()), (72.0, 700.0));
    }

    // --- Glyph placement ---

    #[test]
    fn glyph_advance_of_600_unit_glyph_at_12pt() {
        let mut ts = TextState::new();
        ts.set_font_size(12.0);
        let glyph = Glyph::new(65, 600.0);
        assert_approx(ts.glyph_advance(&glyph), 7.2);
    }

    #[test]
    fn word_spacing_applies_only_to_whitespace() {
        let mut ts = TextState::new();
        ts.set_font_size(10.0);
        ts.set_word_spacing(3.0);
        ts.set_char_spacing(1.0);
        assert_approx(ts.glyph_advance(&Glyph::new(32, 250.0)), 2.5 + 3.0 + 1.0);
        assert_approx(ts.glyph_advance(&Glyph::new(65, 250.0)), 2.5 + 1.0);
    }

    #[test]
    fn adjustment_moves_only_horizontally() {
        let mut ts = TextState::new();
        ts.set_font_size(10.0);
        ts.set_text_matrix(matrix(1.0, 0.0, 0.0, 1.0, 100.0, 200.0), Affine::IDENTITY);
        ts.advance(ts.adjustment_offset(500.0));
        assert_eq!(translation_of(ts.text_matrix()), (95.0, 200.0));
        assert_eq!(translation_of(ts.line_matrix()), (100.0, 200.0));
    }

    #[test]
    fn advance_follows_rotated_baseline() {
        let mut ts = TextState::new();
        // 90 degree rotation: baseline points up
        ts.set_text_matrix(matrix(0.0, 1.0, -1.0, 0.0, 0.0, 0.0), Affine::IDENTITY);
        ts.advance(10.0);
        let (x, y) = translation_of(ts.text_matrix());
        assert_approx(x, 0.0);
        assert_approx(y, 10.0);
    }

    #[test]
    fn rendering_matrix_includes_size_scaling_and_rise() {
        let mut ts = TextState::new();
        ts.set_font(FontRef::new("F1", None), 10.0);
        ts.set_horizontal_scaling(50.0);
        ts.set_rise(3.0);
        ts.set_text_matrix(matrix(1.0, 0.0, 0.0, 1.0, 100.0, 100.0), Affine::IDENTITY);
        let c = ts.rendering_matrix().as_coeffs();
        assert_approx(c[0], 5.0);
        assert_approx(c[3], 10.0);
        assert_approx(c[4], 100.0);
        assert_approx(c[5], 103.0);
    }

    #[test]
    fn font_refs_compare_by_identity() {
        let font: Arc<dyn Font> = Arc::new(SimpleFont::new("Helvetica", 0, Vec::new(), 500.0));
        let a = FontRef::new("F1", Some(font.clone()));
        let b = FontRef::new("F1", Some(font));
        let other: Arc<dyn Font> = Arc::new(SimpleFont::new("Helvetica", 0, Vec::new(), 500.0));
        assert_eq!(a, b);
        assert_ne!(a, FontRef::new("F1", Some(other)));
        assert_ne!(a, FontRef::new("F1", None));
    }

    #[test]
    fn render_mode_from_operand() {
        assert_eq!(TextRenderMode::from_i64(3), Some(TextRenderMode::Invisible));
        assert_eq!(TextRenderMode::from_i64(8), None);
    }
}
