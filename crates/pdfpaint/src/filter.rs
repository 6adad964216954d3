//! Category filter decorator.
//!
//! [`FilterDevice`] wraps another [`Device`] and turns whole callback groups
//! into no-ops. Graphics-state operators, `gs`, compatibility markers and
//! [`Device::passthrough`] are configuration rather than drawing, so they
//! always reach the inner device.

use std::sync::Arc;

use bitflags::bitflags;
use lopdf::Dictionary;
use pdfpaint_core::geometry::Affine;
use pdfpaint_core::{
    ColorSpace, DashPattern, ExtGState, FillRule, Font, LineCap, LineJoin, TextRenderMode,
};

use crate::device::{Device, Features, TextItem};
use crate::error::OpResult;
use crate::operation::Operation;
use crate::resources::{InlineImage, Pattern, Shading, XObject};

bitflags! {
    /// Callback groups a [`FilterDevice`] can suppress.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Categories: u8 {
        /// Path construction, painting and clipping.
        const PATHS = 1 << 0;
        /// Text objects, text state, positioning and showing.
        const TEXT = 1 << 1;
        /// `Do`, `sh` and inline images.
        const IMAGES = 1 << 2;
        /// Color spaces and colors.
        const COLOR = 1 << 3;
        const MARKED_CONTENT = 1 << 4;
    }
}

/// Forwards every callback to `inner` except those in `suppressed`.
#[derive(Debug, Clone)]
pub struct FilterDevice<D> {
    inner: D,
    suppressed: Categories,
}

impl<D: Device> FilterDevice<D> {
    pub fn new(inner: D, suppressed: Categories) -> Self {
        Self { inner, suppressed }
    }

    /// Keep only the `keep` categories.
    pub fn only(inner: D, keep: Categories) -> Self {
        Self::new(inner, keep.complement())
    }

    /// Forward everything.
    pub fn passthrough(inner: D) -> Self {
        Self::new(inner, Categories::empty())
    }

    pub fn paths_only(inner: D) -> Self {
        Self::new(inner, Categories::TEXT | Categories::IMAGES)
    }

    pub fn text_only(inner: D) -> Self {
        Self::new(inner, Categories::PATHS | Categories::IMAGES)
    }

    pub fn images_only(inner: D) -> Self {
        Self::new(inner, Categories::PATHS | Categories::TEXT)
    }

    pub fn suppressed(&self) -> Categories {
        self.suppressed
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn passes(&self, category: Categories) -> bool {
        !self.suppressed.intersects(category)
    }
}

/// Forward `$call` to the inner device unless `$category` is suppressed.
macro_rules! gated {
    ($self:ident, $category:ident, $call:expr) => {
        if $self.passes(Categories::$category) {
            $call
        } else {
            Ok(())
        }
    };
}

impl<D: Device> Device for FilterDevice<D> {
    fn features(&self) -> Features {
        let mut features = self.inner.features();
        if !self.passes(Categories::TEXT) {
            features.remove(Features::FONTS);
        }
        if !self.passes(Categories::IMAGES) {
            features.remove(Features::SHADINGS);
        }
        if !self.passes(Categories::COLOR) {
            features.remove(Features::COLOR_SPACES | Features::PATTERNS);
        }
        if !self.passes(Categories::MARKED_CONTENT) {
            features.remove(Features::PROPERTIES);
        }
        features
    }

    // --- Always forwarded ---

    fn save_state(&mut self) -> OpResult {
        self.inner.save_state()
    }

    fn restore_state(&mut self) -> OpResult {
        self.inner.restore_state()
    }

    fn concat_matrix(&mut self, m: Affine) -> OpResult {
        self.inner.concat_matrix(m)
    }

    fn set_line_width(&mut self, width: f64) -> OpResult {
        self.inner.set_line_width(width)
    }

    fn set_line_cap(&mut self, cap: LineCap) -> OpResult {
        self.inner.set_line_cap(cap)
    }

    fn set_line_join(&mut self, join: LineJoin) -> OpResult {
        self.inner.set_line_join(join)
    }

    fn set_miter_limit(&mut self, limit: f64) -> OpResult {
        self.inner.set_miter_limit(limit)
    }

    fn set_dash(&mut self, dash: DashPattern) -> OpResult {
        self.inner.set_dash(dash)
    }

    fn set_rendering_intent(&mut self, intent: &str) -> OpResult {
        self.inner.set_rendering_intent(intent)
    }

    fn set_flatness(&mut self, flatness: f64) -> OpResult {
        self.inner.set_flatness(flatness)
    }

    fn set_ext_gstate(&mut self, name: &str, state: Option<&ExtGState>) -> OpResult {
        self.inner.set_ext_gstate(name, state)
    }

    fn begin_compatibility(&mut self) -> OpResult {
        self.inner.begin_compatibility()
    }

    fn end_compatibility(&mut self) -> OpResult {
        self.inner.end_compatibility()
    }

    fn passthrough(&mut self, op: &Operation) -> OpResult {
        self.inner.passthrough(op)
    }

    // --- Paths ---

    fn move_to(&mut self, x: f64, y: f64) -> OpResult {
        gated!(self, PATHS, self.inner.move_to(x, y))
    }

    fn line_to(&mut self, x: f64, y: f64) -> OpResult {
        gated!(self, PATHS, self.inner.line_to(x, y))
    }

    fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> OpResult {
        gated!(self, PATHS, self.inner.curve_to(x1, y1, x2, y2, x3, y3))
    }

    fn curve_to_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) -> OpResult {
        gated!(self, PATHS, self.inner.curve_to_v(x2, y2, x3, y3))
    }

    fn curve_to_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) -> OpResult {
        gated!(self, PATHS, self.inner.curve_to_y(x1, y1, x3, y3))
    }

    fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64) -> OpResult {
        gated!(self, PATHS, self.inner.rectangle(x, y, width, height))
    }

    fn close_path(&mut self) -> OpResult {
        gated!(self, PATHS, self.inner.close_path())
    }

    fn stroke(&mut self) -> OpResult {
        gated!(self, PATHS, self.inner.stroke())
    }

    fn close_stroke(&mut self) -> OpResult {
        gated!(self, PATHS, self.inner.close_stroke())
    }

    fn fill(&mut self, rule: FillRule) -> OpResult {
        gated!(self, PATHS, self.inner.fill(rule))
    }

    fn fill_stroke(&mut self, rule: FillRule) -> OpResult {
        gated!(self, PATHS, self.inner.fill_stroke(rule))
    }

    fn close_fill_stroke(&mut self, rule: FillRule) -> OpResult {
        gated!(self, PATHS, self.inner.close_fill_stroke(rule))
    }

    fn end_path(&mut self) -> OpResult {
        gated!(self, PATHS, self.inner.end_path())
    }

    fn clip(&mut self, rule: FillRule) -> OpResult {
        gated!(self, PATHS, self.inner.clip(rule))
    }

    // --- Color ---

    fn set_stroke_color_space(&mut self, name: &str, space: Option<&ColorSpace>) -> OpResult {
        gated!(self, COLOR, self.inner.set_stroke_color_space(name, space))
    }

    fn set_fill_color_space(&mut self, name: &str, space: Option<&ColorSpace>) -> OpResult {
        gated!(self, COLOR, self.inner.set_fill_color_space(name, space))
    }

    fn set_stroke_color(&mut self, components: &[f32]) -> OpResult {
        gated!(self, COLOR, self.inner.set_stroke_color(components))
    }

    fn set_fill_color(&mut self, components: &[f32]) -> OpResult {
        gated!(self, COLOR, self.inner.set_fill_color(components))
    }

    fn set_stroke_pattern(
        &mut self,
        components: &[f32],
        name: &str,
        pattern: Option<&Pattern>,
    ) -> OpResult {
        gated!(self, COLOR, self.inner.set_stroke_pattern(components, name, pattern))
    }

    fn set_fill_pattern(
        &mut self,
        components: &[f32],
        name: &str,
        pattern: Option<&Pattern>,
    ) -> OpResult {
        gated!(self, COLOR, self.inner.set_fill_pattern(components, name, pattern))
    }

    fn set_stroke_gray(&mut self, gray: f32, default: Option<&ColorSpace>) -> OpResult {
        gated!(self, COLOR, self.inner.set_stroke_gray(gray, default))
    }

    fn set_fill_gray(&mut self, gray: f32, default: Option<&ColorSpace>) -> OpResult {
        gated!(self, COLOR, self.inner.set_fill_gray(gray, default))
    }

    fn set_stroke_rgb(&mut self, rgb: [f32; 3], default: Option<&ColorSpace>) -> OpResult {
        gated!(self, COLOR, self.inner.set_stroke_rgb(rgb, default))
    }

    fn set_fill_rgb(&mut self, rgb: [f32; 3], default: Option<&ColorSpace>) -> OpResult {
        gated!(self, COLOR, self.inner.set_fill_rgb(rgb, default))
    }

    fn set_stroke_cmyk(&mut self, cmyk: [f32; 4], default: Option<&ColorSpace>) -> OpResult {
        gated!(self, COLOR, self.inner.set_stroke_cmyk(cmyk, default))
    }

    fn set_fill_cmyk(&mut self, cmyk: [f32; 4], default: Option<&ColorSpace>) -> OpResult {
        gated!(self, COLOR, self.inner.set_fill_cmyk(cmyk, default))
    }

    // --- Text ---

    fn begin_text(&mut self) -> OpResult {
        gated!(self, TEXT, self.inner.begin_text())
    }

    fn end_text(&mut self) -> OpResult {
        gated!(self, TEXT, self.inner.end_text())
    }

    fn move_text(&mut self, tx: f64, ty: f64) -> OpResult {
        gated!(self, TEXT, self.inner.move_text(tx, ty))
    }

    fn move_text_set_leading(&mut self, tx: f64, ty: f64) -> OpResult {
        gated!(self, TEXT, self.inner.move_text_set_leading(tx, ty))
    }

    fn set_text_matrix(&mut self, m: Affine) -> OpResult {
        gated!(self, TEXT, self.inner.set_text_matrix(m))
    }

    fn next_line(&mut self) -> OpResult {
        gated!(self, TEXT, self.inner.next_line())
    }

    fn set_char_spacing(&mut self, spacing: f64) -> OpResult {
        gated!(self, TEXT, self.inner.set_char_spacing(spacing))
    }

    fn set_word_spacing(&mut self, spacing: f64) -> OpResult {
        gated!(self, TEXT, self.inner.set_word_spacing(spacing))
    }

    fn set_horizontal_scaling(&mut self, percent: f64) -> OpResult {
        gated!(self, TEXT, self.inner.set_horizontal_scaling(percent))
    }

    fn set_leading(&mut self, leading: f64) -> OpResult {
        gated!(self, TEXT, self.inner.set_leading(leading))
    }

    fn set_font(&mut self, name: &str, font: Option<&Arc<dyn Font>>, size: f64) -> OpResult {
        gated!(self, TEXT, self.inner.set_font(name, font, size))
    }

    fn set_render_mode(&mut self, mode: TextRenderMode) -> OpResult {
        gated!(self, TEXT, self.inner.set_render_mode(mode))
    }

    fn set_rise(&mut self, rise: f64) -> OpResult {
        gated!(self, TEXT, self.inner.set_rise(rise))
    }

    fn show_text(&mut self, bytes: &[u8]) -> OpResult {
        gated!(self, TEXT, self.inner.show_text(bytes))
    }

    fn show_text_adjusted(&mut self, items: &[TextItem<'_>]) -> OpResult {
        gated!(self, TEXT, self.inner.show_text_adjusted(items))
    }

    fn set_glyph_width(&mut self, wx: f64, wy: f64) -> OpResult {
        gated!(self, TEXT, self.inner.set_glyph_width(wx, wy))
    }

    fn set_glyph_width_and_bounds(
        &mut self,
        wx: f64,
        wy: f64,
        llx: f64,
        lly: f64,
        urx: f64,
        ury: f64,
    ) -> OpResult {
        gated!(
            self,
            TEXT,
            self.inner
                .set_glyph_width_and_bounds(wx, wy, llx, lly, urx, ury)
        )
    }

    // --- Marked content ---

    fn marked_content_point(&mut self, tag: &str) -> OpResult {
        gated!(self, MARKED_CONTENT, self.inner.marked_content_point(tag))
    }

    fn marked_content_point_with_properties(
        &mut self,
        tag: &str,
        name: Option<&str>,
        properties: Option<&Dictionary>,
    ) -> OpResult {
        gated!(
            self,
            MARKED_CONTENT,
            self.inner
                .marked_content_point_with_properties(tag, name, properties)
        )
    }

    fn begin_marked_content(&mut self, tag: &str) -> OpResult {
        gated!(self, MARKED_CONTENT, self.inner.begin_marked_content(tag))
    }

    fn begin_marked_content_with_properties(
        &mut self,
        tag: &str,
        name: Option<&str>,
        properties: Option<&Dictionary>,
    ) -> OpResult {
        gated!(
            self,
            MARKED_CONTENT,
            self.inner
                .begin_marked_content_with_properties(tag, name, properties)
        )
    }

    fn end_marked_content(&mut self) -> OpResult {
        gated!(self, MARKED_CONTENT, self.inner.end_marked_content())
    }

    // --- External objects ---

    fn draw_xobject(&mut self, name: &str, xobject: Option<&XObject>) -> OpResult {
        gated!(self, IMAGES, self.inner.draw_xobject(name, xobject))
    }

    fn draw_shading(&mut self, name: &str, shading: Option<&Shading>) -> OpResult {
        gated!(self, IMAGES, self.inner.draw_shading(name, shading))
    }

    fn draw_inline_image(
        &mut self,
        image: &InlineImage,
        color_space: Option<&ColorSpace>,
    ) -> OpResult {
        gated!(self, IMAGES, self.inner.draw_inline_image(image, color_space))
    }
}
