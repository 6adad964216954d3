//! The device callback contract.
//!
//! The interpreter calls exactly one [`Device`] method per content operator
//! (the compound text operators `'` and `"` expand to their primitive
//! sequence). Every method has a no-op default, so a device implements only
//! the callbacks it cares about. Resolved resources arrive as `Option`s: the
//! slot is `None` when the name is unknown or when the device declined that
//! resource category through [`Device::features`].

use std::sync::Arc;

use bitflags::bitflags;
use lopdf::Dictionary;
use pdfpaint_core::geometry::Affine;
use pdfpaint_core::{
    ColorSpace, DashPattern, ExtGState, FillRule, Font, LineCap, LineJoin, TextRenderMode,
};

use crate::error::{OpResult, Signal};
use crate::operation::Operation;
use crate::resources::{InlineImage, Pattern, Shading, XObject};

bitflags! {
    /// Resource categories a device wants resolved before its callback runs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u8 {
        const COLOR_SPACES = 1 << 0;
        const FONTS = 1 << 1;
        const PATTERNS = 1 << 2;
        const SHADINGS = 1 << 3;
        const EXT_GSTATES = 1 << 4;
        const PROPERTIES = 1 << 5;
        const XOBJECTS = 1 << 6;
    }
}

/// One element of a `TJ` array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextItem<'a> {
    Text(&'a [u8]),
    /// Thousandths of text space; positive values move left.
    Adjustment(f64),
}

/// Receiver of interpreted content operators.
#[allow(unused_variables)]
pub trait Device {
    /// Resource categories this device needs resolved. Declined categories
    /// are not looked up and reach the callback as `None`.
    fn features(&self) -> Features {
        Features::all()
    }

    // --- General graphics state ---

    fn save_state(&mut self) -> OpResult {
        Ok(())
    }

    fn restore_state(&mut self) -> OpResult {
        Ok(())
    }

    /// `cm`: premultiply `m` onto the current transform.
    fn concat_matrix(&mut self, m: Affine) -> OpResult {
        Ok(())
    }

    fn set_line_width(&mut self, width: f64) -> OpResult {
        Ok(())
    }

    fn set_line_cap(&mut self, cap: LineCap) -> OpResult {
        Ok(())
    }

    fn set_line_join(&mut self, join: LineJoin) -> OpResult {
        Ok(())
    }

    fn set_miter_limit(&mut self, limit: f64) -> OpResult {
        Ok(())
    }

    fn set_dash(&mut self, dash: DashPattern) -> OpResult {
        Ok(())
    }

    fn set_rendering_intent(&mut self, intent: &str) -> OpResult {
        Ok(())
    }

    fn set_flatness(&mut self, flatness: f64) -> OpResult {
        Ok(())
    }

    fn set_ext_gstate(&mut self, name: &str, state: Option<&ExtGState>) -> OpResult {
        Ok(())
    }

    // --- Path construction ---

    fn move_to(&mut self, x: f64, y: f64) -> OpResult {
        Ok(())
    }

    fn line_to(&mut self, x: f64, y: f64) -> OpResult {
        Ok(())
    }

    fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> OpResult {
        Ok(())
    }

    /// `v`: the first control point is the current point.
    fn curve_to_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) -> OpResult {
        Ok(())
    }

    /// `y`: the second control point is the end point.
    fn curve_to_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) -> OpResult {
        Ok(())
    }

    fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64) -> OpResult {
        Ok(())
    }

    fn close_path(&mut self) -> OpResult {
        Ok(())
    }

    // --- Path painting and clipping ---

    fn stroke(&mut self) -> OpResult {
        Ok(())
    }

    fn close_stroke(&mut self) -> OpResult {
        Ok(())
    }

    fn fill(&mut self, rule: FillRule) -> OpResult {
        Ok(())
    }

    fn fill_stroke(&mut self, rule: FillRule) -> OpResult {
        Ok(())
    }

    fn close_fill_stroke(&mut self, rule: FillRule) -> OpResult {
        Ok(())
    }

    fn end_path(&mut self) -> OpResult {
        Ok(())
    }

    /// `W`/`W*`: takes effect at the next path-ending operator.
    fn clip(&mut self, rule: FillRule) -> OpResult {
        Ok(())
    }

    // --- Color ---

    fn set_stroke_color_space(&mut self, name: &str, space: Option<&ColorSpace>) -> OpResult {
        Ok(())
    }

    fn set_fill_color_space(&mut self, name: &str, space: Option<&ColorSpace>) -> OpResult {
        Ok(())
    }

    fn set_stroke_color(&mut self, components: &[f32]) -> OpResult {
        Ok(())
    }

    fn set_fill_color(&mut self, components: &[f32]) -> OpResult {
        Ok(())
    }

    /// `SCN` with a trailing pattern name.
    fn set_stroke_pattern(
        &mut self,
        components: &[f32],
        name: &str,
        pattern: Option<&Pattern>,
    ) -> OpResult {
        Ok(())
    }

    /// `scn` with a trailing pattern name.
    fn set_fill_pattern(
        &mut self,
        components: &[f32],
        name: &str,
        pattern: Option<&Pattern>,
    ) -> OpResult {
        Ok(())
    }

    /// `G`. `default` is the page's `DefaultGray` space, if one is registered.
    fn set_stroke_gray(&mut self, gray: f32, default: Option<&ColorSpace>) -> OpResult {
        Ok(())
    }

    fn set_fill_gray(&mut self, gray: f32, default: Option<&ColorSpace>) -> OpResult {
        Ok(())
    }

    fn set_stroke_rgb(&mut self, rgb: [f32; 3], default: Option<&ColorSpace>) -> OpResult {
        Ok(())
    }

    fn set_fill_rgb(&mut self, rgb: [f32; 3], default: Option<&ColorSpace>) -> OpResult {
        Ok(())
    }

    fn set_stroke_cmyk(&mut self, cmyk: [f32; 4], default: Option<&ColorSpace>) -> OpResult {
        Ok(())
    }

    fn set_fill_cmyk(&mut self, cmyk: [f32; 4], default: Option<&ColorSpace>) -> OpResult {
        Ok(())
    }

    // --- Text ---

    fn begin_text(&mut self) -> OpResult {
        Ok(())
    }

    fn end_text(&mut self) -> OpResult {
        Ok(())
    }

    fn move_text(&mut self, tx: f64, ty: f64) -> OpResult {
        Ok(())
    }

    /// `TD`: like `Td`, also setting the leading to `-ty`.
    fn move_text_set_leading(&mut self, tx: f64, ty: f64) -> OpResult {
        Ok(())
    }

    fn set_text_matrix(&mut self, m: Affine) -> OpResult {
        Ok(())
    }

    fn next_line(&mut self) -> OpResult {
        Ok(())
    }

    fn set_char_spacing(&mut self, spacing: f64) -> OpResult {
        Ok(())
    }

    fn set_word_spacing(&mut self, spacing: f64) -> OpResult {
        Ok(())
    }

    /// `Tz`, in percent.
    fn set_horizontal_scaling(&mut self, percent: f64) -> OpResult {
        Ok(())
    }

    fn set_leading(&mut self, leading: f64) -> OpResult {
        Ok(())
    }

    fn set_font(&mut self, name: &str, font: Option<&Arc<dyn Font>>, size: f64) -> OpResult {
        Ok(())
    }

    fn set_render_mode(&mut self, mode: TextRenderMode) -> OpResult {
        Ok(())
    }

    fn set_rise(&mut self, rise: f64) -> OpResult {
        Ok(())
    }

    fn show_text(&mut self, bytes: &[u8]) -> OpResult {
        Ok(())
    }

    fn show_text_adjusted(&mut self, items: &[TextItem<'_>]) -> OpResult {
        Ok(())
    }

    /// `d0` in a Type 3 glyph description.
    fn set_glyph_width(&mut self, wx: f64, wy: f64) -> OpResult {
        Ok(())
    }

    /// `d1` in a Type 3 glyph description.
    fn set_glyph_width_and_bounds(
        &mut self,
        wx: f64,
        wy: f64,
        llx: f64,
        lly: f64,
        urx: f64,
        ury: f64,
    ) -> OpResult {
        Ok(())
    }

    // --- Marked content ---

    fn marked_content_point(&mut self, tag: &str) -> OpResult {
        Ok(())
    }

    /// `DP`. `name` is set when the properties were given by resource name.
    fn marked_content_point_with_properties(
        &mut self,
        tag: &str,
        name: Option<&str>,
        properties: Option<&Dictionary>,
    ) -> OpResult {
        Ok(())
    }

    fn begin_marked_content(&mut self, tag: &str) -> OpResult {
        Ok(())
    }

    /// `BDC`. `name` is set when the properties were given by resource name.
    fn begin_marked_content_with_properties(
        &mut self,
        tag: &str,
        name: Option<&str>,
        properties: Option<&Dictionary>,
    ) -> OpResult {
        Ok(())
    }

    fn end_marked_content(&mut self) -> OpResult {
        Ok(())
    }

    // --- External objects ---

    /// `Do`. For forms this runs before the interpreter executes the form's
    /// content.
    fn draw_xobject(&mut self, name: &str, xobject: Option<&XObject>) -> OpResult {
        Ok(())
    }

    fn draw_shading(&mut self, name: &str, shading: Option<&Shading>) -> OpResult {
        Ok(())
    }

    /// `BI ... EI`. `color_space` is the effective space: the image's own or
    /// the resource it names.
    fn draw_inline_image(
        &mut self,
        image: &InlineImage,
        color_space: Option<&ColorSpace>,
    ) -> OpResult {
        Ok(())
    }

    // --- Compatibility ---

    fn begin_compatibility(&mut self) -> OpResult {
        Ok(())
    }

    fn end_compatibility(&mut self) -> OpResult {
        Ok(())
    }

    /// Operators without a dedicated callback.
    fn passthrough(&mut self, op: &Operation) -> OpResult {
        Err(Signal::Unsupported)
    }
}
