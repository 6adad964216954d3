//! The stateful graphics engine.
//!
//! [`GraphicsDevice`] is the [`Device`] that actually tracks the imaging
//! model: the bounded graphics-state stack, the device-space path under
//! construction, pending clips and text positioning. Finished marks go to a
//! [`Surface`].
//!
//! A path cycle moves through the phases of [`PathPhase`]:
//! `NoPath -> Building -> (ClipPending) -> NoPath`. The painting operator
//! that ends the cycle paints first and then installs any pending clip, so
//! the clip only bounds later marks.

use std::sync::Arc;

use lopdf::Dictionary;
use pdfpaint_core::geometry::{Affine, BezPath, premultiply};
use pdfpaint_core::{
    Color, ColorSpace, DEFAULT_MAX_STACK_DEPTH, DashPattern, ExtGState, FillRule, Font, FontRef,
    GraphicsState, GraphicsStateStack, LineCap, LineJoin, PaintOp, PathAccumulator,
    TextRenderMode, Warning, WarningCode,
};

use crate::device::{Device, TextItem};
use crate::error::{OpResult, Signal};
use crate::resources::{InlineImage, Pattern, Shading, XObject};
use crate::surface::Surface;

/// Construction-time settings for [`GraphicsDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOptions {
    /// Saved states allowed before `q` fails with an overflow.
    pub max_stack_depth: usize,
    /// Report every installed clip to [`Surface::clip_hint`].
    pub forward_clip_hints: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            forward_clip_hints: false,
        }
    }
}

/// Where the engine is in a path cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathPhase {
    #[default]
    NoPath,
    Building,
    /// `W`/`W*` seen; the next path-ending operator installs the clip.
    ClipPending,
}

/// A [`Device`] implementing the PDF imaging model on top of a [`Surface`].
#[derive(Debug, Clone)]
pub struct GraphicsDevice<S> {
    stack: GraphicsStateStack,
    path: PathAccumulator,
    pending_clip: Option<FillRule>,
    phase: PathPhase,
    marked_depth: usize,
    options: DeviceOptions,
    surface: S,
}

impl<S: Surface> GraphicsDevice<S> {
    pub fn new(surface: S) -> Self {
        Self::with_options(surface, DeviceOptions::default())
    }

    pub fn with_options(surface: S, options: DeviceOptions) -> Self {
        Self::with_initial_state(surface, GraphicsState::default(), options)
    }

    /// Start from `initial`, typically a state whose CTM maps the page's
    /// user space to device space.
    pub fn with_initial_state(surface: S, initial: GraphicsState, options: DeviceOptions) -> Self {
        let path = PathAccumulator::new(initial.ctm);
        Self {
            stack: GraphicsStateStack::new(initial, options.max_stack_depth),
            path,
            pending_clip: None,
            phase: PathPhase::NoPath,
            marked_depth: 0,
            options,
            surface,
        }
    }

    pub fn state(&self) -> &GraphicsState {
        self.stack.current()
    }

    /// Number of saved states.
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn path(&self) -> &PathAccumulator {
        &self.path
    }

    pub fn phase(&self) -> PathPhase {
        self.phase
    }

    pub fn pending_clip(&self) -> Option<FillRule> {
        self.pending_clip
    }

    /// Open `BMC`/`BDC` sections.
    pub fn marked_content_depth(&self) -> usize {
        self.marked_depth
    }

    pub fn options(&self) -> DeviceOptions {
        self.options
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    fn state_mut(&mut self) -> &mut GraphicsState {
        self.stack.current_mut()
    }

    /// `q`, `Q` and `cm` are only expected outside a path. They still take
    /// effect inside one, with a warning.
    fn check_outside_path(&self, operator: &str) -> OpResult {
        if self.phase == PathPhase::NoPath {
            Ok(())
        } else {
            Err(Signal::warning(
                WarningCode::UnexpectedPhase,
                format!("'{operator}' inside a path object"),
            ))
        }
    }

    fn begin_path(&mut self) {
        if self.phase == PathPhase::NoPath {
            self.phase = PathPhase::Building;
        }
    }

    /// The CTM changed: points appended from now on and text placement use it.
    fn sync_ctm(&mut self) {
        let ctm = self.stack.current().ctm;
        self.path.set_ctm(ctm);
        self.stack.current_mut().text.sync_ctm(ctm);
    }

    fn require_current_point(&self, operator: &str) -> OpResult {
        if self.path.current_point().is_some() {
            Ok(())
        } else {
            Err(Signal::warning(
                WarningCode::NoCurrentPoint,
                format!("'{operator}' without a current point"),
            ))
        }
    }

    /// End the path cycle: paint, then install a pending clip, then reset.
    ///
    /// The clip is installed even when the surface fails to paint, so a
    /// `W`/`W*` request never outlives the path it was made for.
    fn finish_path(&mut self, op: PaintOp) -> OpResult {
        let degenerate = self.path.is_degenerate();
        let path = self.path.take();
        let pending_clip = self.pending_clip.take();
        self.phase = PathPhase::NoPath;

        let painted = if path.elements().is_empty() {
            Ok(())
        } else {
            self.paint_path(&path, op, degenerate)
        };

        if let Some(rule) = pending_clip {
            let clip = self.stack.current().clip.intersect(path.clone(), rule);
            self.state_mut().clip = clip;
            if painted.is_ok() && self.options.forward_clip_hints {
                self.surface
                    .clip_hint(&path, rule, &self.stack.current().clip)?;
            }
        }
        painted
    }

    fn paint_path(&mut self, path: &BezPath, op: PaintOp, degenerate: bool) -> OpResult {
        let state = self.stack.current();
        match op {
            PaintOp::Fill(rule) => {
                self.surface.fill_path(path, rule, state)?;
                if degenerate {
                    self.surface.fill_zero_area(path, state)?;
                }
            }
            PaintOp::Stroke => self.surface.stroke_path(path, state)?,
            PaintOp::FillStroke(rule) => self.surface.fill_and_stroke_path(path, rule, state)?,
            PaintOp::NoPaint => {}
        }
        Ok(())
    }

    fn set_device_color(
        &mut self,
        stroking: bool,
        device: ColorSpace,
        default: Option<&ColorSpace>,
        components: Vec<f32>,
    ) {
        let space = Arc::new(default.cloned().unwrap_or(device));
        let state = self.state_mut();
        if stroking {
            state.set_stroke_color_space(space);
            state.stroke_color = Color::new(components);
        } else {
            state.set_fill_color_space(space);
            state.fill_color = Color::new(components);
        }
    }

    fn set_color_space(&mut self, stroking: bool, name: &str, space: Option<&ColorSpace>) -> OpResult {
        let Some(space) = space.cloned().or_else(|| ColorSpace::from_device_name(name)) else {
            return Err(Signal::Warning(Warning::for_resource(
                WarningCode::UnresolvedColorSpace,
                "color space is neither a device family nor resolved",
                name,
            )));
        };
        let space = Arc::new(space);
        if stroking {
            self.state_mut().set_stroke_color_space(space);
        } else {
            self.state_mut().set_fill_color_space(space);
        }
        Ok(())
    }

    /// Show one run of glyphs from the current font. Returns `false` when
    /// there is no usable font.
    fn show_glyphs(&mut self, bytes: &[u8]) -> Result<bool, Signal> {
        let Some(font) = self
            .stack
            .current()
            .text
            .font()
            .and_then(|f| f.font.clone())
        else {
            return Ok(false);
        };
        for glyph in font.glyphs(bytes) {
            let state = self.stack.current();
            self.surface
                .show_glyph(&glyph, state.text.rendering_matrix(), state)?;
            let advance = state.text.glyph_advance(&glyph);
            self.stack.current_mut().text.advance(advance);
        }
        Ok(true)
    }

    fn missing_font(&self) -> Signal {
        let name = self
            .stack
            .current()
            .text
            .font()
            .map_or_else(|| "no font selected".to_string(), |f| format!("font /{} not loaded", f.name));
        Signal::warning(WarningCode::MissingFont, format!("text shown with {name}"))
    }
}

impl<S: Surface> Device for GraphicsDevice<S> {
    // --- General graphics state ---

    fn save_state(&mut self) -> OpResult {
        self.stack.save()?;
        self.check_outside_path("q")
    }

    fn restore_state(&mut self) -> OpResult {
        self.stack.restore()?;
        self.sync_ctm();
        self.check_outside_path("Q")
    }

    fn concat_matrix(&mut self, m: Affine) -> OpResult {
        let state = self.state_mut();
        state.ctm = premultiply(m, state.ctm);
        self.sync_ctm();
        self.check_outside_path("cm")
    }

    fn set_line_width(&mut self, width: f64) -> OpResult {
        self.state_mut().line_width = width;
        Ok(())
    }

    fn set_line_cap(&mut self, cap: LineCap) -> OpResult {
        self.state_mut().line_cap = cap;
        Ok(())
    }

    fn set_line_join(&mut self, join: LineJoin) -> OpResult {
        self.state_mut().line_join = join;
        Ok(())
    }

    fn set_miter_limit(&mut self, limit: f64) -> OpResult {
        self.state_mut().miter_limit = limit;
        Ok(())
    }

    fn set_dash(&mut self, dash: DashPattern) -> OpResult {
        self.state_mut().dash = dash;
        Ok(())
    }

    fn set_rendering_intent(&mut self, intent: &str) -> OpResult {
        self.state_mut().rendering_intent = Some(intent.to_string());
        Ok(())
    }

    fn set_flatness(&mut self, flatness: f64) -> OpResult {
        self.state_mut().flatness = flatness;
        Ok(())
    }

    fn set_ext_gstate(&mut self, _name: &str, state: Option<&ExtGState>) -> OpResult {
        if let Some(ext) = state {
            self.state_mut().apply_ext_gstate(ext);
        }
        Ok(())
    }

    // --- Path construction ---

    fn move_to(&mut self, x: f64, y: f64) -> OpResult {
        self.begin_path();
        self.path.move_to(x, y);
        Ok(())
    }

    fn line_to(&mut self, x: f64, y: f64) -> OpResult {
        self.begin_path();
        if let Err(warning) = self.require_current_point("l") {
            self.path.move_to(x, y);
            return Err(warning);
        }
        self.path.line_to(x, y);
        Ok(())
    }

    fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> OpResult {
        self.require_current_point("c")?;
        self.begin_path();
        self.path.curve_to(x1, y1, x2, y2, x3, y3);
        Ok(())
    }

    fn curve_to_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) -> OpResult {
        self.require_current_point("v")?;
        self.begin_path();
        self.path.curve_to_v(x2, y2, x3, y3);
        Ok(())
    }

    fn curve_to_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) -> OpResult {
        self.require_current_point("y")?;
        self.begin_path();
        self.path.curve_to_y(x1, y1, x3, y3);
        Ok(())
    }

    fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64) -> OpResult {
        self.begin_path();
        self.path.rectangle(x, y, width, height);
        Ok(())
    }

    fn close_path(&mut self) -> OpResult {
        self.path.close_path();
        Ok(())
    }

    // --- Path painting and clipping ---

    fn stroke(&mut self) -> OpResult {
        self.finish_path(PaintOp::Stroke)
    }

    fn close_stroke(&mut self) -> OpResult {
        self.path.close_path();
        self.finish_path(PaintOp::Stroke)
    }

    fn fill(&mut self, rule: FillRule) -> OpResult {
        self.finish_path(PaintOp::Fill(rule))
    }

    fn fill_stroke(&mut self, rule: FillRule) -> OpResult {
        self.finish_path(PaintOp::FillStroke(rule))
    }

    fn close_fill_stroke(&mut self, rule: FillRule) -> OpResult {
        self.path.close_path();
        self.finish_path(PaintOp::FillStroke(rule))
    }

    fn end_path(&mut self) -> OpResult {
        self.finish_path(PaintOp::NoPaint)
    }

    fn clip(&mut self, rule: FillRule) -> OpResult {
        // a second W before painting replaces the first
        self.pending_clip = Some(rule);
        self.phase = PathPhase::ClipPending;
        Ok(())
    }

    // --- Color ---

    fn set_stroke_color_space(&mut self, name: &str, space: Option<&ColorSpace>) -> OpResult {
        self.set_color_space(true, name, space)
    }

    fn set_fill_color_space(&mut self, name: &str, space: Option<&ColorSpace>) -> OpResult {
        self.set_color_space(false, name, space)
    }

    fn set_stroke_color(&mut self, components: &[f32]) -> OpResult {
        self.state_mut().stroke_color = Color::new(components.to_vec());
        Ok(())
    }

    fn set_fill_color(&mut self, components: &[f32]) -> OpResult {
        self.state_mut().fill_color = Color::new(components.to_vec());
        Ok(())
    }

    fn set_stroke_pattern(
        &mut self,
        components: &[f32],
        name: &str,
        _pattern: Option<&Pattern>,
    ) -> OpResult {
        self.state_mut().stroke_color = Color::with_pattern(components.to_vec(), name);
        Ok(())
    }

    fn set_fill_pattern(
        &mut self,
        components: &[f32],
        name: &str,
        _pattern: Option<&Pattern>,
    ) -> OpResult {
        self.state_mut().fill_color = Color::with_pattern(components.to_vec(), name);
        Ok(())
    }

    fn set_stroke_gray(&mut self, gray: f32, default: Option<&ColorSpace>) -> OpResult {
        self.set_device_color(true, ColorSpace::DeviceGray, default, vec![gray]);
        Ok(())
    }

    fn set_fill_gray(&mut self, gray: f32, default: Option<&ColorSpace>) -> OpResult {
        self.set_device_color(false, ColorSpace::DeviceGray, default, vec![gray]);
        Ok(())
    }

    fn set_stroke_rgb(&mut self, rgb: [f32; 3], default: Option<&ColorSpace>) -> OpResult {
        self.set_device_color(true, ColorSpace::DeviceRgb, default, rgb.to_vec());
        Ok(())
    }

    fn set_fill_rgb(&mut self, rgb: [f32; 3], default: Option<&ColorSpace>) -> OpResult {
        self.set_device_color(false, ColorSpace::DeviceRgb, default, rgb.to_vec());
        Ok(())
    }

    fn set_stroke_cmyk(&mut self, cmyk: [f32; 4], default: Option<&ColorSpace>) -> OpResult {
        self.set_device_color(true, ColorSpace::DeviceCmyk, default, cmyk.to_vec());
        Ok(())
    }

    fn set_fill_cmyk(&mut self, cmyk: [f32; 4], default: Option<&ColorSpace>) -> OpResult {
        self.set_device_color(false, ColorSpace::DeviceCmyk, default, cmyk.to_vec());
        Ok(())
    }

    // --- Text ---

    fn begin_text(&mut self) -> OpResult {
        let nested = self.state().text.in_text_object();
        let ctm = self.state().ctm;
        self.state_mut().text.begin_text(ctm);
        if nested {
            return Err(Signal::warning(
                WarningCode::UnexpectedPhase,
                "'BT' inside a text object",
            ));
        }
        Ok(())
    }

    fn end_text(&mut self) -> OpResult {
        if !self.state().text.in_text_object() {
            return Err(Signal::warning(
                WarningCode::UnexpectedPhase,
                "'ET' outside a text object",
            ));
        }
        self.state_mut().text.end_text();
        Ok(())
    }

    fn move_text(&mut self, tx: f64, ty: f64) -> OpResult {
        let ctm = self.state().ctm;
        self.state_mut().text.move_text_position(tx, ty, ctm);
        Ok(())
    }

    fn move_text_set_leading(&mut self, tx: f64, ty: f64) -> OpResult {
        let ctm = self.state().ctm;
        self.state_mut()
            .text
            .move_text_position_and_set_leading(tx, ty, ctm);
        Ok(())
    }

    fn set_text_matrix(&mut self, m: Affine) -> OpResult {
        let ctm = self.state().ctm;
        self.state_mut().text.set_text_matrix(m, ctm);
        Ok(())
    }

    fn next_line(&mut self) -> OpResult {
        let ctm = self.state().ctm;
        self.state_mut().text.next_line(ctm);
        Ok(())
    }

    fn set_char_spacing(&mut self, spacing: f64) -> OpResult {
        self.state_mut().text.set_char_spacing(spacing);
        Ok(())
    }

    fn set_word_spacing(&mut self, spacing: f64) -> OpResult {
        self.state_mut().text.set_word_spacing(spacing);
        Ok(())
    }

    fn set_horizontal_scaling(&mut self, percent: f64) -> OpResult {
        self.state_mut().text.set_horizontal_scaling(percent);
        Ok(())
    }

    fn set_leading(&mut self, leading: f64) -> OpResult {
        self.state_mut().text.set_leading(leading);
        Ok(())
    }

    fn set_font(&mut self, name: &str, font: Option<&Arc<dyn Font>>, size: f64) -> OpResult {
        self.state_mut()
            .text
            .set_font(FontRef::new(name, font.cloned()), size);
        Ok(())
    }

    fn set_render_mode(&mut self, mode: TextRenderMode) -> OpResult {
        self.state_mut().text.set_render_mode(mode);
        Ok(())
    }

    fn set_rise(&mut self, rise: f64) -> OpResult {
        self.state_mut().text.set_rise(rise);
        Ok(())
    }

    fn show_text(&mut self, bytes: &[u8]) -> OpResult {
        if self.show_glyphs(bytes)? {
            Ok(())
        } else {
            Err(self.missing_font())
        }
    }

    fn show_text_adjusted(&mut self, items: &[TextItem<'_>]) -> OpResult {
        let mut font_missing = false;
        for item in items {
            match *item {
                TextItem::Text(bytes) => {
                    if !self.show_glyphs(bytes)? {
                        font_missing = true;
                    }
                }
                TextItem::Adjustment(value) => {
                    let text = &mut self.state_mut().text;
                    let offset = text.adjustment_offset(value);
                    text.advance(offset);
                }
            }
        }
        if font_missing {
            return Err(self.missing_font());
        }
        Ok(())
    }

    // --- Marked content ---

    fn marked_content_point(&mut self, tag: &str) -> OpResult {
        self.surface.marked_content_point(tag, None)
    }

    fn marked_content_point_with_properties(
        &mut self,
        tag: &str,
        _name: Option<&str>,
        properties: Option<&Dictionary>,
    ) -> OpResult {
        self.surface.marked_content_point(tag, properties)
    }

    fn begin_marked_content(&mut self, tag: &str) -> OpResult {
        self.marked_depth += 1;
        self.surface.begin_marked_content(tag, None)
    }

    fn begin_marked_content_with_properties(
        &mut self,
        tag: &str,
        _name: Option<&str>,
        properties: Option<&Dictionary>,
    ) -> OpResult {
        self.marked_depth += 1;
        self.surface.begin_marked_content(tag, properties)
    }

    fn end_marked_content(&mut self) -> OpResult {
        if self.marked_depth == 0 {
            return Err(Signal::warning(
                WarningCode::UnbalancedMarkedContent,
                "'EMC' without open marked content",
            ));
        }
        self.marked_depth -= 1;
        self.surface.end_marked_content()
    }

    // --- External objects ---

    fn draw_xobject(&mut self, name: &str, xobject: Option<&XObject>) -> OpResult {
        match xobject {
            Some(XObject::Image(image)) => {
                self.surface
                    .draw_image(name, image, self.stack.current())
            }
            _ => Ok(()),
        }
    }

    fn draw_shading(&mut self, name: &str, shading: Option<&Shading>) -> OpResult {
        self.surface
            .draw_shading(name, shading, self.stack.current())
    }

    fn draw_inline_image(
        &mut self,
        image: &InlineImage,
        color_space: Option<&ColorSpace>,
    ) -> OpResult {
        self.surface
            .draw_inline_image(image, color_space, self.stack.current())
    }
}
