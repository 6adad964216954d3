//! The content-stream interpreter.
//!
//! [`Interpreter::process`] walks a sequence of [`Operation`]s once, in
//! order, turning each into one device callback (or, for `'` and `"`, a fixed
//! sequence of callbacks). Operand names are resolved against the active
//! resource scope before the callback runs, unless the device declined that
//! category through [`Device::features`].
//!
//! Every callback reports an [`OpResult`]. The loop classifies the outcome:
//! warnings go to the [`ConditionHandler`] and the loop moves on, fatal
//! conditions are offered to the handler, which either swallows them or
//! re-raises. A re-raised condition inside a form unwinds as
//! [`Signal::Abort`] so it is not offered twice.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pdfpaint_core::{
    ColorSpace, DashPattern, FillRule, LineCap, LineJoin, TextRenderMode, Warning, WarningCode,
};
use tracing::{debug, error, trace, warn};

use crate::device::{Device, Features, TextItem};
use crate::error::{InterpError, OpResult, Signal};
use crate::handler::{ConditionHandler, DefaultHandler};
use crate::operands::{
    affine, array, components, dictionary, integer, name, number, numbers, object_to_f64,
    string, trailing_name,
};
use crate::operation::{Operation, Operator};
use crate::resources::{FormXObject, InlineImage, ResolveError, Resources, XObject};

/// Interpreter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// Forms nested deeper than this are skipped with a warning.
    pub max_form_depth: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self { max_form_depth: 10 }
    }
}

/// How a call to [`Interpreter::process`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Finished,
    /// Stopped at an operation boundary after cancellation was requested.
    Cancelled,
}

/// Cooperative cancellation flag, checked once per operation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-`process` execution context. Forms push their own.
#[derive(Debug)]
struct Frame {
    resources: Arc<dyn Resources>,
    default_gray: Option<ColorSpace>,
    default_rgb: Option<ColorSpace>,
    default_cmyk: Option<ColorSpace>,
    compat_depth: usize,
}

/// Result of a resource lookup.
enum Lookup<T> {
    Found(T),
    /// The device does not want this category resolved.
    Declined,
    Missing,
}

impl<T> Lookup<T> {
    /// The callback slot: `Some` when found, `None` when declined. A missing
    /// entry becomes a warning and the operator is skipped.
    fn into_slot(self, category: &str, name: &str) -> Result<Option<T>, Signal> {
        match self {
            Lookup::Found(value) => Ok(Some(value)),
            Lookup::Declined => Ok(None),
            Lookup::Missing => Err(missing_resource(category, name)),
        }
    }
}

fn missing_resource(category: &str, name: &str) -> Signal {
    Signal::Warning(Warning::for_resource(
        WarningCode::MissingResource,
        format!("{category} /{name} is not in the resource dictionary"),
        name,
    ))
}

fn malformed(operator: Operator, detail: impl std::fmt::Display) -> Signal {
    Signal::warning(
        WarningCode::MalformedOperands,
        format!("'{operator}': {detail}"),
    )
}

/// Drives a [`Device`] through content streams.
pub struct Interpreter<'h, D> {
    device: D,
    options: InterpreterOptions,
    handler: Box<dyn ConditionHandler + 'h>,
    frames: Vec<Frame>,
    cancel: Option<CancellationToken>,
}

impl<'h, D: Device> Interpreter<'h, D> {
    pub fn new(device: D) -> Self {
        Self::with_options(device, InterpreterOptions::default())
    }

    pub fn with_options(device: D, options: InterpreterOptions) -> Self {
        Self {
            device,
            options,
            handler: Box::new(DefaultHandler),
            frames: Vec::new(),
            cancel: None,
        }
    }

    /// Install the handler receiving warnings and fatal conditions.
    pub fn with_handler(mut self, handler: Box<dyn ConditionHandler + 'h>) -> Self {
        self.handler = handler;
        self
    }

    pub fn options(&self) -> InterpreterOptions {
        self.options
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Interpret `content` against `resources`.
    ///
    /// Fatal conditions the handler re-raises come back as `Err`; the
    /// device keeps whatever effects the content had up to that point.
    pub fn process(
        &mut self,
        content: &[Operation],
        resources: Arc<dyn Resources>,
    ) -> Result<Completion, InterpError> {
        self.cancel = None;
        self.run(content, resources)
    }

    /// Like [`process`](Interpreter::process), stopping at the next
    /// operation boundary once `token` is cancelled.
    pub fn process_cancellable(
        &mut self,
        content: &[Operation],
        resources: Arc<dyn Resources>,
        token: &CancellationToken,
    ) -> Result<Completion, InterpError> {
        self.cancel = Some(token.clone());
        let result = self.run(content, resources);
        self.cancel = None;
        result
    }

    fn run(
        &mut self,
        content: &[Operation],
        resources: Arc<dyn Resources>,
    ) -> Result<Completion, InterpError> {
        self.push_frame(resources);
        let result = self.execute(content);
        self.frames.pop();
        match result {
            Ok(completion) => Ok(completion),
            Err(Signal::Abort(err) | Signal::Fatal(err)) => Err(err),
            // route() never lets these escape
            Err(Signal::Warning(_) | Signal::Unsupported) => Ok(Completion::Finished),
        }
    }

    fn execute(&mut self, content: &[Operation]) -> Result<Completion, Signal> {
        for (index, op) in content.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                debug!(index, "content interpretation cancelled");
                return Ok(Completion::Cancelled);
            }
            trace!(operator = %op.operator, index, "dispatch");
            let outcome = self.dispatch(op, index);
            self.route(outcome, op, index)?;
        }
        Ok(Completion::Finished)
    }

    /// Classify one operation's outcome. Only an unwinding abort escapes.
    fn route(&mut self, outcome: OpResult, op: &Operation, index: usize) -> Result<(), Signal> {
        match outcome {
            Ok(()) => Ok(()),
            Err(Signal::Unsupported) => {
                if self.compat_depth() == 0 {
                    self.report(
                        Warning::new(
                            WarningCode::UnsupportedOperator,
                            format!("operator '{}' is not supported", op.operator),
                        )
                        .at_operator(&op.operator, index),
                    );
                }
                Ok(())
            }
            Err(Signal::Warning(warning)) => {
                self.report(warning.at_operator(&op.operator, index));
                Ok(())
            }
            Err(Signal::Fatal(err)) => {
                error!(operator = %op.operator, index, "{err}");
                self.handler.on_fatal(err).map_err(Signal::Abort)
            }
            Err(abort @ Signal::Abort(_)) => Err(abort),
        }
    }

    fn report(&mut self, warning: Warning) {
        warn!(
            code = %warning.code,
            operator = warning.operator.as_deref().unwrap_or(""),
            index = ?warning.operator_index,
            "{}",
            warning.description
        );
        self.handler.on_warning(&warning);
    }

    /// Report a warning from a callback the interpreter issues on its own
    /// (form setup), keep everything else.
    fn tolerate(&mut self, result: OpResult, operator: &str, index: usize) -> OpResult {
        match result {
            Err(Signal::Warning(warning)) => {
                self.report(warning.at_operator(operator, index));
                Ok(())
            }
            other => other,
        }
    }

    // --- Frames and resources ---

    fn push_frame(&mut self, resources: Arc<dyn Resources>) {
        let mut frame = Frame {
            resources,
            default_gray: None,
            default_rgb: None,
            default_cmyk: None,
            compat_depth: 0,
        };
        if self.device.features().contains(Features::COLOR_SPACES) {
            frame.default_gray = self.default_space(&frame, "DefaultGray", 1);
            frame.default_rgb = self.default_space(&frame, "DefaultRGB", 3);
            frame.default_cmyk = self.default_space(&frame, "DefaultCMYK", 4);
        }
        self.frames.push(frame);
    }

    /// A page default color space. Failures only cost the default.
    fn default_space(&mut self, frame: &Frame, name: &str, components: usize) -> Option<ColorSpace> {
        let problem = match frame.resources.color_space(name) {
            Ok(None) => return None,
            Ok(Some(space)) if space.components() == components => return Some(space),
            Ok(Some(space)) => format!(
                "/{name} has {} components, expected {components}",
                space.components()
            ),
            Err(err) => format!("/{name} could not be resolved: {err}"),
        };
        self.report(Warning::for_resource(
            WarningCode::DefaultColorSpace,
            problem,
            name,
        ));
        None
    }

    fn compat_depth(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.compat_depth)
    }

    fn lookup<T>(
        &self,
        feature: Features,
        category: &'static str,
        name: &str,
        resolve: impl FnOnce(&dyn Resources, &str) -> Result<Option<T>, ResolveError>,
    ) -> Result<Lookup<T>, Signal> {
        if !self.device.features().contains(feature) {
            return Ok(Lookup::Declined);
        }
        let Some(frame) = self.frames.last() else {
            return Ok(Lookup::Missing);
        };
        match resolve(frame.resources.as_ref(), name) {
            Ok(Some(value)) => Ok(Lookup::Found(value)),
            Ok(None) => Ok(Lookup::Missing),
            Err(source) => Err(Signal::Fatal(InterpError::Resolve {
                category,
                name: name.to_string(),
                source,
            })),
        }
    }

    /// Operand of `CS`/`cs` or an inline image's named space. Device
    /// families never touch the resources and honor the page defaults.
    fn color_space_operand(&self, name: &str) -> Result<Option<ColorSpace>, Signal> {
        if let Some(space) = ColorSpace::from_device_name(name) {
            let frame = self.frames.last();
            let default = match space {
                ColorSpace::DeviceGray => frame.and_then(|f| f.default_gray.clone()),
                ColorSpace::DeviceRgb => frame.and_then(|f| f.default_rgb.clone()),
                ColorSpace::DeviceCmyk => frame.and_then(|f| f.default_cmyk.clone()),
                _ => None,
            };
            return Ok(Some(default.unwrap_or(space)));
        }
        self.lookup(Features::COLOR_SPACES, "color space", name, |r, n| {
            r.color_space(n)
        })?
        .into_slot("color space", name)
    }

    /// Property list of `BDC`/`DP`: inline dictionary or resource name.
    fn properties_operand(
        &self,
        op: &Operation,
    ) -> Result<(Option<String>, Option<lopdf::Dictionary>), Signal> {
        if let Some(dict) = dictionary(op, 1) {
            return Ok((None, Some(dict.clone())));
        }
        let name = name(op, 1)?;
        let properties = self
            .lookup(Features::PROPERTIES, "properties", &name, |r, n| {
                r.properties(n)
            })?
            .into_slot("properties", &name)?;
        Ok((Some(name), properties))
    }

    // --- Dispatch ---

    fn dispatch(&mut self, op: &Operation, index: usize) -> OpResult {
        let Some(operator) = op.kind() else {
            return self.device.passthrough(op);
        };
        match operator {
            // --- General graphics state ---
            Operator::SetLineWidth => self.device.set_line_width(number(op, 0)?),
            Operator::SetLineCap => {
                let value = integer(op, 0)?;
                let cap = LineCap::from_i64(value)
                    .ok_or_else(|| malformed(operator, format!("unknown line cap {value}")))?;
                self.device.set_line_cap(cap)
            }
            Operator::SetLineJoin => {
                let value = integer(op, 0)?;
                let join = LineJoin::from_i64(value)
                    .ok_or_else(|| malformed(operator, format!("unknown line join {value}")))?;
                self.device.set_line_join(join)
            }
            Operator::SetMiterLimit => self.device.set_miter_limit(number(op, 0)?),
            Operator::SetDash => {
                let lengths = array(op, 0)?
                    .iter()
                    .map(|item| {
                        object_to_f64(item)
                            .ok_or_else(|| malformed(operator, "dash lengths must be numbers"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let phase = number(op, 1)?;
                self.device.set_dash(DashPattern::new(lengths, phase))
            }
            Operator::SetRenderingIntent => self.device.set_rendering_intent(&name(op, 0)?),
            Operator::SetFlatness => self.device.set_flatness(number(op, 0)?),
            Operator::SetExtGState => {
                let name = name(op, 0)?;
                let state = self
                    .lookup(Features::EXT_GSTATES, "ExtGState", &name, |r, n| {
                        r.ext_gstate(n)
                    })?
                    .into_slot("ExtGState", &name)?;
                self.device.set_ext_gstate(&name, state.as_ref())
            }

            // --- Special graphics state ---
            Operator::Save => self.device.save_state(),
            Operator::Restore => self.device.restore_state(),
            Operator::ConcatMatrix => self.device.concat_matrix(affine(op)?),

            // --- Path construction ---
            Operator::MoveTo => {
                let [x, y] = numbers::<2>(op)?;
                self.device.move_to(x, y)
            }
            Operator::LineTo => {
                let [x, y] = numbers::<2>(op)?;
                self.device.line_to(x, y)
            }
            Operator::CurveTo => {
                let [x1, y1, x2, y2, x3, y3] = numbers::<6>(op)?;
                self.device.curve_to(x1, y1, x2, y2, x3, y3)
            }
            Operator::CurveToV => {
                let [x2, y2, x3, y3] = numbers::<4>(op)?;
                self.device.curve_to_v(x2, y2, x3, y3)
            }
            Operator::CurveToY => {
                let [x1, y1, x3, y3] = numbers::<4>(op)?;
                self.device.curve_to_y(x1, y1, x3, y3)
            }
            Operator::ClosePath => self.device.close_path(),
            Operator::Rectangle => {
                let [x, y, w, h] = numbers::<4>(op)?;
                self.device.rectangle(x, y, w, h)
            }

            // --- Path painting and clipping ---
            Operator::Stroke => self.device.stroke(),
            Operator::CloseStroke => self.device.close_stroke(),
            Operator::Fill | Operator::FillCompat => self.device.fill(FillRule::NonZeroWinding),
            Operator::FillEvenOdd => self.device.fill(FillRule::EvenOdd),
            Operator::FillStroke => self.device.fill_stroke(FillRule::NonZeroWinding),
            Operator::FillStrokeEvenOdd => self.device.fill_stroke(FillRule::EvenOdd),
            Operator::CloseFillStroke => self.device.close_fill_stroke(FillRule::NonZeroWinding),
            Operator::CloseFillStrokeEvenOdd => self.device.close_fill_stroke(FillRule::EvenOdd),
            Operator::EndPath => self.device.end_path(),
            Operator::Clip => self.device.clip(FillRule::NonZeroWinding),
            Operator::ClipEvenOdd => self.device.clip(FillRule::EvenOdd),

            // --- Text objects and state ---
            Operator::BeginText => self.device.begin_text(),
            Operator::EndText => self.device.end_text(),
            Operator::SetCharSpacing => self.device.set_char_spacing(number(op, 0)?),
            Operator::SetWordSpacing => self.device.set_word_spacing(number(op, 0)?),
            Operator::SetHorizontalScaling => self.device.set_horizontal_scaling(number(op, 0)?),
            Operator::SetLeading => self.device.set_leading(number(op, 0)?),
            Operator::SetFont => {
                let name = name(op, 0)?;
                let size = number(op, 1)?;
                let lookup = self.lookup(Features::FONTS, "font", &name, |r, n| r.font(n))?;
                let is_missing = matches!(lookup, Lookup::Missing);
                let font = match lookup {
                    Lookup::Found(font) => Some(font),
                    Lookup::Declined | Lookup::Missing => None,
                };
                // the size still applies; showing text then reports the font
                self.device.set_font(&name, font.as_ref(), size)?;
                if is_missing {
                    return Err(missing_resource("font", &name));
                }
                Ok(())
            }
            Operator::SetRenderMode => {
                let value = integer(op, 0)?;
                let mode = TextRenderMode::from_i64(value)
                    .ok_or_else(|| malformed(operator, format!("unknown render mode {value}")))?;
                self.device.set_render_mode(mode)
            }
            Operator::SetRise => self.device.set_rise(number(op, 0)?),

            // --- Text positioning ---
            Operator::MoveText => {
                let [tx, ty] = numbers::<2>(op)?;
                self.device.move_text(tx, ty)
            }
            Operator::MoveTextSetLeading => {
                let [tx, ty] = numbers::<2>(op)?;
                self.device.move_text_set_leading(tx, ty)
            }
            Operator::SetTextMatrix => self.device.set_text_matrix(affine(op)?),
            Operator::NextLine => self.device.next_line(),

            // --- Text showing ---
            Operator::ShowText => self.device.show_text(string(op, 0)?),
            Operator::ShowTextAdjusted => {
                let items: Vec<TextItem<'_>> = array(op, 0)?
                    .iter()
                    .map(|item| match item {
                        lopdf::Object::String(bytes, _) => Ok(TextItem::Text(bytes)),
                        other => object_to_f64(other).map(TextItem::Adjustment).ok_or_else(|| {
                            malformed(operator, "array entries must be strings or numbers")
                        }),
                    })
                    .collect::<Result<_, _>>()?;
                self.device.show_text_adjusted(&items)
            }
            Operator::NextLineShowText => {
                let bytes = string(op, 0)?;
                self.device.next_line()?;
                self.device.show_text(bytes)
            }
            Operator::SetSpacingNextLineShowText => {
                let [word, char] = numbers::<2>(op)?;
                let bytes = string(op, 2)?;
                self.device.set_word_spacing(word)?;
                self.device.set_char_spacing(char)?;
                self.device.next_line()?;
                self.device.show_text(bytes)
            }

            // --- Type 3 glyphs ---
            Operator::SetGlyphWidth => {
                let [wx, wy] = numbers::<2>(op)?;
                self.device.set_glyph_width(wx, wy)
            }
            Operator::SetGlyphWidthAndBounds => {
                let [wx, wy, llx, lly, urx, ury] = numbers::<6>(op)?;
                self.device
                    .set_glyph_width_and_bounds(wx, wy, llx, lly, urx, ury)
            }

            // --- Color ---
            Operator::SetStrokeColorSpace => {
                let name = name(op, 0)?;
                let space = self.color_space_operand(&name)?;
                self.device.set_stroke_color_space(&name, space.as_ref())
            }
            Operator::SetFillColorSpace => {
                let name = name(op, 0)?;
                let space = self.color_space_operand(&name)?;
                self.device.set_fill_color_space(&name, space.as_ref())
            }
            Operator::SetStrokeColor => self.device.set_stroke_color(&components(op)),
            Operator::SetFillColor => self.device.set_fill_color(&components(op)),
            Operator::SetStrokeColorN | Operator::SetFillColorN => {
                let stroking = operator == Operator::SetStrokeColorN;
                let values = components(op);
                let Some(name) = trailing_name(op) else {
                    return if stroking {
                        self.device.set_stroke_color(&values)
                    } else {
                        self.device.set_fill_color(&values)
                    };
                };
                let pattern = self
                    .lookup(Features::PATTERNS, "pattern", &name, |r, n| r.pattern(n))?
                    .into_slot("pattern", &name)?;
                if stroking {
                    self.device
                        .set_stroke_pattern(&values, &name, pattern.as_ref())
                } else {
                    self.device.set_fill_pattern(&values, &name, pattern.as_ref())
                }
            }
            Operator::SetStrokeGray => {
                let [gray] = numbers::<1>(op)?;
                let default = self.frames.last().and_then(|f| f.default_gray.as_ref());
                self.device.set_stroke_gray(gray as f32, default)
            }
            Operator::SetFillGray => {
                let [gray] = numbers::<1>(op)?;
                let default = self.frames.last().and_then(|f| f.default_gray.as_ref());
                self.device.set_fill_gray(gray as f32, default)
            }
            Operator::SetStrokeRgb => {
                let rgb = numbers::<3>(op)?.map(|v| v as f32);
                let default = self.frames.last().and_then(|f| f.default_rgb.as_ref());
                self.device.set_stroke_rgb(rgb, default)
            }
            Operator::SetFillRgb => {
                let rgb = numbers::<3>(op)?.map(|v| v as f32);
                let default = self.frames.last().and_then(|f| f.default_rgb.as_ref());
                self.device.set_fill_rgb(rgb, default)
            }
            Operator::SetStrokeCmyk => {
                let cmyk = numbers::<4>(op)?.map(|v| v as f32);
                let default = self.frames.last().and_then(|f| f.default_cmyk.as_ref());
                self.device.set_stroke_cmyk(cmyk, default)
            }
            Operator::SetFillCmyk => {
                let cmyk = numbers::<4>(op)?.map(|v| v as f32);
                let default = self.frames.last().and_then(|f| f.default_cmyk.as_ref());
                self.device.set_fill_cmyk(cmyk, default)
            }

            // --- Shading and images ---
            Operator::PaintShading => {
                let name = name(op, 0)?;
                let shading = self
                    .lookup(Features::SHADINGS, "shading", &name, |r, n| r.shading(n))?
                    .into_slot("shading", &name)?;
                self.device.draw_shading(&name, shading.as_ref())
            }
            Operator::BeginInlineImage => {
                let image = InlineImage::cached(op).map_err(|err| malformed(operator, err))?;
                let space = match (&image.color_space, &image.color_space_name) {
                    (Some(space), _) => Some(space.clone()),
                    (None, Some(name)) => self.color_space_operand(name)?,
                    (None, None) => None,
                };
                self.device.draw_inline_image(image, space.as_ref())
            }
            // folded into BI by the tokenizer
            Operator::InlineImageData | Operator::EndInlineImage => Ok(()),
            Operator::PaintXObject => {
                let name = name(op, 0)?;
                let xobject = self
                    .lookup(Features::XOBJECTS, "XObject", &name, |r, n| r.xobject(n))?
                    .into_slot("XObject", &name)?;
                self.device.draw_xobject(&name, xobject.as_ref())?;
                match xobject {
                    Some(XObject::Form(form)) => self.run_form(&name, &form, op, index),
                    _ => Ok(()),
                }
            }

            // --- Marked content ---
            Operator::MarkedContentPoint => self.device.marked_content_point(&name(op, 0)?),
            Operator::MarkedContentPointProperties => {
                let tag = name(op, 0)?;
                let (name, properties) = self.properties_operand(op)?;
                self.device.marked_content_point_with_properties(
                    &tag,
                    name.as_deref(),
                    properties.as_ref(),
                )
            }
            Operator::BeginMarkedContent => self.device.begin_marked_content(&name(op, 0)?),
            Operator::BeginMarkedContentProperties => {
                let tag = name(op, 0)?;
                let (name, properties) = self.properties_operand(op)?;
                self.device.begin_marked_content_with_properties(
                    &tag,
                    name.as_deref(),
                    properties.as_ref(),
                )
            }
            Operator::EndMarkedContent => self.device.end_marked_content(),

            // --- Compatibility ---
            Operator::BeginCompatibility => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.compat_depth += 1;
                }
                self.device.begin_compatibility()
            }
            Operator::EndCompatibility => {
                let Some(frame) = self.frames.last_mut().filter(|f| f.compat_depth > 0) else {
                    return Err(Signal::warning(
                        WarningCode::UnbalancedCompatibility,
                        "'EX' without a matching 'BX'",
                    ));
                };
                frame.compat_depth -= 1;
                self.device.end_compatibility()
            }
        }
    }

    // --- Forms ---

    /// Run a form's content: `q`, its matrix, its bounding box as a clip,
    /// the content in a frame of its own, then `Q`.
    fn run_form(
        &mut self,
        name: &str,
        form: &FormXObject,
        op: &Operation,
        index: usize,
    ) -> OpResult {
        if self.frames.len() > self.options.max_form_depth {
            return Err(Signal::Warning(Warning::for_resource(
                WarningCode::FormDepthExceeded,
                format!("form nesting deeper than {}", self.options.max_form_depth),
                name,
            )));
        }
        debug!(form = name, depth = self.frames.len(), "entering form");
        let saved = self.device.save_state();
        self.tolerate(saved, &op.operator, index)?;
        let result = self.form_body(form, op, index);
        let restored = self.device.restore_state();
        debug!(form = name, "leaving form");
        result?;
        self.tolerate(restored, &op.operator, index)
    }

    fn form_body(&mut self, form: &FormXObject, op: &Operation, index: usize) -> OpResult {
        let concat = self.device.concat_matrix(form.matrix);
        self.tolerate(concat, &op.operator, index)?;
        if let Some(bbox) = form.bbox {
            self.device
                .rectangle(bbox.x0, bbox.y0, bbox.width(), bbox.height())?;
            self.device.clip(FillRule::NonZeroWinding)?;
            self.device.end_path()?;
        }
        let resources = match &form.resources {
            Some(own) => Arc::clone(own),
            None => match self.frames.last() {
                Some(frame) => Arc::clone(&frame.resources),
                None => Arc::new(crate::resources::NoResources),
            },
        };
        self.push_frame(resources);
        let result = self.execute(&form.content);
        self.frames.pop();
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::tokenize;
    use crate::engine::GraphicsDevice;
    use crate::handler::CollectingHandler;
    use crate::resources::NoResources;
    use crate::surface::RecordingSurface;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ops(src: &str) -> Vec<Operation> {
        tokenize(src.as_bytes()).unwrap()
    }

    /// A handler that shares its records with the test body.
    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<CollectingHandler>>);

    impl ConditionHandler for Shared {
        fn on_warning(&mut self, warning: &Warning) {
            self.0.borrow_mut().on_warning(warning);
        }

        fn on_fatal(&mut self, error: InterpError) -> Result<(), InterpError> {
            self.0.borrow_mut().on_fatal(error)
        }
    }

    /// Records callback names only.
    #[derive(Default)]
    struct Names(Vec<String>);

    impl Device for Names {
        fn save_state(&mut self) -> OpResult {
            self.0.push("q".into());
            Ok(())
        }
        fn restore_state(&mut self) -> OpResult {
            self.0.push("Q".into());
            Ok(())
        }
        fn next_line(&mut self) -> OpResult {
            self.0.push("T*".into());
            Ok(())
        }
        fn set_word_spacing(&mut self, spacing: f64) -> OpResult {
            self.0.push(format!("Tw {spacing}"));
            Ok(())
        }
        fn set_char_spacing(&mut self, spacing: f64) -> OpResult {
            self.0.push(format!("Tc {spacing}"));
            Ok(())
        }
        fn show_text(&mut self, bytes: &[u8]) -> OpResult {
            self.0.push(format!("Tj {}", String::from_utf8_lossy(bytes)));
            Ok(())
        }
        fn set_fill_gray(&mut self, gray: f32, default: Option<&ColorSpace>) -> OpResult {
            self.0.push(format!("g {gray} {}", default.is_some()));
            Ok(())
        }
        fn set_font(
            &mut self,
            name: &str,
            font: Option<&Arc<dyn pdfpaint_core::Font>>,
            size: f64,
        ) -> OpResult {
            self.0.push(format!("Tf {name} {size} {}", font.is_some()));
            Ok(())
        }
    }

    // --- Loop and routing ---

    #[test]
    fn unknown_operator_warns_once_outside_compatibility() {
        let shared = Shared::default();
        let mut interp = Interpreter::new(Names::default()).with_handler(Box::new(shared.clone()));
        interp
            .process(&ops("BX zz EX zz"), Arc::new(NoResources))
            .unwrap();
        let handler = shared.0.borrow();
        assert_eq!(handler.warning_codes(), vec!["UNSUPPORTED_OPERATOR"]);
        assert_eq!(handler.warnings[0].operator.as_deref(), Some("zz"));
        assert_eq!(handler.warnings[0].operator_index, Some(3));
    }

    #[test]
    fn unbalanced_ex_warns() {
        let shared = Shared::default();
        let mut interp = Interpreter::new(Names::default()).with_handler(Box::new(shared.clone()));
        interp.process(&ops("EX"), Arc::new(NoResources)).unwrap();
        assert_eq!(shared.0.borrow().warning_codes(), vec!["UNBALANCED_COMPATIBILITY"]);
    }

    #[test]
    fn malformed_operands_skip_the_operator() {
        let shared = Shared::default();
        let device = GraphicsDevice::new(RecordingSurface::new());
        let mut interp = Interpreter::new(device).with_handler(Box::new(shared.clone()));
        interp
            .process(&ops("/X w 0 0 m 5 l 2 w"), Arc::new(NoResources))
            .unwrap();
        assert_eq!(
            shared.0.borrow().warning_codes(),
            vec!["MALFORMED_OPERANDS", "MALFORMED_OPERANDS"]
        );
        assert_eq!(interp.device().state().line_width, 2.0);
    }

    #[test]
    fn wrongly_typed_array_entries_skip_the_operator() {
        let shared = Shared::default();
        let device = GraphicsDevice::new(RecordingSurface::new());
        let mut interp = Interpreter::new(device).with_handler(Box::new(shared.clone()));
        interp
            .process(&ops("[3 /x] 0 d BT [(A) /x 5] TJ ET"), Arc::new(NoResources))
            .unwrap();
        let handler = shared.0.borrow();
        assert_eq!(
            handler.warning_codes(),
            vec!["MALFORMED_OPERANDS", "MALFORMED_OPERANDS"]
        );
        assert_eq!(handler.warnings[0].operator.as_deref(), Some("d"));
        assert_eq!(handler.warnings[1].operator.as_deref(), Some("TJ"));
        assert!(interp.device().state().dash.is_solid());
    }

    #[test]
    fn fatal_without_handler_propagates() {
        let device = GraphicsDevice::new(RecordingSurface::new());
        let mut interp = Interpreter::new(device);
        let err = interp
            .process(&ops("Q 0 0 m"), Arc::new(NoResources))
            .unwrap_err();
        assert!(matches!(err, InterpError::StackUnderflow));
        // nothing after the fatal operator ran
        assert!(interp.device().path().is_empty());
    }

    #[test]
    fn swallowed_fatal_continues() {
        let shared = Shared(Rc::new(RefCell::new(CollectingHandler::swallowing())));
        let device = GraphicsDevice::new(RecordingSurface::new());
        let mut interp = Interpreter::new(device).with_handler(Box::new(shared.clone()));
        let done = interp
            .process(&ops("Q 0 0 m"), Arc::new(NoResources))
            .unwrap();
        assert_eq!(done, Completion::Finished);
        assert_eq!(shared.0.borrow().fatal.len(), 1);
        assert!(!interp.device().path().is_empty());
    }

    #[test]
    fn cancelled_before_first_operation() {
        let token = CancellationToken::new();
        token.cancel();
        let mut interp = Interpreter::new(Names::default());
        let done = interp
            .process_cancellable(&ops("q Q"), Arc::new(NoResources), &token)
            .unwrap();
        assert_eq!(done, Completion::Cancelled);
        assert!(interp.device().0.is_empty());
    }

    // --- Operator expansion ---

    #[test]
    fn quote_operators_expand_to_primitives() {
        let mut interp = Interpreter::new(Names::default());
        interp
            .process(&ops("(a) ' 1 2 (b) \""), Arc::new(NoResources))
            .unwrap();
        assert_eq!(
            interp.into_device().0,
            vec!["T*", "Tj a", "Tw 1", "Tc 2", "T*", "Tj b"]
        );
    }

    #[test]
    fn missing_font_still_sets_size() {
        let shared = Shared::default();
        let mut interp = Interpreter::new(Names::default()).with_handler(Box::new(shared.clone()));
        interp
            .process(&ops("/F1 12 Tf"), Arc::new(NoResources))
            .unwrap();
        assert_eq!(interp.device().0, vec!["Tf F1 12 false"]);
        let handler = shared.0.borrow();
        assert_eq!(handler.warning_codes(), vec!["MISSING_RESOURCE"]);
        assert_eq!(handler.warnings[0].resource.as_deref(), Some("F1"));
    }

    // --- Resources ---

    #[derive(Debug)]
    struct Defaults;

    impl Resources for Defaults {
        fn color_space(&self, name: &str) -> Result<Option<ColorSpace>, ResolveError> {
            match name {
                "DefaultGray" => Ok(Some(ColorSpace::CalGray)),
                "DefaultRGB" => Ok(Some(ColorSpace::DeviceGray)),
                "DefaultCMYK" => Err(ResolveError::malformed("color space", "broken")),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn default_color_spaces_resolve_per_frame() {
        let shared = Shared::default();
        let mut interp = Interpreter::new(Names::default()).with_handler(Box::new(shared.clone()));
        interp.process(&ops("0.5 g"), Arc::new(Defaults)).unwrap();
        assert_eq!(interp.device().0, vec!["g 0.5 true"]);
        // wrong component count and a resolve failure both degrade
        assert_eq!(
            shared.0.borrow().warning_codes(),
            vec!["DEFAULT_COLOR_SPACE", "DEFAULT_COLOR_SPACE"]
        );
    }

    #[test]
    fn device_name_uses_default_space() {
        let device = GraphicsDevice::new(RecordingSurface::new());
        let mut interp = Interpreter::new(device);
        interp
            .process(&ops("/DeviceGray cs"), Arc::new(Defaults))
            .unwrap();
        assert_eq!(*interp.device().state().fill_color_space, ColorSpace::CalGray);
    }

    #[derive(Debug)]
    struct Broken;

    impl Resources for Broken {
        fn ext_gstate(
            &self,
            _name: &str,
        ) -> Result<Option<pdfpaint_core::ExtGState>, ResolveError> {
            Err(ResolveError::malformed("ExtGState", "/LW is a string"))
        }
    }

    #[test]
    fn resolve_failure_is_fatal() {
        let mut interp = Interpreter::new(Names::default());
        let err = interp
            .process(&ops("/GS0 gs"), Arc::new(Broken))
            .unwrap_err();
        assert!(matches!(err, InterpError::Resolve { category: "ExtGState", .. }));
    }

    #[test]
    fn declined_category_is_not_resolved() {
        struct NoGs;
        impl Device for NoGs {
            fn features(&self) -> Features {
                Features::all() - Features::EXT_GSTATES
            }
        }
        let mut interp = Interpreter::new(NoGs);
        assert_eq!(
            interp.process(&ops("/GS0 gs"), Arc::new(Broken)).unwrap(),
            Completion::Finished
        );
    }

    // --- Forms ---

    #[derive(Debug)]
    struct SelfReferencing(RefCell<Option<Arc<[Operation]>>>);

    impl Resources for SelfReferencing {
        fn xobject(&self, name: &str) -> Result<Option<XObject>, ResolveError> {
            if name != "Fm0" {
                return Ok(None);
            }
            let content = self
                .0
                .borrow_mut()
                .get_or_insert_with(|| ops("/Fm0 Do").into())
                .clone();
            Ok(Some(XObject::Form(FormXObject {
                matrix: pdfpaint_core::geometry::Affine::IDENTITY,
                bbox: None,
                content,
                resources: None,
            })))
        }
    }

    #[test]
    fn recursive_form_stops_at_depth_limit() {
        let shared = Shared::default();
        let mut interp = Interpreter::with_options(
            Names::default(),
            InterpreterOptions { max_form_depth: 3 },
        )
        .with_handler(Box::new(shared.clone()));
        interp
            .process(&ops("/Fm0 Do"), Arc::new(SelfReferencing(RefCell::new(None))))
            .unwrap();
        // three forms ran, each bracketed by q/Q
        assert_eq!(interp.device().0, vec!["q", "q", "q", "Q", "Q", "Q"]);
        assert_eq!(shared.0.borrow().warning_codes(), vec!["FORM_DEPTH_EXCEEDED"]);
    }
}
