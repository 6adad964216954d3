//! Drawing hooks driven by [`GraphicsDevice`](crate::GraphicsDevice).
//!
//! The engine keeps all state bookkeeping; a [`Surface`] only sees finished
//! marks: painted device-space paths, positioned glyphs, placed images.

use lopdf::Dictionary;
use pdfpaint_core::geometry::{Affine, BezPath, Rect};
use pdfpaint_core::{ClipRegion, Color, ColorSpace, FillRule, Glyph, GraphicsState, PaintOp};

use crate::error::OpResult;
use crate::operands::object_to_f64;
use crate::resources::{ImageXObject, InlineImage, Shading};

/// Output side of the graphics engine. Paths are in device space.
#[allow(unused_variables)]
pub trait Surface {
    fn fill_path(&mut self, path: &BezPath, rule: FillRule, state: &GraphicsState) -> OpResult {
        Ok(())
    }

    fn stroke_path(&mut self, path: &BezPath, state: &GraphicsState) -> OpResult {
        Ok(())
    }

    fn fill_and_stroke_path(
        &mut self,
        path: &BezPath,
        rule: FillRule,
        state: &GraphicsState,
    ) -> OpResult {
        Ok(())
    }

    /// A fill of a path with no visible area (a hairline or a zero-height
    /// rectangle). Called after [`fill_path`](Surface::fill_path) so the mark
    /// can still be drawn as a thin stroke.
    fn fill_zero_area(&mut self, path: &BezPath, state: &GraphicsState) -> OpResult {
        Ok(())
    }

    /// A clip was installed; `clip` is the resulting region.
    fn clip_hint(&mut self, path: &BezPath, rule: FillRule, clip: &ClipRegion) -> OpResult {
        Ok(())
    }

    /// One glyph; `rendering` maps glyph space to device space.
    fn show_glyph(&mut self, glyph: &Glyph, rendering: Affine, state: &GraphicsState) -> OpResult {
        Ok(())
    }

    fn draw_image(&mut self, name: &str, image: &ImageXObject, state: &GraphicsState) -> OpResult {
        Ok(())
    }

    fn draw_inline_image(
        &mut self,
        image: &InlineImage,
        color_space: Option<&ColorSpace>,
        state: &GraphicsState,
    ) -> OpResult {
        Ok(())
    }

    fn draw_shading(
        &mut self,
        name: &str,
        shading: Option<&Shading>,
        state: &GraphicsState,
    ) -> OpResult {
        Ok(())
    }

    fn begin_marked_content(&mut self, tag: &str, properties: Option<&Dictionary>) -> OpResult {
        Ok(())
    }

    fn end_marked_content(&mut self) -> OpResult {
        Ok(())
    }

    fn marked_content_point(&mut self, tag: &str, properties: Option<&Dictionary>) -> OpResult {
        Ok(())
    }
}

/// A mark recorded by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum PaintEvent {
    Path {
        path: BezPath,
        op: PaintOp,
        /// Set for the extra stroke of a zero-area fill.
        zero_area: bool,
        line_width: f64,
        stroke_color: Color,
        fill_color: Color,
        /// Bounds of the clip in effect, `None` when unclipped.
        clip: Option<Rect>,
    },
    Glyph {
        code: u32,
        width: f64,
        font: String,
        size: f64,
        rendering: Affine,
        color: Color,
    },
    Image {
        name: String,
        width: u32,
        height: u32,
        ctm: Affine,
    },
    InlineImage {
        width: u32,
        height: u32,
        ctm: Affine,
    },
    Shading {
        name: String,
        shading_type: Option<i64>,
        ctm: Affine,
    },
    ClipHint {
        path: BezPath,
        rule: FillRule,
        bounds: Option<Rect>,
    },
    BeginMarkedContent {
        tag: String,
        mcid: Option<i64>,
    },
    EndMarkedContent,
    MarkedContentPoint {
        tag: String,
    },
}

impl PaintEvent {
    /// Short event name used in traces.
    pub fn kind(&self) -> &'static str {
        match self {
            PaintEvent::Path { zero_area: true, .. } => "zero_area",
            PaintEvent::Path { .. } => "path",
            PaintEvent::Glyph { .. } => "glyph",
            PaintEvent::Image { .. } => "image",
            PaintEvent::InlineImage { .. } => "inline_image",
            PaintEvent::Shading { .. } => "shading",
            PaintEvent::ClipHint { .. } => "clip",
            PaintEvent::BeginMarkedContent { .. } => "begin_marked_content",
            PaintEvent::EndMarkedContent => "end_marked_content",
            PaintEvent::MarkedContentPoint { .. } => "marked_content_point",
        }
    }
}

/// A [`Surface`] that keeps every mark in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    events: Vec<PaintEvent>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[PaintEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<PaintEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn into_events(self) -> Vec<PaintEvent> {
        self.events
    }

    fn record_path(&mut self, path: &BezPath, op: PaintOp, zero_area: bool, state: &GraphicsState) {
        self.events.push(PaintEvent::Path {
            path: path.clone(),
            op,
            zero_area,
            line_width: state.line_width,
            stroke_color: state.stroke_color.clone(),
            fill_color: state.fill_color.clone(),
            clip: state.clip.bounds(),
        });
    }
}

fn mcid(properties: Option<&Dictionary>) -> Option<i64> {
    properties
        .and_then(|dict| dict.get(b"MCID").ok())
        .and_then(object_to_f64)
        .map(|v| v as i64)
}

impl Surface for RecordingSurface {
    fn fill_path(&mut self, path: &BezPath, rule: FillRule, state: &GraphicsState) -> OpResult {
        self.record_path(path, PaintOp::Fill(rule), false, state);
        Ok(())
    }

    fn stroke_path(&mut self, path: &BezPath, state: &GraphicsState) -> OpResult {
        self.record_path(path, PaintOp::Stroke, false, state);
        Ok(())
    }

    fn fill_and_stroke_path(
        &mut self,
        path: &BezPath,
        rule: FillRule,
        state: &GraphicsState,
    ) -> OpResult {
        self.record_path(path, PaintOp::FillStroke(rule), false, state);
        Ok(())
    }

    fn fill_zero_area(&mut self, path: &BezPath, state: &GraphicsState) -> OpResult {
        self.record_path(path, PaintOp::Stroke, true, state);
        Ok(())
    }

    fn clip_hint(&mut self, path: &BezPath, rule: FillRule, clip: &ClipRegion) -> OpResult {
        self.events.push(PaintEvent::ClipHint {
            path: path.clone(),
            rule,
            bounds: clip.bounds(),
        });
        Ok(())
    }

    fn show_glyph(&mut self, glyph: &Glyph, rendering: Affine, state: &GraphicsState) -> OpResult {
        self.events.push(PaintEvent::Glyph {
            code: glyph.code,
            width: glyph.width,
            font: state
                .text
                .font()
                .map(|font| font.name.clone())
                .unwrap_or_default(),
            size: state.text.font_size(),
            rendering,
            color: state.fill_color.clone(),
        });
        Ok(())
    }

    fn draw_image(&mut self, name: &str, image: &ImageXObject, state: &GraphicsState) -> OpResult {
        self.events.push(PaintEvent::Image {
            name: name.to_string(),
            width: image.width,
            height: image.height,
            ctm: state.ctm,
        });
        Ok(())
    }

    fn draw_inline_image(
        &mut self,
        image: &InlineImage,
        _color_space: Option<&ColorSpace>,
        state: &GraphicsState,
    ) -> OpResult {
        self.events.push(PaintEvent::InlineImage {
            width: image.width,
            height: image.height,
            ctm: state.ctm,
        });
        Ok(())
    }

    fn draw_shading(
        &mut self,
        name: &str,
        shading: Option<&Shading>,
        state: &GraphicsState,
    ) -> OpResult {
        self.events.push(PaintEvent::Shading {
            name: name.to_string(),
            shading_type: shading.map(|s| s.shading_type),
            ctm: state.ctm,
        });
        Ok(())
    }

    fn begin_marked_content(&mut self, tag: &str, properties: Option<&Dictionary>) -> OpResult {
        self.events.push(PaintEvent::BeginMarkedContent {
            tag: tag.to_string(),
            mcid: mcid(properties),
        });
        Ok(())
    }

    fn end_marked_content(&mut self) -> OpResult {
        self.events.push(PaintEvent::EndMarkedContent);
        Ok(())
    }

    fn marked_content_point(&mut self, tag: &str, _properties: Option<&Dictionary>) -> OpResult {
        self.events.push(PaintEvent::MarkedContentPoint {
            tag: tag.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Object;
    use pdfpaint_core::geometry::Shape;

    #[test]
    fn records_paths_with_state_snapshot() {
        let mut surface = RecordingSurface::new();
        let mut state = GraphicsState::default();
        state.line_width = 2.5;
        let path = Rect::new(0.0, 0.0, 10.0, 10.0).to_path(0.1);

        surface.fill_path(&path, FillRule::EvenOdd, &state).unwrap();
        surface.fill_zero_area(&path, &state).unwrap();

        let events = surface.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), "path");
        assert_eq!(events[1].kind(), "zero_area");
        let PaintEvent::Path {
            op,
            line_width,
            clip,
            ..
        } = &events[0]
        else {
            panic!("expected a path");
        };
        assert_eq!(*op, PaintOp::Fill(FillRule::EvenOdd));
        assert_eq!(*line_width, 2.5);
        assert_eq!(*clip, None);
    }

    #[test]
    fn marked_content_carries_mcid() {
        let mut surface = RecordingSurface::new();
        let mut props = Dictionary::new();
        props.set("MCID", Object::Integer(7));
        surface.begin_marked_content("P", Some(&props)).unwrap();
        surface.end_marked_content().unwrap();
        assert_eq!(
            surface.take_events(),
            vec![
                PaintEvent::BeginMarkedContent {
                    tag: "P".to_string(),
                    mcid: Some(7),
                },
                PaintEvent::EndMarkedContent,
            ]
        );
        assert!(surface.events().is_empty());
    }
}
