//! The graphics state and its bounded `q`/`Q` stack.

use std::sync::Arc;

use crate::clip::ClipRegion;
use crate::color::{Color, ColorSpace};
use crate::error::StateStackError;
use crate::geometry::Affine;
use crate::painting::{DashPattern, LineCap, LineJoin};
use crate::text_state::TextState;

/// Maximum number of saved states unless configured otherwise.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 500;

/// Parameters from an `ExtGState` dictionary (`gs` operator).
///
/// Every entry is optional; only present entries override the state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtGState {
    pub line_width: Option<f64>,
    pub line_cap: Option<LineCap>,
    pub line_join: Option<LineJoin>,
    pub miter_limit: Option<f64>,
    pub dash: Option<DashPattern>,
    pub rendering_intent: Option<String>,
    pub flatness: Option<f64>,
    /// `/CA`
    pub stroke_alpha: Option<f64>,
    /// `/ca`
    pub fill_alpha: Option<f64>,
    pub blend_mode: Option<String>,
    pub stroke_adjustment: Option<bool>,
    /// `/Font [font size]`: only the size is carried; the font itself is
    /// selected through `Tf`.
    pub font_size: Option<f64>,
}

/// Device-independent graphics state.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub ctm: Affine,
    /// Device-space clip.
    pub clip: ClipRegion,
    pub stroke_color_space: Arc<ColorSpace>,
    pub stroke_color: Color,
    pub fill_color_space: Arc<ColorSpace>,
    pub fill_color: Color,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub dash: DashPattern,
    pub rendering_intent: Option<String>,
    pub flatness: f64,
    pub stroke_alpha: f64,
    pub fill_alpha: f64,
    /// Last extended state applied with `gs`, copied on save.
    pub ext_state: Option<Box<ExtGState>>,
    pub text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self::new(Affine::IDENTITY)
    }
}

impl GraphicsState {
    /// Initial state for a page whose user space maps to device space by `ctm`.
    pub fn new(ctm: Affine) -> Self {
        let gray = Arc::new(ColorSpace::DeviceGray);
        Self {
            ctm,
            clip: ClipRegion::Unbounded,
            stroke_color_space: gray.clone(),
            stroke_color: Color::black(),
            fill_color_space: gray,
            fill_color: Color::black(),
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            dash: DashPattern::solid(),
            rendering_intent: None,
            flatness: 1.0,
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
            ext_state: None,
            text: TextState::new(),
        }
    }

    /// Select a stroking color space and its initial color (`CS`).
    pub fn set_stroke_color_space(&mut self, space: Arc<ColorSpace>) {
        self.stroke_color = space.initial_color();
        self.stroke_color_space = space;
    }

    /// Select a non-stroking color space and its initial color (`cs`).
    pub fn set_fill_color_space(&mut self, space: Arc<ColorSpace>) {
        self.fill_color = space.initial_color();
        self.fill_color_space = space;
    }

    /// Apply the entries present in `ext` and remember it.
    pub fn apply_ext_gstate(&mut self, ext: &ExtGState) {
        if let Some(width) = ext.line_width {
            self.line_width = width;
        }
        if let Some(cap) = ext.line_cap {
            self.line_cap = cap;
        }
        if let Some(join) = ext.line_join {
            self.line_join = join;
        }
        if let Some(limit) = ext.miter_limit {
            self.miter_limit = limit;
        }
        if let Some(ref dash) = ext.dash {
            self.dash = dash.clone();
        }
        if let Some(ref intent) = ext.rendering_intent {
            self.rendering_intent = Some(intent.clone());
        }
        if let Some(flatness) = ext.flatness {
            self.flatness = flatness;
        }
        if let Some(alpha) = ext.stroke_alpha {
            self.stroke_alpha = alpha;
        }
        if let Some(alpha) = ext.fill_alpha {
            self.fill_alpha = alpha;
        }
        if let Some(size) = ext.font_size {
            self.text.set_font_size(size);
        }
        self.ext_state = Some(Box::new(ext.clone()));
    }
}

/// The current graphics state plus the LIFO of saved states.
#[derive(Debug, Clone)]
pub struct GraphicsStateStack {
    current: GraphicsState,
    saved: Vec<GraphicsState>,
    max_depth: usize,
}

impl Default for GraphicsStateStack {
    fn default() -> Self {
        Self::new(GraphicsState::default(), DEFAULT_MAX_STACK_DEPTH)
    }
}

impl GraphicsStateStack {
    pub fn new(initial: GraphicsState, max_depth: usize) -> Self {
        Self {
            current: initial,
            saved: Vec::new(),
            max_depth,
        }
    }

    pub fn current(&self) -> &GraphicsState {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut GraphicsState {
        &mut self.current
    }

    /// Number of saved states.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// `q` operator: push a copy of the current state.
    pub fn save(&mut self) -> Result<(), StateStackError> {
        if self.saved.len() >= self.max_depth {
            return Err(StateStackError::Overflow {
                limit: self.max_depth,
            });
        }
        self.saved.push(self.current.clone());
        Ok(())
    }

    /// `Q` operator: make the most recently saved state current again.
    pub fn restore(&mut self) -> Result<(), StateStackError> {
        let saved = self.saved.pop().ok_or(StateStackError::Underflow)?;
        self.current = saved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::matrix;

    // --- GraphicsState ---

    #[test]
    fn default_state_values() {
        let gs = GraphicsState::default();
        assert_eq!(gs.line_width, 1.0);
        assert_eq!(gs.miter_limit, 10.0);
        assert_eq!(*gs.fill_color_space, ColorSpace::DeviceGray);
        assert_eq!(gs.fill_color, Color::black());
        assert!(gs.clip.is_unbounded());
        assert!(gs.ext_state.is_none());
    }

    #[test]
    fn selecting_color_space_installs_initial_color() {
        let mut gs = GraphicsState::default();
        gs.set_stroke_color_space(Arc::new(ColorSpace::DeviceCmyk));
        assert_eq!(&*gs.stroke_color.components, &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(gs.stroke_color_space.family(), "DeviceCMYK");
    }

    #[test]
    fn ext_gstate_overrides_present_entries_only() {
        let mut gs = GraphicsState::default();
        gs.line_join = LineJoin::Round;
        let ext = ExtGState {
            line_width: Some(3.0),
            fill_alpha: Some(0.5),
            font_size: Some(14.0),
            ..ExtGState::default()
        };
        gs.apply_ext_gstate(&ext);
        assert_eq!(gs.line_width, 3.0);
        assert_eq!(gs.fill_alpha, 0.5);
        assert_eq!(gs.stroke_alpha, 1.0);
        assert_eq!(gs.line_join, LineJoin::Round);
        assert_eq!(gs.text.font_size(), 14.0);
        assert_eq!(gs.ext_state.as_deref(), Some(&ext));
    }

    // --- Stack ---

    #[test]
    fn save_restore_round_trips_state() {
        let mut stack = GraphicsStateStack::default();
        stack.current_mut().line_width = 2.0;
        let before = stack.current().clone();

        stack.save().unwrap();
        let gs = stack.current_mut();
        gs.ctm = matrix(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        gs.line_width = 9.0;
        gs.text.set_char_spacing(3.0);
        gs.apply_ext_gstate(&ExtGState {
            stroke_alpha: Some(0.1),
            ..ExtGState::default()
        });
        stack.restore().unwrap();

        assert_eq!(stack.current(), &before);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn saved_copy_owns_its_ext_state() {
        let mut stack = GraphicsStateStack::default();
        stack.current_mut().apply_ext_gstate(&ExtGState {
            line_width: Some(4.0),
            ..ExtGState::default()
        });
        stack.save().unwrap();
        if let Some(ext) = stack.current_mut().ext_state.as_mut() {
            ext.line_width = Some(8.0);
        }
        stack.restore().unwrap();
        assert_eq!(stack.current().ext_state.as_ref().and_then(|e| e.line_width), Some(4.0));
    }

    #[test]
    fn overflow_at_configured_limit() {
        let mut stack = GraphicsStateStack::default();
        for _ in 0..DEFAULT_MAX_STACK_DEPTH {
            stack.save().unwrap();
        }
        assert_eq!(
            stack.save(),
            Err(StateStackError::Overflow { limit: 500 })
        );
        assert_eq!(stack.depth(), 500);
    }

    #[test]
    fn underflow_on_empty_stack() {
        let mut stack = GraphicsStateStack::default();
        assert_eq!(stack.restore(), Err(StateStackError::Underflow));
    }

    #[test]
    fn custom_limit() {
        let mut stack = GraphicsStateStack::new(GraphicsState::default(), 2);
        stack.save().unwrap();
        stack.save().unwrap();
        assert!(stack.save().is_err());
        assert_eq!(stack.max_depth(), 2);
    }
}
