//! Painting and stroke-style types shared by the graphics state and devices.

use std::sync::Arc;

/// Fill rule for path painting and clipping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FillRule {
    /// Nonzero winding number rule (default).
    #[default]
    NonZeroWinding,
    /// Even-odd rule.
    EvenOdd,
}

impl FillRule {
    /// Short name used in traces.
    pub fn as_str(self) -> &'static str {
        match self {
            FillRule::NonZeroWinding => "nonzero",
            FillRule::EvenOdd => "evenodd",
        }
    }
}

/// Line cap style (`J` operator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    ProjectingSquare,
}

impl LineCap {
    /// Map the integer operand of `J`. Returns `None` for out-of-range values.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(LineCap::Butt),
            1 => Some(LineCap::Round),
            2 => Some(LineCap::ProjectingSquare),
            _ => None,
        }
    }
}

/// Line join style (`j` operator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    /// Map the integer operand of `j`. Returns `None` for out-of-range values.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(LineJoin::Miter),
            1 => Some(LineJoin::Round),
            2 => Some(LineJoin::Bevel),
            _ => None,
        }
    }
}

/// Dash pattern (`d` operator).
///
/// The dash array is replaced wholesale by `d` and never edited in place,
/// so saved states share it.
#[derive(Debug, Clone, PartialEq)]
pub struct DashPattern {
    /// Alternating dash and gap lengths in user space. Empty means solid.
    pub array: Arc<[f64]>,
    /// Offset into the pattern at which the dash starts.
    pub phase: f64,
}

impl DashPattern {
    pub fn new(array: Vec<f64>, phase: f64) -> Self {
        Self {
            array: array.into(),
            phase,
        }
    }

    /// A solid line: `[] 0 d`.
    pub fn solid() -> Self {
        Self::new(Vec::new(), 0.0)
    }

    pub fn is_solid(&self) -> bool {
        self.array.is_empty()
    }
}

impl Default for DashPattern {
    fn default() -> Self {
        Self::solid()
    }
}

/// What a path-painting operator does with the accumulated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintOp {
    /// `S`, `s`
    Stroke,
    /// `f`, `F`, `f*`
    Fill(FillRule),
    /// `B`, `B*`, `b`, `b*`
    FillStroke(FillRule),
    /// `n`
    NoPaint,
}

impl PaintOp {
    pub fn fills(self) -> bool {
        matches!(self, PaintOp::Fill(_) | PaintOp::FillStroke(_))
    }

    pub fn strokes(self) -> bool {
        matches!(self, PaintOp::Stroke | PaintOp::FillStroke(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rule_default_is_nonzero() {
        assert_eq!(FillRule::default(), FillRule::NonZeroWinding);
        assert_eq!(FillRule::EvenOdd.as_str(), "evenodd");
    }

    #[test]
    fn line_cap_and_join_from_operands() {
        assert_eq!(LineCap::from_i64(1), Some(LineCap::Round));
        assert_eq!(LineCap::from_i64(3), None);
        assert_eq!(LineJoin::from_i64(2), Some(LineJoin::Bevel));
        assert_eq!(LineJoin::from_i64(-1), None);
    }

    #[test]
    fn dash_pattern_clone_shares_array() {
        let dash = DashPattern::new(vec![3.0, 1.0], 0.5);
        let copy = dash.clone();
        assert!(Arc::ptr_eq(&dash.array, &copy.array));
        assert!(!dash.is_solid());
        assert!(DashPattern::default().is_solid());
    }

    #[test]
    fn paint_op_classification() {
        assert!(PaintOp::Fill(FillRule::EvenOdd).fills());
        assert!(!PaintOp::Fill(FillRule::EvenOdd).strokes());
        assert!(PaintOp::FillStroke(FillRule::NonZeroWinding).strokes());
        assert!(!PaintOp::NoPaint.fills());
    }
}
