//! Path-under-construction for the `m l c v y h re` operators.
//!
//! Points are transformed through the CTM as they are appended, so the
//! accumulated [`BezPath`] is always in device space and a later `cm` inside
//! the same path does not move segments that were already built.

use crate::geometry::{Affine, BezPath, Point};

/// Accumulates path segments between path-ending operators.
///
/// Besides the shape itself the accumulator tracks whether the path is
/// *degenerate*: nothing has been drawn yet, or the only primitive is a
/// rectangle whose width or height lies within `[-1, 1]`. Filling such a path
/// alone would paint nothing visible, so devices give it a hairline instead.
#[derive(Debug, Clone)]
pub struct PathAccumulator {
    path: BezPath,
    current_point: Option<Point>,
    subpath_start: Option<Point>,
    ctm: Affine,
    primitives: usize,
    thin_first_rect: bool,
}

impl PathAccumulator {
    /// Create an empty accumulator mapping through `ctm`.
    pub fn new(ctm: Affine) -> Self {
        Self {
            path: BezPath::new(),
            current_point: None,
            subpath_start: None,
            ctm,
            primitives: 0,
            thin_first_rect: false,
        }
    }

    /// Update the transform used for subsequently appended points.
    pub fn set_ctm(&mut self, ctm: Affine) {
        self.ctm = ctm;
    }

    pub fn ctm(&self) -> Affine {
        self.ctm
    }

    /// `m` operator: begin a new subpath at `(x, y)`.
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.note_primitive(false);
        self.push_move(x, y);
    }

    /// `l` operator: straight line from the current point to `(x, y)`.
    pub fn line_to(&mut self, x: f64, y: f64) {
        self.note_primitive(false);
        self.push_line(x, y);
    }

    /// `c` operator: cubic Bezier with two explicit control points.
    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        self.note_primitive(false);
        let cp1 = self.map(x1, y1);
        let cp2 = self.map(x2, y2);
        let end = self.map(x3, y3);
        self.path.curve_to(cp1, cp2, end);
        self.current_point = Some(end);
    }

    /// `v` operator: the first control point is the current point.
    ///
    /// Does nothing when there is no current point.
    pub fn curve_to_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) {
        let Some(cp1) = self.current_point else {
            return;
        };
        self.note_primitive(false);
        let cp2 = self.map(x2, y2);
        let end = self.map(x3, y3);
        self.path.curve_to(cp1, cp2, end);
        self.current_point = Some(end);
    }

    /// `y` operator: the second control point is the end point.
    pub fn curve_to_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) {
        self.note_primitive(false);
        let cp1 = self.map(x1, y1);
        let end = self.map(x3, y3);
        self.path.curve_to(cp1, end, end);
        self.current_point = Some(end);
    }

    /// `h` operator: close the current subpath; the pen returns to its start.
    pub fn close_path(&mut self) {
        if self.path.elements().is_empty() {
            return;
        }
        self.path.close_path();
        if let Some(start) = self.subpath_start {
            self.current_point = Some(start);
        }
    }

    /// `re` operator: `x y m`, three `l`, then `h`, counted as one primitive.
    pub fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.note_primitive(width.abs() <= 1.0 || height.abs() <= 1.0);
        self.push_move(x, y);
        self.push_line(x + width, y);
        self.push_line(x + width, y + height);
        self.push_line(x, y + height);
        self.close_path();
    }

    /// Current point in device space.
    pub fn current_point(&self) -> Option<Point> {
        self.current_point
    }

    pub fn is_empty(&self) -> bool {
        self.path.elements().is_empty()
    }

    /// Whether the path is still a single hairline-thin primitive (or nothing).
    pub fn is_degenerate(&self) -> bool {
        self.primitives == 0 || (self.primitives == 1 && self.thin_first_rect)
    }

    /// The accumulated device-space path.
    pub fn path(&self) -> &BezPath {
        &self.path
    }

    /// Hand out the accumulated path and reset to empty/degenerate.
    pub fn take(&mut self) -> BezPath {
        self.current_point = None;
        self.subpath_start = None;
        self.primitives = 0;
        self.thin_first_rect = false;
        std::mem::take(&mut self.path)
    }

    fn note_primitive(&mut self, thin_rect: bool) {
        if self.primitives == 0 {
            self.thin_first_rect = thin_rect;
        }
        self.primitives += 1;
    }

    fn push_move(&mut self, x: f64, y: f64) {
        let p = self.map(x, y);
        self.path.move_to(p);
        self.current_point = Some(p);
        self.subpath_start = Some(p);
    }

    fn push_line(&mut self, x: f64, y: f64) {
        let p = self.map(x, y);
        self.path.line_to(p);
        self.current_point = Some(p);
    }

    fn map(&self, x: f64, y: f64) -> Point {
        self.ctm * Point::new(x, y)
    }
}

impl Default for PathAccumulator {
    fn default() -> Self {
        Self::new(Affine::IDENTITY)
    }
}
