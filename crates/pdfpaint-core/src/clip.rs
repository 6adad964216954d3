//! Clipping region kept in device space.
//!
//! The region is the intersection of every path installed by `W`/`W*` since
//! the state was created. Paths are stored as given (already mapped into
//! device space when they were built), so a later `cm` leaves the region
//! where it is on the page. Exact path intersection is left to whoever
//! rasterizes; the region tracks a conservative bounding box for quick
//! rejection and collapses to [`ClipRegion::Empty`] once that box is empty.

use crate::geometry::{BezPath, Rect, Shape};
use crate::painting::FillRule;

/// One clipping path and the rule that defines its interior.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPath {
    pub path: BezPath,
    pub rule: FillRule,
}

/// Current clipping region.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ClipRegion {
    /// No clip installed: everything is visible.
    #[default]
    Unbounded,
    /// Nothing is visible.
    Empty,
    /// Intersection of the listed paths, with the intersection of their
    /// bounding boxes.
    Paths { paths: Vec<ClipPath>, bounds: Rect },
}

impl ClipRegion {
    /// Intersect the region with `path` under `rule`.
    ///
    /// With no region yet the path is taken unmodified.
    pub fn intersect(&self, path: BezPath, rule: FillRule) -> ClipRegion {
        let path_bounds = path.bounding_box();
        if path.elements().is_empty() {
            return ClipRegion::Empty;
        }
        match self {
            ClipRegion::Empty => ClipRegion::Empty,
            ClipRegion::Unbounded => ClipRegion::Paths {
                paths: vec![ClipPath { path, rule }],
                bounds: path_bounds,
            },
            ClipRegion::Paths { paths, bounds } => {
                let Some(bounds) = overlap(*bounds, path_bounds) else {
                    return ClipRegion::Empty;
                };
                let mut paths = paths.clone();
                paths.push(ClipPath { path, rule });
                ClipRegion::Paths { paths, bounds }
            }
        }
    }

    /// Bounding box of the visible area; `None` when unbounded.
    pub fn bounds(&self) -> Option<Rect> {
        match self {
            ClipRegion::Unbounded => None,
            ClipRegion::Empty => Some(Rect::ZERO),
            ClipRegion::Paths { bounds, .. } => Some(*bounds),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ClipRegion::Empty)
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, ClipRegion::Unbounded)
    }

    /// Installed clip paths, innermost last.
    pub fn paths(&self) -> &[ClipPath] {
        match self {
            ClipRegion::Paths { paths, .. } => paths,
            _ => &[],
        }
    }
}

// Touching edges still count as overlap: a hairline clip keeps hairlines.
fn overlap(a: Rect, b: Rect) -> Option<Rect> {
    let x0 = a.x0.max(b.x0);
    let y0 = a.y0.max(b.y0);
    let x1 = a.x1.min(b.x1);
    let y1 = a.y1.min(b.y1);
    (x1 >= x0 && y1 >= y0).then(|| Rect::new(x0, y0, x1, y1))
}
