//! Affine helpers bridging PDF's six-number matrices and `kurbo`.
//!
//! PDF writes a matrix as `[a b c d e f]` and composes transforms with row
//! vectors (`p' = p × M × CTM`). `kurbo::Affine` stores the same six
//! coefficients in the same order but composes with column vectors, so the
//! PDF product `M × CTM` becomes `ctm * m` here. Every place that concatenates
//! matrices goes through [`premultiply`] to keep that ordering in one spot.

pub use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape, Vec2};

/// Build a transform from the six PDF matrix operands `a b c d e f`.
pub fn matrix(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Affine {
    Affine::new([a, b, c, d, e, f])
}

/// Compute the PDF product `m × base`: apply `m` first, then `base`.
pub fn premultiply(m: Affine, base: Affine) -> Affine {
    base * m
}

/// A pure translation by `(tx, ty)`.
pub fn translation(tx: f64, ty: f64) -> Affine {
    Affine::translate((tx, ty))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_point_approx(p: Point, x: f64, y: f64) {
        assert!((p.x - x).abs() < 1e-10, "x: expected {x}, got {}", p.x);
        assert!((p.y - y).abs() < 1e-10, "y: expected {y}, got {}", p.y);
    }

    #[test]
    fn matrix_keeps_pdf_coefficient_order() {
        let m = matrix(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(m.as_coeffs(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn matrix_maps_points_like_pdf_row_vectors() {
        // x' = a*x + c*y + e, y' = b*x + d*y + f
        let m = matrix(2.0, 0.5, 0.25, 3.0, 10.0, 20.0);
        let p = m * Point::new(1.0, 2.0);
        assert_point_approx(p, 2.0 + 0.5 + 10.0, 0.5 + 6.0 + 20.0);
    }

    #[test]
    fn premultiply_applies_operand_first() {
        // scale then translate: M = scale(2), CTM = translate(10, 10)
        let m = matrix(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let ctm = translation(10.0, 10.0);
        let combined = premultiply(m, ctm);
        assert_point_approx(combined * Point::new(1.0, 1.0), 12.0, 12.0);
    }

    #[test]
    fn premultiply_is_not_commutative() {
        let m = matrix(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let ctm = translation(10.0, 10.0);
        let swapped = premultiply(ctm, m);
        assert_point_approx(swapped * Point::new(1.0, 1.0), 22.0, 22.0);
    }
}
