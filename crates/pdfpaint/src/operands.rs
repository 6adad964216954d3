//! Typed access to operation operands.
//!
//! A missing or mistyped operand yields a `MalformedOperands` warning so the
//! loop skips the operator instead of failing the whole content stream.

use lopdf::{Dictionary, Object};
use pdfpaint_core::WarningCode;
use pdfpaint_core::geometry::{Affine, matrix};

use crate::error::Signal;
use crate::operation::Operation;

/// Numeric value of an integer or real object.
pub fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

/// Name bytes as UTF-8 text (lossy for non-UTF-8 names).
pub fn object_to_name(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn malformed(op: &Operation, expected: &str) -> Signal {
    Signal::warning(
        WarningCode::MalformedOperands,
        format!("'{}' expects {expected}, got {} operand(s)", op.operator, op.operands.len()),
    )
}

pub(crate) fn number(op: &Operation, index: usize) -> Result<f64, Signal> {
    op.operands
        .get(index)
        .and_then(object_to_f64)
        .ok_or_else(|| malformed(op, &format!("a number at position {index}")))
}

/// The first `N` operands as numbers.
pub(crate) fn numbers<const N: usize>(op: &Operation) -> Result<[f64; N], Signal> {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = op
            .operands
            .get(i)
            .and_then(object_to_f64)
            .ok_or_else(|| malformed(op, &format!("{N} numbers")))?;
    }
    Ok(out)
}

/// Color components: the leading numeric operands, stopping at the first
/// non-number (a pattern name for `SCN`/`scn`).
pub(crate) fn components(op: &Operation) -> Vec<f32> {
    op.operands
        .iter()
        .map_while(object_to_f64)
        .map(|v| v as f32)
        .collect()
}

pub(crate) fn integer(op: &Operation, index: usize) -> Result<i64, Signal> {
    match op.operands.get(index) {
        Some(Object::Integer(i)) => Ok(*i),
        Some(Object::Real(f)) if f.fract() == 0.0 => Ok(*f as i64),
        _ => Err(malformed(op, &format!("an integer at position {index}"))),
    }
}

pub(crate) fn name(op: &Operation, index: usize) -> Result<String, Signal> {
    op.operands
        .get(index)
        .and_then(object_to_name)
        .ok_or_else(|| malformed(op, &format!("a name at position {index}")))
}

/// Last operand as a name, if it is one (`SCN`/`scn` pattern names).
pub(crate) fn trailing_name(op: &Operation) -> Option<String> {
    op.operands.last().and_then(object_to_name)
}

pub(crate) fn string(op: &Operation, index: usize) -> Result<&[u8], Signal> {
    match op.operands.get(index) {
        Some(Object::String(bytes, _)) => Ok(bytes),
        _ => Err(malformed(op, &format!("a string at position {index}"))),
    }
}

pub(crate) fn array(op: &Operation, index: usize) -> Result<&[Object], Signal> {
    match op.operands.get(index) {
        Some(Object::Array(items)) => Ok(items),
        _ => Err(malformed(op, &format!("an array at position {index}"))),
    }
}

/// Inline dictionary operand (`BDC`, `DP`).
pub(crate) fn dictionary(op: &Operation, index: usize) -> Option<&Dictionary> {
    match op.operands.get(index) {
        Some(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    }
}

/// Six numbers forming a matrix (`cm`, `Tm`).
pub(crate) fn affine(op: &Operation) -> Result<Affine, Signal> {
    let [a, b, c, d, e, f] = numbers::<6>(op)?;
    Ok(matrix(a, b, c, d, e, f))
}

/// A matrix from a six-element array object (`/Matrix` entries).
pub fn array_to_affine(items: &[Object]) -> Option<Affine> {
    if items.len() != 6 {
        return None;
    }
    let v: Vec<f64> = items.iter().map(object_to_f64).collect::<Option<_>>()?;
    Some(matrix(v[0], v[1], v[2], v[3], v[4], v[5]))
}
