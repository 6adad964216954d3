//! Resource scopes and the resolved objects they hand to devices.
//!
//! The interpreter never looks inside a resource dictionary itself: it asks a
//! [`Resources`] implementation for a named object and forwards whatever comes
//! back. [`LopdfResources`](crate::LopdfResources) is the document-backed
//! implementation; tests and synthetic content use [`NoResources`] or their
//! own maps.

use std::fmt;
use std::sync::Arc;

use lopdf::{Dictionary, Object};
use pdfpaint_core::geometry::{Affine, Rect};
use pdfpaint_core::{ColorSpace, ExtGState, Font};
use thiserror::Error;

use crate::content::ContentError;
use crate::operands::{array_to_affine, object_to_f64, object_to_name};
use crate::operation::Operation;

/// Failure to turn a present resource entry into a usable object.
///
/// Absence is not an error: lookups return `Ok(None)` for unknown names.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The entry exists but does not have the required structure.
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },

    /// A form's content stream could not be tokenized.
    #[error("invalid content stream: {0}")]
    Content(#[from] ContentError),

    /// The document layer failed (dangling reference, bad stream filter).
    #[error(transparent)]
    Lopdf(#[from] lopdf::Error),
}

impl ResolveError {
    pub(crate) fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        ResolveError::Malformed {
            what,
            detail: detail.into(),
        }
    }
}

/// Named lookup of everything a content stream can reference.
///
/// Every method defaults to "not present", so an implementation only
/// overrides the categories it can supply.
pub trait Resources: fmt::Debug {
    fn color_space(&self, _name: &str) -> Result<Option<ColorSpace>, ResolveError> {
        Ok(None)
    }

    fn font(&self, _name: &str) -> Result<Option<Arc<dyn Font>>, ResolveError> {
        Ok(None)
    }

    fn pattern(&self, _name: &str) -> Result<Option<Pattern>, ResolveError> {
        Ok(None)
    }

    fn shading(&self, _name: &str) -> Result<Option<Shading>, ResolveError> {
        Ok(None)
    }

    fn ext_gstate(&self, _name: &str) -> Result<Option<ExtGState>, ResolveError> {
        Ok(None)
    }

    /// Property list referenced by `BDC`/`DP`.
    fn properties(&self, _name: &str) -> Result<Option<Dictionary>, ResolveError> {
        Ok(None)
    }

    fn xobject(&self, _name: &str) -> Result<Option<XObject>, ResolveError> {
        Ok(None)
    }
}

/// The empty resource scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

impl Resources for NoResources {}

/// A tiling (type 1) or shading (type 2) pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub pattern_type: i64,
    /// Pattern space to default user space of the parent content.
    pub matrix: Affine,
    pub dict: Dictionary,
}

/// A shading dictionary (`sh` operand or shading pattern).
#[derive(Debug, Clone)]
pub struct Shading {
    pub shading_type: i64,
    pub color_space: Option<ColorSpace>,
    pub dict: Dictionary,
}

/// A resolved `Do` target.
#[derive(Debug, Clone)]
pub enum XObject {
    Form(FormXObject),
    Image(ImageXObject),
    /// PostScript XObjects are recognized and never executed.
    PostScript,
}

/// A form XObject, ready to be interpreted.
#[derive(Debug, Clone)]
pub struct FormXObject {
    /// Form space to user space of the invoking content.
    pub matrix: Affine,
    pub bbox: Option<Rect>,
    pub content: Arc<[Operation]>,
    /// The form's own `/Resources`. `None` inherits the caller's scope.
    pub resources: Option<Arc<dyn Resources>>,
}

/// An image XObject header; pixel data stays with the document.
#[derive(Debug, Clone)]
pub struct ImageXObject {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: Option<u32>,
    pub color_space: Option<ColorSpace>,
    pub image_mask: bool,
    pub dict: Dictionary,
}

/// An inline image (`BI ... ID ... EI`) with abbreviated keys expanded.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: Option<u32>,
    /// Device or array color space given in the image itself.
    pub color_space: Option<ColorSpace>,
    /// Color space given by resource name, resolved at draw time.
    pub color_space_name: Option<String>,
    /// Filter chain with full filter names.
    pub filters: Vec<String>,
    pub decode: Option<Vec<f64>>,
    pub image_mask: bool,
    pub interpolate: bool,
    /// The entries with full key names.
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

fn expand_key(key: &[u8]) -> &[u8] {
    match key {
        b"BPC" => b"BitsPerComponent",
        b"CS" => b"ColorSpace",
        b"D" => b"Decode",
        b"DP" => b"DecodeParms",
        b"F" => b"Filter",
        b"H" => b"Height",
        b"IM" => b"ImageMask",
        b"I" => b"Interpolate",
        b"L" => b"Length",
        b"W" => b"Width",
        other => other,
    }
}

fn expand_color_space_name(name: &str) -> &str {
    match name {
        "G" => "DeviceGray",
        "RGB" => "DeviceRGB",
        "CMYK" => "DeviceCMYK",
        "I" => "Indexed",
        other => other,
    }
}

fn expand_filter_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, ResolveError> {
    let value = dict
        .get(key)
        .ok()
        .and_then(object_to_f64)
        .ok_or_else(|| {
            ResolveError::malformed(
                "inline image",
                format!("missing /{}", String::from_utf8_lossy(key)),
            )
        })?;
    if value < 0.0 {
        return Err(ResolveError::malformed(
            "inline image",
            format!("negative /{}", String::from_utf8_lossy(key)),
        ));
    }
    Ok(value as u32)
}

impl InlineImage {
    /// Build from the `[dictionary, data]` operands the tokenizer produces
    /// for `BI`.
    ///
    /// # Errors
    ///
    /// Fails when the operands have another shape or the width or height is
    /// missing.
    pub fn from_operands(operands: &[Object]) -> Result<Self, ResolveError> {
        let (Some(Object::Dictionary(abbreviated)), Some(Object::String(data, _))) =
            (operands.first(), operands.get(1))
        else {
            return Err(ResolveError::malformed(
                "inline image",
                "expected dictionary and data operands",
            ));
        };

        let mut dict = Dictionary::new();
        for (key, value) in abbreviated.iter() {
            dict.set(expand_key(key).to_vec(), value.clone());
        }

        let width = dimension(&dict, b"Width")?;
        let height = dimension(&dict, b"Height")?;
        let bits_per_component = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(object_to_f64)
            .map(|v| v as u32);
        let flag = |key: &[u8]| matches!(dict.get(key), Ok(Object::Boolean(true)));
        let image_mask = flag(b"ImageMask");
        let interpolate = flag(b"Interpolate");

        let mut color_space = None;
        let mut color_space_name = None;
        match dict.get(b"ColorSpace").ok() {
            Some(Object::Name(raw)) => {
                let name = String::from_utf8_lossy(raw);
                let name = expand_color_space_name(&name);
                match ColorSpace::from_device_name(name) {
                    Some(space) => color_space = Some(space),
                    None => color_space_name = Some(name.to_string()),
                }
            }
            Some(obj @ Object::Array(_)) => {
                color_space = Some(crate::lopdf_resources::color_space_from_object(None, obj)?);
            }
            _ => {}
        }

        let filters = match dict.get(b"Filter").ok() {
            Some(Object::Name(raw)) => {
                vec![expand_filter_name(&String::from_utf8_lossy(raw)).to_string()]
            }
            Some(Object::Array(items)) => items
                .iter()
                .filter_map(object_to_name)
                .map(|name| expand_filter_name(&name).to_string())
                .collect(),
            _ => Vec::new(),
        };

        let decode = match dict.get(b"Decode").ok() {
            Some(Object::Array(items)) => Some(items.iter().filter_map(object_to_f64).collect()),
            _ => None,
        };

        Ok(Self {
            width,
            height,
            bits_per_component,
            color_space,
            color_space_name,
            filters,
            decode,
            image_mask,
            interpolate,
            dict,
            data: data.clone(),
        })
    }

    /// Decode `op`'s operands once and memoize the result in its cache slot.
    pub fn cached(op: &Operation) -> Result<&InlineImage, ResolveError> {
        let cached = op.cached(|| Self::from_operands(&op.operands).map_err(|e| e.to_string()));
        match cached {
            Some(Ok(image)) => Ok(image),
            Some(Err(detail)) => Err(ResolveError::malformed("inline image", detail.clone())),
            None => Err(ResolveError::malformed(
                "inline image",
                "operation cache holds a value of another type",
            )),
        }
    }
}

/// `/Matrix` of a form or pattern dictionary, identity when absent.
pub(crate) fn dict_matrix(dict: &Dictionary) -> Affine {
    match dict.get(b"Matrix") {
        Ok(Object::Array(items)) => array_to_affine(items).unwrap_or(Affine::IDENTITY),
        _ => Affine::IDENTITY,
    }
}

/// `/BBox` of a form dictionary, normalized.
pub(crate) fn dict_bbox(dict: &Dictionary) -> Option<Rect> {
    let Ok(Object::Array(items)) = dict.get(b"BBox") else {
        return None;
    };
    let values: Vec<f64> = items.iter().filter_map(object_to_f64).collect();
    match values[..] {
        [x0, y0, x1, y1] => Some(Rect::new(x0, y0, x1, y1).abs()),
        _ => None,
    }
}
