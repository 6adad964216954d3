//! [`Resources`] backed by a `lopdf` resource dictionary.

use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, Stream};
use pdfpaint_core::{
    ColorSpace, CompositeFont, DashPattern, ExtGState, Font, LineCap, LineJoin, SimpleFont,
};

use crate::content::tokenize;
use crate::operands::{object_to_f64, object_to_name};
use crate::resources::{
    FormXObject, ImageXObject, Pattern, ResolveError, Resources, Shading, XObject, dict_bbox,
    dict_matrix,
};

/// Longest chain of indirect references followed before giving up.
const MAX_REFERENCE_CHAIN: usize = 32;

/// A resource scope reading from a `/Resources` dictionary of a lopdf document.
#[derive(Debug, Clone)]
pub struct LopdfResources {
    doc: Arc<Document>,
    dict: Dictionary,
}

impl LopdfResources {
    pub fn new(doc: Arc<Document>, dict: Dictionary) -> Self {
        Self { doc, dict }
    }

    /// Build from a `/Resources` value, following an indirect reference.
    ///
    /// # Errors
    ///
    /// Fails when the value does not resolve to a dictionary.
    pub fn from_object(doc: Arc<Document>, obj: &Object) -> Result<Self, ResolveError> {
        let dict = deref(&doc, obj)?
            .as_dict()
            .map_err(|_| ResolveError::malformed("resources", "not a dictionary"))?
            .clone();
        Ok(Self { doc, dict })
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// The dereferenced entry `/category /name`, if present.
    fn entry(&self, category: &[u8], name: &str) -> Result<Option<&Object>, ResolveError> {
        let Ok(sub) = self.dict.get(category) else {
            return Ok(None);
        };
        let sub = deref(&self.doc, sub)?.as_dict().map_err(|_| {
            ResolveError::malformed(
                "resources",
                format!("/{} is not a dictionary", String::from_utf8_lossy(category)),
            )
        })?;
        match sub.get(name.as_bytes()) {
            Ok(obj) => deref(&self.doc, obj).map(Some),
            Err(_) => Ok(None),
        }
    }
}

/// Follow indirect references to the underlying object.
pub(crate) fn deref<'a>(doc: &'a Document, mut obj: &'a Object) -> Result<&'a Object, ResolveError> {
    for _ in 0..MAX_REFERENCE_CHAIN {
        match obj {
            Object::Reference(id) => obj = doc.get_object(*id)?,
            _ => return Ok(obj),
        }
    }
    Err(ResolveError::malformed("reference", "reference chain too long"))
}

fn deref_opt<'a>(doc: Option<&'a Document>, obj: &'a Object) -> Result<&'a Object, ResolveError> {
    match (doc, obj) {
        (Some(doc), _) => deref(doc, obj),
        (None, Object::Reference(_)) => Err(ResolveError::malformed(
            "reference",
            "indirect object outside a document",
        )),
        (None, _) => Ok(obj),
    }
}

pub(crate) fn stream_bytes(stream: &Stream) -> Result<Vec<u8>, ResolveError> {
    if stream.dict.get(b"Filter").is_ok() {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

fn number(dict: &Dictionary, key: &[u8]) -> Option<f64> {
    dict.get(key).ok().and_then(object_to_f64)
}

// --- Color spaces ---

/// Resolve a color space value: a family name or a parameterized array.
///
/// Without a document, indirect references cannot be followed; inline
/// images resolve their array color spaces this way.
///
/// # Errors
///
/// Fails for unknown families and arrays missing required entries.
pub fn color_space_from_object(
    doc: Option<&Document>,
    obj: &Object,
) -> Result<ColorSpace, ResolveError> {
    let obj = deref_opt(doc, obj)?;
    match obj {
        Object::Name(raw) => {
            let name = String::from_utf8_lossy(raw);
            family_without_parameters(&name).ok_or_else(|| {
                ResolveError::malformed("color space", format!("unknown family /{name}"))
            })
        }
        Object::Array(items) => color_space_from_array(doc, items),
        _ => Err(ResolveError::malformed(
            "color space",
            "expected a name or an array",
        )),
    }
}

fn family_without_parameters(name: &str) -> Option<ColorSpace> {
    match name {
        "CalGray" => Some(ColorSpace::CalGray),
        "CalRGB" => Some(ColorSpace::CalRgb),
        "Lab" => Some(ColorSpace::Lab),
        other => ColorSpace::from_device_name(other),
    }
}

fn color_space_from_array(
    doc: Option<&Document>,
    items: &[Object],
) -> Result<ColorSpace, ResolveError> {
    let family = items
        .first()
        .and_then(object_to_name)
        .ok_or_else(|| ResolveError::malformed("color space", "array without a family name"))?;
    let operand = |index: usize| {
        items.get(index).ok_or_else(|| {
            ResolveError::malformed("color space", format!("/{family} needs {} entries", index + 1))
        })
    };

    match family.as_str() {
        "ICCBased" => {
            let stream = deref_opt(doc, operand(1)?)?
                .as_stream()
                .map_err(|_| ResolveError::malformed("color space", "ICC profile is not a stream"))?;
            let components = number(&stream.dict, b"N").map_or(3, |n| n as usize);
            let alternate = match stream.dict.get(b"Alternate") {
                Ok(alt) => color_space_from_object(doc, alt)?,
                Err(_) => ColorSpace::from_component_count(components).unwrap_or(ColorSpace::DeviceRgb),
            };
            Ok(ColorSpace::IccBased {
                components,
                alternate: Box::new(alternate),
            })
        }
        "Indexed" | "I" => {
            let base = color_space_from_object(doc, operand(1)?)?;
            let hival = object_to_f64(deref_opt(doc, operand(2)?)?)
                .ok_or_else(|| ResolveError::malformed("color space", "Indexed hival is not a number"))?;
            let lookup = match deref_opt(doc, operand(3)?)? {
                Object::String(bytes, _) => bytes.clone(),
                Object::Stream(stream) => stream_bytes(stream)?,
                _ => {
                    return Err(ResolveError::malformed(
                        "color space",
                        "Indexed lookup is neither a string nor a stream",
                    ));
                }
            };
            Ok(ColorSpace::Indexed {
                base: Box::new(base),
                hival: hival.clamp(0.0, 255.0) as u32,
                lookup: lookup.into(),
            })
        }
        "Separation" => {
            let colorant = object_to_name(operand(1)?).unwrap_or_default();
            let alternate = color_space_from_object(doc, operand(2)?)?;
            Ok(ColorSpace::Separation {
                colorant,
                alternate: Box::new(alternate),
            })
        }
        "DeviceN" => {
            let colorants = match deref_opt(doc, operand(1)?)? {
                Object::Array(names) => names.iter().filter_map(object_to_name).collect(),
                _ => {
                    return Err(ResolveError::malformed(
                        "color space",
                        "DeviceN colorants are not an array",
                    ));
                }
            };
            let alternate = color_space_from_object(doc, operand(2)?)?;
            Ok(ColorSpace::DeviceN {
                colorants,
                alternate: Box::new(alternate),
            })
        }
        "Pattern" => {
            let underlying = match items.get(1) {
                Some(base) => Some(Box::new(color_space_from_object(doc, base)?)),
                None => None,
            };
            Ok(ColorSpace::Pattern { underlying })
        }
        other => family_without_parameters(other).ok_or_else(|| {
            ResolveError::malformed("color space", format!("unknown family /{other}"))
        }),
    }
}

// --- Fonts ---

fn simple_font(doc: &Document, name: String, dict: &Dictionary) -> Result<SimpleFont, ResolveError> {
    let first_char = number(dict, b"FirstChar").map_or(0, |v| v.max(0.0) as u32);
    let mut widths: Vec<f64> = match dict.get(b"Widths") {
        Ok(obj) => match deref(doc, obj)? {
            Object::Array(items) => items
                .iter()
                .map(|item| deref(doc, item).ok().and_then(object_to_f64).unwrap_or(0.0))
                .collect(),
            _ => Vec::new(),
        },
        Err(_) => Vec::new(),
    };

    let missing_width = match dict.get(b"FontDescriptor") {
        Ok(obj) => deref(doc, obj)?
            .as_dict()
            .ok()
            .and_then(|desc| number(desc, b"MissingWidth"))
            .unwrap_or(0.0),
        Err(_) => 0.0,
    };

    // Type 3 widths are in glyph space; bring them to text space thousandths.
    if let Ok(Object::Array(matrix)) = dict.get(b"FontMatrix") {
        if let Some(scale) = matrix.first().and_then(object_to_f64) {
            for width in &mut widths {
                *width *= scale * 1000.0;
            }
        }
    }

    Ok(SimpleFont::new(name, first_char, widths, missing_width))
}

/// Flatten a CIDFont `/W` array into `(first, last, width)` ranges.
fn width_ranges(doc: &Document, items: &[Object]) -> Vec<(u32, u32, f64)> {
    let value = |obj: &Object| deref(doc, obj).ok().and_then(object_to_f64);
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < items.len() {
        let Some(start) = value(&items[i]) else {
            i += 1;
            continue;
        };
        let start = start.max(0.0) as u32;
        let Some(next) = items.get(i + 1) else {
            break;
        };
        match deref(doc, next) {
            Ok(Object::Array(widths)) => {
                for (offset, width) in widths.iter().enumerate() {
                    if let Some(width) = value(width) {
                        let cid = start + offset as u32;
                        ranges.push((cid, cid, width));
                    }
                }
                i += 2;
            }
            _ => {
                let end = value(next);
                let width = items.get(i + 2).and_then(value);
                if let (Some(end), Some(width)) = (end, width) {
                    ranges.push((start, end.max(0.0) as u32, width));
                }
                i += 3;
            }
        }
    }
    ranges
}

fn composite_font(
    doc: &Document,
    name: String,
    dict: &Dictionary,
) -> Result<CompositeFont, ResolveError> {
    let descendant = match dict.get(b"DescendantFonts") {
        Ok(obj) => match deref(doc, obj)? {
            Object::Array(items) => match items.first() {
                Some(first) => deref(doc, first)?.as_dict().ok(),
                None => None,
            },
            _ => None,
        },
        Err(_) => None,
    };
    let Some(descendant) = descendant else {
        return Ok(CompositeFont::new(name, 1000.0, Vec::new()));
    };

    let default_width = number(descendant, b"DW").unwrap_or(1000.0);
    let ranges = match descendant.get(b"W") {
        Ok(obj) => match deref(doc, obj)? {
            Object::Array(items) => width_ranges(doc, items),
            _ => Vec::new(),
        },
        Err(_) => Vec::new(),
    };
    Ok(CompositeFont::new(name, default_width, ranges))
}

// --- Extended graphics state ---

fn ext_gstate_from_dict(doc: &Document, dict: &Dictionary) -> Result<ExtGState, ResolveError> {
    let name = |key: &[u8]| dict.get(key).ok().and_then(object_to_name);
    let integer = |key: &[u8]| number(dict, key).map(|v| v as i64);

    let dash = match dict.get(b"D") {
        Ok(obj) => match deref(doc, obj)? {
            Object::Array(items) => match (items.first(), items.get(1)) {
                (Some(Object::Array(array)), Some(phase)) => Some(DashPattern::new(
                    array.iter().filter_map(object_to_f64).collect(),
                    object_to_f64(phase).unwrap_or(0.0),
                )),
                _ => None,
            },
            _ => None,
        },
        Err(_) => None,
    };

    let blend_mode = match dict.get(b"BM") {
        Ok(Object::Array(modes)) => modes.first().and_then(object_to_name),
        Ok(other) => object_to_name(other),
        Err(_) => None,
    };

    let font_size = match dict.get(b"Font") {
        Ok(Object::Array(items)) => items.get(1).and_then(object_to_f64),
        _ => None,
    };

    Ok(ExtGState {
        line_width: number(dict, b"LW"),
        line_cap: integer(b"LC").and_then(LineCap::from_i64),
        line_join: integer(b"LJ").and_then(LineJoin::from_i64),
        miter_limit: number(dict, b"ML"),
        dash,
        rendering_intent: name(b"RI"),
        flatness: number(dict, b"FL"),
        stroke_alpha: number(dict, b"CA"),
        fill_alpha: number(dict, b"ca"),
        blend_mode,
        stroke_adjustment: match dict.get(b"SA") {
            Ok(Object::Boolean(flag)) => Some(*flag),
            _ => None,
        },
        font_size,
    })
}

impl Resources for LopdfResources {
    fn color_space(&self, name: &str) -> Result<Option<ColorSpace>, ResolveError> {
        match self.entry(b"ColorSpace", name)? {
            Some(obj) => color_space_from_object(Some(&*self.doc), obj).map(Some),
            None => Ok(None),
        }
    }

    fn font(&self, name: &str) -> Result<Option<Arc<dyn Font>>, ResolveError> {
        let Some(obj) = self.entry(b"Font", name)? else {
            return Ok(None);
        };
        let dict = obj
            .as_dict()
            .map_err(|_| ResolveError::malformed("font", format!("/{name} is not a dictionary")))?;
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(object_to_name)
            .unwrap_or_else(|| name.to_string());

        let font: Arc<dyn Font> = match dict.get(b"Subtype").ok().and_then(object_to_name).as_deref() {
            Some("Type0") => Arc::new(composite_font(&self.doc, base_font, dict)?),
            _ => Arc::new(simple_font(&self.doc, base_font, dict)?),
        };
        Ok(Some(font))
    }

    fn pattern(&self, name: &str) -> Result<Option<Pattern>, ResolveError> {
        let Some(obj) = self.entry(b"Pattern", name)? else {
            return Ok(None);
        };
        let dict = match obj {
            Object::Stream(stream) => &stream.dict,
            Object::Dictionary(dict) => dict,
            _ => {
                return Err(ResolveError::malformed(
                    "pattern",
                    format!("/{name} is neither a stream nor a dictionary"),
                ));
            }
        };
        Ok(Some(Pattern {
            pattern_type: number(dict, b"PatternType").map_or(1, |v| v as i64),
            matrix: dict_matrix(dict),
            dict: dict.clone(),
        }))
    }

    fn shading(&self, name: &str) -> Result<Option<Shading>, ResolveError> {
        let Some(obj) = self.entry(b"Shading", name)? else {
            return Ok(None);
        };
        let dict = match obj {
            Object::Stream(stream) => &stream.dict,
            Object::Dictionary(dict) => dict,
            _ => {
                return Err(ResolveError::malformed(
                    "shading",
                    format!("/{name} is neither a stream nor a dictionary"),
                ));
            }
        };
        let color_space = match dict.get(b"ColorSpace") {
            Ok(cs) => Some(color_space_from_object(Some(&*self.doc), cs)?),
            Err(_) => None,
        };
        Ok(Some(Shading {
            shading_type: number(dict, b"ShadingType").map_or(0, |v| v as i64),
            color_space,
            dict: dict.clone(),
        }))
    }

    fn ext_gstate(&self, name: &str) -> Result<Option<ExtGState>, ResolveError> {
        let Some(obj) = self.entry(b"ExtGState", name)? else {
            return Ok(None);
        };
        let dict = obj.as_dict().map_err(|_| {
            ResolveError::malformed("extended graphics state", format!("/{name} is not a dictionary"))
        })?;
        ext_gstate_from_dict(&self.doc, dict).map(Some)
    }

    fn properties(&self, name: &str) -> Result<Option<Dictionary>, ResolveError> {
        match self.entry(b"Properties", name)? {
            Some(Object::Dictionary(dict)) => Ok(Some(dict.clone())),
            Some(_) => Err(ResolveError::malformed(
                "property list",
                format!("/{name} is not a dictionary"),
            )),
            None => Ok(None),
        }
    }

    fn xobject(&self, name: &str) -> Result<Option<XObject>, ResolveError> {
        let Some(obj) = self.entry(b"XObject", name)? else {
            return Ok(None);
        };
        let stream = obj
            .as_stream()
            .map_err(|_| ResolveError::malformed("xobject", format!("/{name} is not a stream")))?;
        let dict = &stream.dict;

        match dict.get(b"Subtype").ok().and_then(object_to_name).as_deref() {
            Some("Form") => {
                let content = tokenize(&stream_bytes(stream)?)?;
                let resources: Option<Arc<dyn Resources>> = match dict.get(b"Resources") {
                    Ok(res) => Some(Arc::new(LopdfResources::from_object(self.doc.clone(), res)?)),
                    Err(_) => None,
                };
                Ok(Some(XObject::Form(FormXObject {
                    matrix: dict_matrix(dict),
                    bbox: dict_bbox(dict),
                    content: content.into(),
                    resources,
                })))
            }
            Some("Image") => {
                let color_space = match dict.get(b"ColorSpace") {
                    Ok(cs) => Some(color_space_from_object(Some(&*self.doc), cs)?),
                    Err(_) => None,
                };
                Ok(Some(XObject::Image(ImageXObject {
                    width: number(dict, b"Width").map_or(0, |v| v.max(0.0) as u32),
                    height: number(dict, b"Height").map_or(0, |v| v.max(0.0) as u32),
                    bits_per_component: number(dict, b"BitsPerComponent").map(|v| v as u32),
                    color_space,
                    image_mask: matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))),
                    dict: dict.clone(),
                })))
            }
            Some("PS") => Ok(Some(XObject::PostScript)),
            other => Err(ResolveError::malformed(
                "xobject",
                format!("/{name} has unknown subtype {other:?}"),
            )),
        }
    }
}
