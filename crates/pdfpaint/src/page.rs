//! Loading a page's content and resource scope from a lopdf document.

use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfpaint_core::geometry::Rect;
use thiserror::Error;

use crate::content::{ContentError, tokenize};
use crate::lopdf_resources::{LopdfResources, deref, stream_bytes};
use crate::operands::object_to_f64;
use crate::operation::Operation;
use crate::resources::ResolveError;

/// Failure to load a page for interpretation.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("page {page} out of range (document has {count} pages)")]
    OutOfRange { page: u32, count: usize },

    #[error("malformed page: {0}")]
    Malformed(String),

    #[error("invalid page content: {0}")]
    Content(#[from] ContentError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Lopdf(#[from] lopdf::Error),
}

/// A page ready to be interpreted: its operations and resource scope.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-based page number.
    pub page_number: u32,
    pub object_id: ObjectId,
    pub operations: Vec<Operation>,
    pub resources: Arc<LopdfResources>,
    /// `/MediaBox`, inherited through `/Parent` when the page has none.
    pub media_box: Option<Rect>,
}

/// Number of pages in `doc`.
pub fn page_count(doc: &Document) -> usize {
    doc.get_pages().len()
}

impl PageContent {
    /// Load page `page_number` (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`PageError::OutOfRange`] for a page the document does not
    /// have, and the underlying failure when the page tree, content streams
    /// or resource dictionary are broken.
    pub fn load(doc: Arc<Document>, page_number: u32) -> Result<Self, PageError> {
        let pages = doc.get_pages();
        let object_id = *pages.get(&page_number).ok_or(PageError::OutOfRange {
            page: page_number,
            count: pages.len(),
        })?;

        let page = doc.get_object(object_id)?.as_dict()?;
        let bytes = content_bytes(&doc, page)?;
        let operations = tokenize(&bytes)?;

        let resources = match resolve_inherited(&doc, object_id, b"Resources")? {
            Some(obj) => LopdfResources::from_object(Arc::clone(&doc), obj)?,
            None => LopdfResources::new(Arc::clone(&doc), Dictionary::new()),
        };
        let media_box = resolve_inherited(&doc, object_id, b"MediaBox")?
            .and_then(|obj| deref(&doc, obj).ok())
            .and_then(|obj| obj.as_array().ok())
            .and_then(|items| rect_from_array(items));

        Ok(Self {
            page_number,
            object_id,
            operations,
            resources: Arc::new(resources),
            media_box,
        })
    }
}

/// Look `key` up on the page, then on its ancestors.
fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, PageError> {
    let mut current = page_id;
    // page trees deeper than this are treated as cyclic
    for _ in 0..64 {
        let dict = doc.get_object(current)?.as_dict()?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent") {
            Ok(parent) => {
                current = parent
                    .as_reference()
                    .map_err(|e| PageError::Malformed(format!("invalid /Parent reference: {e}")))?;
            }
            Err(_) => return Ok(None),
        }
    }
    Err(PageError::Malformed("/Parent chain does not terminate".to_string()))
}

/// The page's `/Contents`, decoded and joined with a separating space.
fn content_bytes(doc: &Document, page: &Dictionary) -> Result<Vec<u8>, PageError> {
    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };
    match deref(doc, contents)? {
        Object::Stream(stream) => Ok(stream_bytes(stream)?),
        Object::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                let stream = deref(doc, item)?
                    .as_stream()
                    .map_err(|e| PageError::Malformed(format!("/Contents array item: {e}")))?;
                if !out.is_empty() {
                    out.push(b' ');
                }
                out.extend_from_slice(&stream_bytes(stream)?);
            }
            Ok(out)
        }
        Object::Null => Ok(Vec::new()),
        _ => Err(PageError::Malformed(
            "/Contents is neither a stream nor an array".to_string(),
        )),
    }
}

fn rect_from_array(items: &[Object]) -> Option<Rect> {
    let [x0, y0, x1, y1] = items else {
        return None;
    };
    Some(
        Rect::new(
            object_to_f64(x0)?,
            object_to_f64(y0)?,
            object_to_f64(x1)?,
            object_to_f64(y1)?,
        )
        .abs(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    /// Two pages under one `/Pages` node carrying the shared resources.
    fn two_page_doc() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let first = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m".to_vec()));
        let second = doc.add_object(Stream::new(Dictionary::new(), b"10 10 l".to_vec()));
        let page1 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => vec![Object::from(first), Object::from(second)],
        });
        let page2 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 200.into(), 100.into()],
            "Resources" => Dictionary::new(),
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page1), Object::from(page2)],
                "Count" => 2i64,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "ExtGState" => dictionary! {
                        "GS0" => dictionary! { "LW" => 3i64 },
                    },
                },
            }),
        );
        let catalog = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog);
        doc
    }

    #[test]
    fn joins_content_array_and_inherits_resources() {
        let page = PageContent::load(Arc::new(two_page_doc()), 1).unwrap();
        let operators: Vec<_> = page.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, vec!["m", "l"]);
        assert!(page.resources.dictionary().has(b"ExtGState"));
        assert_eq!(page.media_box, Some(Rect::new(0.0, 0.0, 612.0, 792.0)));
    }

    #[test]
    fn own_entries_win_over_inherited() {
        let page = PageContent::load(Arc::new(two_page_doc()), 2).unwrap();
        assert!(page.operations.is_empty());
        assert!(!page.resources.dictionary().has(b"ExtGState"));
        assert_eq!(page.media_box, Some(Rect::new(0.0, 0.0, 200.0, 100.0)));
    }

    #[test]
    fn out_of_range_page() {
        let doc = Arc::new(two_page_doc());
        assert_eq!(page_count(&doc), 2);
        let err = PageContent::load(doc, 3).unwrap_err();
        assert!(matches!(err, PageError::OutOfRange { page: 3, count: 2 }));
        assert_eq!(err.to_string(), "page 3 out of range (document has 2 pages)");
    }

    #[test]
    fn media_box_is_normalized() {
        let items = [200, 100, 0, 0].map(Object::Integer);
        assert_eq!(rect_from_array(&items), Some(Rect::new(0.0, 0.0, 200.0, 100.0)));
        assert_eq!(rect_from_array(&items[..3]), None);
    }
}
