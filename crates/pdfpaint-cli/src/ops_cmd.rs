use std::path::Path;

use lopdf::Object;
use pdfpaint::Operation;

use crate::shared::{load_page, open_pdf, resolve_pages};

pub fn run(file: &Path, pages: Option<&str>) -> Result<(), i32> {
    let doc = open_pdf(file)?;
    let page_numbers = resolve_pages(pages, &doc)?;

    for page_number in page_numbers {
        let page = load_page(&doc, page_number)?;
        for (index, op) in page.operations.iter().enumerate() {
            println!("{}", operation_to_json(op, page_number, index));
        }
    }
    Ok(())
}

fn operation_to_json(op: &Operation, page: u32, index: usize) -> serde_json::Value {
    let category = op.kind().map(|kind| format!("{:?}", kind.category()));
    serde_json::json!({
        "page": page,
        "index": index,
        "operator": op.operator,
        "category": category,
        "operands": op.operands.iter().map(object_to_json).collect::<Vec<_>>(),
    })
}

/// Operand rendering: names keep their slash, strings are decoded lossily,
/// inline image data is summarized by length.
fn object_to_json(obj: &Object) -> serde_json::Value {
    match obj {
        Object::Null => serde_json::Value::Null,
        Object::Boolean(b) => (*b).into(),
        Object::Integer(i) => (*i).into(),
        Object::Real(r) => f64::from(*r).into(),
        Object::Name(name) => format!("/{}", String::from_utf8_lossy(name)).into(),
        Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned().into(),
        Object::Array(items) => items.iter().map(object_to_json).collect::<Vec<_>>().into(),
        Object::Dictionary(dict) => dict
            .iter()
            .map(|(key, value)| (String::from_utf8_lossy(key).into_owned(), object_to_json(value)))
            .collect::<serde_json::Map<_, _>>()
            .into(),
        Object::Stream(stream) => serde_json::json!({ "stream_bytes": stream.content.len() }),
        Object::Reference((num, generation)) => format!("{num} {generation} R").into(),
    }
}
