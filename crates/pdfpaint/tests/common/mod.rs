//! Shared helpers for the pdfpaint integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use pdfpaint::{
    CollectingHandler, DeviceOptions, GraphicsDevice, Interpreter, NoResources, Operation,
    PaintEvent, RecordingSurface, Resources, tokenize,
};

pub type Engine = GraphicsDevice<RecordingSurface>;

pub fn ops(src: &str) -> Vec<Operation> {
    tokenize(src.as_bytes()).expect("content should tokenize")
}

/// Run `src` on a fresh engine with no resources.
pub fn run(src: &str) -> (Engine, CollectingHandler) {
    run_with(src, Arc::new(NoResources), DeviceOptions::default())
}

pub fn run_with(
    src: &str,
    resources: Arc<dyn Resources>,
    options: DeviceOptions,
) -> (Engine, CollectingHandler) {
    let content = ops(src);
    let mut handler = CollectingHandler::new();
    let device = {
        let engine = GraphicsDevice::with_options(RecordingSurface::new(), options);
        let mut interpreter = Interpreter::new(engine).with_handler(Box::new(&mut handler));
        interpreter
            .process(&content, resources)
            .expect("no fatal condition");
        interpreter.into_device()
    };
    (device, handler)
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

pub fn events_of_kind<'a>(device: &'a Engine, kind: &str) -> Vec<&'a PaintEvent> {
    device
        .surface()
        .events()
        .iter()
        .filter(|event| event.kind() == kind)
        .collect()
}

/// A one-page document with `content` and the given `/Resources`.
pub fn single_page(content: &[u8], resources: Dictionary) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => resources,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::from(page_id)],
            "Count" => 1i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Font dictionary with `/FirstChar 65 /Widths [600]`.
pub fn simple_font() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Demo",
        "FirstChar" => 65,
        "LastChar" => 65,
        "Widths" => vec![600.into()],
    }
}

/// A form XObject stream.
pub fn form(content: &[u8], extra: Dictionary) -> Stream {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
    };
    for (key, value) in extra.iter() {
        dict.set(key.clone(), value.clone());
    }
    Stream::new(dict, content.to_vec())
}
