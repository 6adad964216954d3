//! Pages loaded from lopdf documents: forms, images, marked content and
//! extended graphics state.

mod common;

use std::sync::Arc;

use common::{events_of_kind, form, single_page, Engine};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use pdfpaint::pdfpaint_core::geometry::{Affine, Rect, Shape};
use pdfpaint::{
    CollectingHandler, GraphicsDevice, Interpreter, InterpreterOptions, PageContent, PaintEvent,
    RecordingSurface,
};

fn interpret(doc: Document, options: InterpreterOptions) -> (Engine, CollectingHandler) {
    let page = PageContent::load(Arc::new(doc), 1).unwrap();
    let mut handler = CollectingHandler::new();
    let device = {
        let mut interpreter =
            Interpreter::with_options(GraphicsDevice::new(RecordingSurface::new()), options)
                .with_handler(Box::new(&mut handler));
        interpreter
            .process(&page.operations, page.resources.clone())
            .unwrap();
        interpreter.into_device()
    };
    (device, handler)
}

fn path_events(device: &Engine) -> Vec<(Rect, f64, Option<Rect>)> {
    device
        .surface()
        .events()
        .iter()
        .filter_map(|event| match event {
            PaintEvent::Path {
                path,
                zero_area: false,
                line_width,
                clip,
                ..
            } => Some((path.bounding_box(), *line_width, *clip)),
            _ => None,
        })
        .collect()
}

// --- Form XObjects ---

#[test]
fn form_runs_under_its_matrix_and_bbox() {
    let mut doc = single_page(b"/Fm0 Do 0 0 10 10 re f", Dictionary::new());
    let form_id = doc.add_object(form(
        b"0 0 10 10 re f",
        dictionary! {
            "Matrix" => vec![2.into(), 0.into(), 0.into(), 2.into(), 100.into(), 100.into()],
            "BBox" => vec![0.into(), 0.into(), 5.into(), 5.into()],
        },
    ));
    set_page_resources(&mut doc, dictionary! {
        "XObject" => dictionary! { "Fm0" => form_id },
    });

    let (device, handler) = interpret(doc, InterpreterOptions::default());
    assert!(handler.warnings.is_empty(), "{:?}", handler.warnings);

    let paths = path_events(&device);
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].0, Rect::new(100.0, 100.0, 120.0, 120.0));
    assert_eq!(paths[0].2, Some(Rect::new(100.0, 100.0, 110.0, 110.0)));
    // the form's transform and clip end with the form
    assert_eq!(paths[1].0, Rect::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(paths[1].2, None);
    assert_eq!(device.state().ctm, Affine::IDENTITY);
    assert_eq!(device.stack_depth(), 0);
}

#[test]
fn form_uses_own_resources_or_inherits() {
    let mut doc = single_page(b"/GS0 gs /Own Do /Inherit Do /GS1 gs", Dictionary::new());
    let own = doc.add_object(form(
        b"/GS1 gs 0 0 1 1 re S",
        dictionary! {
            "Resources" => dictionary! {
                "ExtGState" => dictionary! { "GS1" => dictionary! { "LW" => 7i64 } },
            },
        },
    ));
    let inherit = doc.add_object(form(b"/GS0 gs 2 0 0 2 0 0 cm 0 0 1 1 re S", Dictionary::new()));
    set_page_resources(&mut doc, dictionary! {
        "ExtGState" => dictionary! { "GS0" => dictionary! { "LW" => 3i64 } },
        "XObject" => dictionary! { "Own" => own, "Inherit" => inherit },
    });

    let (device, handler) = interpret(doc, InterpreterOptions::default());
    let widths: Vec<f64> = path_events(&device).iter().map(|p| p.1).collect();
    assert_eq!(widths, vec![7.0, 3.0]);
    // GS1 exists only inside the first form
    assert_eq!(handler.warning_codes(), vec!["MISSING_RESOURCE"]);
    assert_eq!(handler.warnings[0].resource.as_deref(), Some("GS1"));
    assert_eq!(device.state().line_width, 3.0);
}

#[test]
fn self_invoking_form_stops_at_depth_limit() {
    let mut doc = single_page(b"/Loop Do", Dictionary::new());
    let loop_id = doc.new_object_id();
    doc.objects.insert(
        loop_id,
        Object::Stream(form(
            b"0 0 10 10 re f /Loop Do",
            dictionary! {
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Loop" => loop_id },
                },
            },
        )),
    );
    set_page_resources(&mut doc, dictionary! {
        "XObject" => dictionary! { "Loop" => loop_id },
    });

    let (device, handler) = interpret(doc, InterpreterOptions { max_form_depth: 4 });
    assert_eq!(path_events(&device).len(), 4);
    assert_eq!(handler.warning_codes(), vec!["FORM_DEPTH_EXCEEDED"]);
    assert_eq!(device.stack_depth(), 0);
}

// --- Images ---

#[test]
fn image_xobject_is_placed_by_the_ctm() {
    let mut doc = single_page(b"q 40 0 0 20 10 10 cm /Im0 Do Q", Dictionary::new());
    let image = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 4,
            "Height" => 2,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0u8; 8],
    ));
    set_page_resources(&mut doc, dictionary! {
        "XObject" => dictionary! { "Im0" => image },
    });

    let (device, handler) = interpret(doc, InterpreterOptions::default());
    assert!(handler.warnings.is_empty(), "{:?}", handler.warnings);
    let images = events_of_kind(&device, "image");
    assert_eq!(images.len(), 1);
    let PaintEvent::Image { name, width, height, ctm } = images[0] else {
        unreachable!();
    };
    assert_eq!((name.as_str(), *width, *height), ("Im0", 4, 2));
    assert_eq!(ctm.as_coeffs(), [40.0, 0.0, 0.0, 20.0, 10.0, 10.0]);
}

#[test]
fn inline_image_reaches_the_surface() {
    let doc = single_page(
        b"q 8 0 0 4 0 0 cm BI /W 2 /H 1 /CS /G /BPC 8 ID \x00\xff EI Q",
        Dictionary::new(),
    );
    let (device, handler) = interpret(doc, InterpreterOptions::default());
    assert!(handler.warnings.is_empty(), "{:?}", handler.warnings);
    let inline = events_of_kind(&device, "inline_image");
    assert_eq!(inline.len(), 1);
    assert!(matches!(
        inline[0],
        PaintEvent::InlineImage { width: 2, height: 1, .. }
    ));
}

#[test]
fn missing_xobject_warns_and_continues() {
    let doc = single_page(b"/Nope Do 0 0 10 10 re f", Dictionary::new());
    let (device, handler) = interpret(doc, InterpreterOptions::default());
    assert_eq!(handler.warning_codes(), vec!["MISSING_RESOURCE"]);
    assert_eq!(path_events(&device).len(), 1);
}

// --- Marked content and graphics state ---

#[test]
fn marked_content_properties_resolve_by_name() {
    let doc = single_page(
        b"/P /MC0 BDC 0 0 10 10 re f EMC /Span <</MCID 9>> BDC EMC /Artifact MP",
        dictionary! {
            "Properties" => dictionary! { "MC0" => dictionary! { "MCID" => 3 } },
        },
    );
    let (device, handler) = interpret(doc, InterpreterOptions::default());
    assert!(handler.warnings.is_empty(), "{:?}", handler.warnings);
    let marks: Vec<&PaintEvent> = device
        .surface()
        .events()
        .iter()
        .filter(|event| !matches!(event, PaintEvent::Path { .. }))
        .collect();
    assert_eq!(
        marks,
        vec![
            &PaintEvent::BeginMarkedContent { tag: "P".to_string(), mcid: Some(3) },
            &PaintEvent::EndMarkedContent,
            &PaintEvent::BeginMarkedContent { tag: "Span".to_string(), mcid: Some(9) },
            &PaintEvent::EndMarkedContent,
            &PaintEvent::MarkedContentPoint { tag: "Artifact".to_string() },
        ]
    );
    assert_eq!(device.marked_content_depth(), 0);
}

#[test]
fn ext_gstate_updates_the_current_state() {
    let doc = single_page(
        b"q /GS0 gs 0 0 5 5 re S Q",
        dictionary! {
            "ExtGState" => dictionary! {
                "GS0" => dictionary! {
                    "LW" => 4i64,
                    "CA" => Object::Real(0.5),
                    "ca" => Object::Real(0.25),
                    "D" => vec![Object::Array(vec![3.into(), 1.into()]), 0.into()],
                },
            },
        },
    );
    let (device, _) = interpret(doc, InterpreterOptions::default());
    assert_eq!(path_events(&device)[0].1, 4.0);
    // restored after Q
    assert_eq!(device.state().line_width, 1.0);
    assert_eq!(device.state().stroke_alpha, 1.0);
}

fn set_page_resources(doc: &mut Document, resources: Dictionary) {
    let page_id = doc.get_pages()[&1];
    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
        page.set("Resources", resources);
    }
}
