use std::path::Path;

use pdfpaint::pdfpaint_core::geometry::{Affine, Rect, Shape};
use pdfpaint::pdfpaint_core::{Color, PaintOp};
use pdfpaint::{
    CollectingHandler, DeviceOptions, FilterDevice, GraphicsDevice, Interpreter,
    InterpreterOptions, PaintEvent, RecordingSurface,
};

use crate::cli::{OnlyArg, OutputFormat};
use crate::shared::{EXIT_FATAL, load_page, open_pdf, resolve_pages};

type TraceDevice = FilterDevice<GraphicsDevice<RecordingSurface>>;

/// Settings of one `trace` invocation.
#[derive(Debug, Clone, Copy)]
pub struct TraceOptions {
    pub only: Option<OnlyArg>,
    pub format: OutputFormat,
    pub device: DeviceOptions,
    pub interpreter: InterpreterOptions,
}

pub fn run(file: &Path, pages: Option<&str>, options: &TraceOptions) -> Result<(), i32> {
    let doc = open_pdf(file)?;
    let page_numbers = resolve_pages(pages, &doc)?;

    for page_number in page_numbers {
        let page = load_page(&doc, page_number)?;
        let mut handler = CollectingHandler::new();
        let (device, outcome) = {
            let mut interpreter =
                Interpreter::with_options(build_device(options), options.interpreter)
                    .with_handler(Box::new(&mut handler));
            let outcome = interpreter.process(&page.operations, page.resources.clone());
            (interpreter.into_device(), outcome)
        };

        let events = device.into_inner().into_surface().into_events();
        tracing::debug!(page = page_number, events = events.len(), "page traced");
        for event in &events {
            match options.format {
                OutputFormat::Json => println!("{}", event_to_json(event, page_number)),
                OutputFormat::Text => println!("{}", event_to_text(event, page_number)),
            }
        }
        for warning in &handler.warnings {
            eprintln!("warning: page {page_number}: {warning}");
        }

        if let Err(err) = outcome {
            eprintln!("Error: page {page_number}: {err}");
            return Err(EXIT_FATAL);
        }
    }
    Ok(())
}

fn build_device(options: &TraceOptions) -> TraceDevice {
    let engine = GraphicsDevice::with_options(RecordingSurface::new(), options.device);
    match options.only {
        None => FilterDevice::passthrough(engine),
        Some(OnlyArg::Paths) => FilterDevice::paths_only(engine),
        Some(OnlyArg::Text) => FilterDevice::text_only(engine),
        Some(OnlyArg::Images) => FilterDevice::images_only(engine),
    }
}

fn paint_op_name(op: PaintOp) -> &'static str {
    match op {
        PaintOp::Stroke => "stroke",
        PaintOp::Fill(_) => "fill",
        PaintOp::FillStroke(_) => "fill_stroke",
        PaintOp::NoPaint => "none",
    }
}

fn rect_json(rect: Rect) -> serde_json::Value {
    serde_json::json!([rect.x0, rect.y0, rect.x1, rect.y1])
}

fn color_json(color: &Color) -> serde_json::Value {
    match &color.pattern {
        Some(pattern) => serde_json::json!({
            "components": &*color.components,
            "pattern": pattern,
        }),
        None => serde_json::json!(&*color.components),
    }
}

fn matrix_json(m: &Affine) -> serde_json::Value {
    serde_json::json!(m.as_coeffs())
}

pub fn event_to_json(event: &PaintEvent, page: u32) -> serde_json::Value {
    let mut value = match event {
        PaintEvent::Path {
            path,
            op,
            line_width,
            stroke_color,
            fill_color,
            clip,
            ..
        } => {
            let rule = match op {
                PaintOp::Fill(rule) | PaintOp::FillStroke(rule) => Some(rule.as_str()),
                PaintOp::Stroke | PaintOp::NoPaint => None,
            };
            serde_json::json!({
                "op": paint_op_name(*op),
                "rule": rule,
                "path": path.to_svg(),
                "bbox": rect_json(path.bounding_box()),
                "line_width": line_width,
                "stroke_color": color_json(stroke_color),
                "fill_color": color_json(fill_color),
                "clip": clip.map(rect_json),
            })
        }
        PaintEvent::Glyph {
            code,
            width,
            font,
            size,
            rendering,
            color,
        } => {
            let origin = rendering.translation();
            serde_json::json!({
                "code": code,
                "width": width,
                "font": font,
                "size": size,
                "x": origin.x,
                "y": origin.y,
                "matrix": matrix_json(rendering),
                "color": color_json(color),
            })
        }
        PaintEvent::Image {
            name,
            width,
            height,
            ctm,
        } => serde_json::json!({
            "name": name,
            "width": width,
            "height": height,
            "matrix": matrix_json(ctm),
        }),
        PaintEvent::InlineImage { width, height, ctm } => serde_json::json!({
            "width": width,
            "height": height,
            "matrix": matrix_json(ctm),
        }),
        PaintEvent::Shading {
            name,
            shading_type,
            ctm,
        } => serde_json::json!({
            "name": name,
            "shading_type": shading_type,
            "matrix": matrix_json(ctm),
        }),
        PaintEvent::ClipHint { path, rule, bounds } => serde_json::json!({
            "rule": rule.as_str(),
            "path": path.to_svg(),
            "bounds": bounds.map(rect_json),
        }),
        PaintEvent::BeginMarkedContent { tag, mcid } => serde_json::json!({
            "tag": tag,
            "mcid": mcid,
        }),
        PaintEvent::EndMarkedContent => serde_json::json!({}),
        PaintEvent::MarkedContentPoint { tag } => serde_json::json!({ "tag": tag }),
    };
    if let Some(fields) = value.as_object_mut() {
        fields.insert("page".to_string(), page.into());
        fields.insert("kind".to_string(), event.kind().into());
    }
    value
}

pub fn event_to_text(event: &PaintEvent, page: u32) -> String {
    let detail = match event {
        PaintEvent::Path {
            path, op, clip, ..
        } => {
            let b = path.bounding_box();
            let mut line = format!(
                "{} [{:.2} {:.2} {:.2} {:.2}]",
                paint_op_name(*op),
                b.x0,
                b.y0,
                b.x1,
                b.y1
            );
            if let Some(c) = clip {
                line.push_str(&format!(" clip [{:.2} {:.2} {:.2} {:.2}]", c.x0, c.y0, c.x1, c.y1));
            }
            line
        }
        PaintEvent::Glyph {
            code,
            font,
            size,
            rendering,
            ..
        } => {
            let origin = rendering.translation();
            format!("{code} {font} {size:.2} at ({:.2}, {:.2})", origin.x, origin.y)
        }
        PaintEvent::Image {
            name,
            width,
            height,
            ..
        } => format!("/{name} {width}x{height}"),
        PaintEvent::InlineImage { width, height, .. } => format!("{width}x{height}"),
        PaintEvent::Shading { name, .. } => format!("/{name}"),
        PaintEvent::ClipHint { rule, bounds, .. } => match bounds {
            Some(b) => format!(
                "{} [{:.2} {:.2} {:.2} {:.2}]",
                rule.as_str(),
                b.x0,
                b.y0,
                b.x1,
                b.y1
            ),
            None => format!("{} empty", rule.as_str()),
        },
        PaintEvent::BeginMarkedContent { tag, mcid } => match mcid {
            Some(id) => format!("/{tag} mcid {id}"),
            None => format!("/{tag}"),
        },
        PaintEvent::EndMarkedContent => String::new(),
        PaintEvent::MarkedContentPoint { tag } => format!("/{tag}"),
    };
    format!("{page}\t{}\t{detail}", event.kind())
}
