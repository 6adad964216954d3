//! Graphics state save/restore through the interpreter.

mod common;

use std::sync::Arc;

use common::{ops, run};
use pdfpaint::pdfpaint_core::geometry::{Affine, Rect, Shape};
use pdfpaint::{
    CollectingHandler, Device, DeviceOptions, GraphicsDevice, InterpError, Interpreter,
    NoResources, PaintEvent, RecordingSurface,
};
use pdfpaint::pdfpaint_core::{FillRule, PaintOp};

#[test]
fn offset_fill_then_restore() {
    let (device, handler) = run("q 1 0 0 1 10 10 cm 0 0 100 100 re f Q");
    assert!(handler.warnings.is_empty());

    let events = device.surface().events();
    assert_eq!(events.len(), 1);
    let PaintEvent::Path { path, op, .. } = &events[0] else {
        panic!("expected one fill, got {events:?}");
    };
    assert_eq!(*op, PaintOp::Fill(FillRule::NonZeroWinding));
    assert_eq!(path.bounding_box(), Rect::new(10.0, 10.0, 110.0, 110.0));
    assert_eq!(device.state().ctm, Affine::IDENTITY);
    assert_eq!(device.stack_depth(), 0);
}

#[test]
fn balanced_sequences_restore_every_field() {
    let mut device = GraphicsDevice::new(RecordingSurface::new());
    device.set_line_width(2.0).unwrap();
    device.set_fill_rgb([0.2, 0.4, 0.6], None).unwrap();
    let outer = device.state().clone();

    let content = ops(
        "q 3 w 1 J 2 j 4 M [2 1] 0 d /Perceptual ri 1 0 0 RG \
         2 0 0 2 5 5 cm 0 0 10 10 re W n \
         BT 2 Tc 3 Tw 80 Tz 14 TL 2 Tr 1 Ts 5 5 Td \
         q 9 w 0 1 0 rg Q ET Q",
    );
    let mut interpreter = Interpreter::new(device);
    interpreter.process(&content, Arc::new(NoResources)).unwrap();
    assert_eq!(interpreter.device().state(), &outer);
}

#[test]
fn inner_restore_returns_to_inner_save() {
    let (device, _) = run("q 2 w q 5 w Q");
    assert_eq!(device.state().line_width, 2.0);
    assert_eq!(device.stack_depth(), 1);
}

#[test]
fn saving_past_the_bound_is_fatal() {
    let content = ops(&"q ".repeat(501));
    let mut interpreter = Interpreter::new(GraphicsDevice::new(RecordingSurface::new()));
    let err = interpreter
        .process(&content, Arc::new(NoResources))
        .unwrap_err();
    assert!(matches!(err, InterpError::StackOverflow { limit: 500 }));
    assert_eq!(interpreter.device().stack_depth(), 500);
}

#[test]
fn bound_comes_from_device_options() {
    let engine = GraphicsDevice::with_options(
        RecordingSurface::new(),
        DeviceOptions {
            max_stack_depth: 3,
            ..DeviceOptions::default()
        },
    );
    let mut interpreter = Interpreter::new(engine);
    assert!(interpreter.process(&ops("q q q"), Arc::new(NoResources)).is_ok());
    assert!(matches!(
        interpreter.process(&ops("q"), Arc::new(NoResources)),
        Err(InterpError::StackOverflow { limit: 3 })
    ));
}

#[test]
fn restore_without_save_is_fatal() {
    let mut interpreter = Interpreter::new(GraphicsDevice::new(RecordingSurface::new()));
    let err = interpreter
        .process(&ops("Q"), Arc::new(NoResources))
        .unwrap_err();
    assert!(matches!(err, InterpError::StackUnderflow));
    assert_eq!(err.to_string(), "graphics state stack underflow: restore without matching save");
}

#[test]
fn swallowed_underflow_leaves_state_untouched() {
    let mut handler = CollectingHandler::swallowing();
    let device = {
        let mut interpreter = Interpreter::new(GraphicsDevice::new(RecordingSurface::new()))
            .with_handler(Box::new(&mut handler));
        interpreter
            .process(&ops("3 w Q Q 0 0 5 5 re f"), Arc::new(NoResources))
            .unwrap();
        interpreter.into_device()
    };
    assert_eq!(handler.fatal.len(), 2);
    assert_eq!(device.state().line_width, 3.0);
    assert_eq!(device.surface().events().len(), 1);
}

#[test]
fn cm_inside_a_path_is_tolerated() {
    let (device, handler) = run("0 0 m 2 0 0 2 0 0 cm 10 10 l S");
    assert_eq!(handler.warning_codes(), vec!["UNEXPECTED_PHASE"]);
    assert_eq!(handler.warnings[0].operator.as_deref(), Some("cm"));
    let PaintEvent::Path { path, .. } = &device.surface().events()[0] else {
        panic!("expected a stroke");
    };
    // points appended after cm use the new transform
    assert_eq!(path.bounding_box(), Rect::new(0.0, 0.0, 20.0, 20.0));
}

#[test]
fn save_and_restore_inside_a_path_still_apply() {
    let (device, handler) = run("0 0 m q 5 w 10 0 l Q S");
    assert_eq!(handler.warning_codes(), vec!["UNEXPECTED_PHASE", "UNEXPECTED_PHASE"]);
    assert_eq!(handler.warnings[0].operator.as_deref(), Some("q"));
    assert_eq!(handler.warnings[1].operator.as_deref(), Some("Q"));
    assert_eq!(device.stack_depth(), 0);
    // the path built across q/Q survives and is stroked with the restored width
    let PaintEvent::Path { path, line_width, .. } = &device.surface().events()[0] else {
        panic!("expected a stroke");
    };
    assert_eq!(path.bounding_box(), Rect::new(0.0, 0.0, 10.0, 0.0));
    assert_eq!(*line_width, 1.0);
}
