//! Condition handlers: where the interpreter reports warnings and offers
//! fatal conditions.

use pdfpaint_core::Warning;

use crate::error::InterpError;

/// Receives the conditions raised while a content stream runs.
///
/// Both methods run synchronously on the interpreting thread. Returning
/// `Ok(())` from [`on_fatal`](ConditionHandler::on_fatal) swallows the
/// condition and interpretation continues with the next operation.
pub trait ConditionHandler {
    fn on_warning(&mut self, warning: &Warning) {
        let _ = warning;
    }

    /// Re-raises by default.
    fn on_fatal(&mut self, error: InterpError) -> Result<(), InterpError> {
        Err(error)
    }
}

/// The handler used when none is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandler;

impl ConditionHandler for DefaultHandler {}

/// Keeps every warning, and optionally every fatal condition.
#[derive(Debug, Default)]
pub struct CollectingHandler {
    pub warnings: Vec<Warning>,
    pub fatal: Vec<InterpError>,
    swallow_fatal: bool,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record fatal conditions instead of re-raising them.
    pub fn swallowing() -> Self {
        Self {
            swallow_fatal: true,
            ..Self::default()
        }
    }

    pub fn warning_codes(&self) -> Vec<&str> {
        self.warnings.iter().map(|w| w.code.as_str()).collect()
    }
}

impl ConditionHandler for CollectingHandler {
    fn on_warning(&mut self, warning: &Warning) {
        self.warnings.push(warning.clone());
    }

    fn on_fatal(&mut self, error: InterpError) -> Result<(), InterpError> {
        if self.swallow_fatal {
            self.fatal.push(error);
            Ok(())
        } else {
            Err(error)
        }
    }
}

impl<H: ConditionHandler + ?Sized> ConditionHandler for &mut H {
    fn on_warning(&mut self, warning: &Warning) {
        (**self).on_warning(warning);
    }

    fn on_fatal(&mut self, error: InterpError) -> Result<(), InterpError> {
        (**self).on_fatal(error)
    }
}
