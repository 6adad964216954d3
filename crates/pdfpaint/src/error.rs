//! Error types for the pdfpaint interpreter.
//!
//! [`InterpError`] covers the fatal conditions that stop interpretation unless
//! an installed [`ConditionHandler`](crate::ConditionHandler) swallows them.
//! Every device callback and operator handler reports its outcome as an
//! [`OpResult`], so recoverable warnings travel as values through the loop
//! instead of unwinding it.

use pdfpaint_core::{StateStackError, Warning, WarningCode};
use thiserror::Error;

use crate::resources::ResolveError;

/// Fatal interpretation conditions.
#[derive(Debug, Error)]
pub enum InterpError {
    /// A `q` would exceed the configured stack depth.
    #[error("graphics state stack overflow (limit {limit})")]
    StackOverflow { limit: usize },

    /// A `Q` was issued with no saved state.
    #[error("graphics state stack underflow: restore without matching save")]
    StackUnderflow,

    /// The device reported a failure it cannot recover from.
    #[error("device failure: {0}")]
    Device(String),

    /// A resource lookup failed for reasons other than absence.
    #[error("failed to resolve {category} /{name}: {source}")]
    Resolve {
        category: &'static str,
        name: String,
        #[source]
        source: ResolveError,
    },

    /// Any other failure surfacing from an operator handler.
    #[error("unexpected failure in '{operator}': {message}")]
    Unexpected { operator: String, message: String },
}

impl From<StateStackError> for InterpError {
    fn from(err: StateStackError) -> Self {
        match err {
            StateStackError::Overflow { limit } => InterpError::StackOverflow { limit },
            StateStackError::Underflow => InterpError::StackUnderflow,
        }
    }
}

/// Non-success outcome of executing one operation.
#[derive(Debug)]
pub enum Signal {
    /// The operator has no handler. Reported as a warning outside a
    /// compatibility section, ignored inside one.
    Unsupported,
    /// Recoverable: reported, and the loop moves on to the next operation.
    Warning(Warning),
    /// Fatal: offered to the condition handler.
    Fatal(InterpError),
    /// A fatal condition that a condition handler already re-raised inside a
    /// nested form; unwinds the remaining content without being offered again.
    Abort(InterpError),
}

impl Signal {
    /// Shorthand for a warning signal.
    pub fn warning(code: WarningCode, description: impl Into<String>) -> Self {
        Signal::Warning(Warning::new(code, description))
    }
}

impl From<InterpError> for Signal {
    fn from(err: InterpError) -> Self {
        Signal::Fatal(err)
    }
}

impl From<StateStackError> for Signal {
    fn from(err: StateStackError) -> Self {
        Signal::Fatal(err.into())
    }
}

impl From<Warning> for Signal {
    fn from(warning: Warning) -> Self {
        Signal::Warning(warning)
    }
}

/// Outcome of a device callback or operator handler.
pub type OpResult = Result<(), Signal>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_errors_convert_to_fatal_variants() {
        let err: InterpError = StateStackError::Overflow { limit: 500 }.into();
        assert!(matches!(err, InterpError::StackOverflow { limit: 500 }));
        let signal: Signal = StateStackError::Underflow.into();
        assert!(matches!(signal, Signal::Fatal(InterpError::StackUnderflow)));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            InterpError::StackOverflow { limit: 3 }.to_string(),
            "graphics state stack overflow (limit 3)"
        );
        let err = InterpError::Unexpected {
            operator: "Do".to_string(),
            message: "bad stream".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected failure in 'Do': bad stream");
    }

    #[test]
    fn resolve_error_keeps_source() {
        use std::error::Error as _;
        let err = InterpError::Resolve {
            category: "font",
            name: "F1".to_string(),
            source: ResolveError::Malformed {
                what: "font",
                detail: "/Widths is not an array".to_string(),
            },
        };
        assert!(err.to_string().starts_with("failed to resolve font /F1"));
        assert!(err.source().is_some());
    }

    #[test]
    fn warning_shorthand() {
        let signal = Signal::warning(WarningCode::MissingFont, "no font");
        assert!(matches!(signal, Signal::Warning(ref w) if w.code == WarningCode::MissingFont));
    }
}
