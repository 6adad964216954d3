//! Error and warning types shared across pdfpaint.
//!
//! Provides [`StateStackError`] for the two fatal graphics-state stack
//! conditions and [`Warning`] for recoverable issues that let interpretation
//! continue with the offending operator skipped.

use std::fmt;

/// Fatal misuse of the `q`/`Q` stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateStackError {
    /// A save would exceed the configured depth.
    Overflow {
        /// The configured maximum number of saved states.
        limit: usize,
    },
    /// A restore was issued with no saved state.
    Underflow,
}

impl fmt::Display for StateStackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateStackError::Overflow { limit } => {
                write!(f, "graphics state stack overflow (limit {limit})")
            }
            StateStackError::Underflow => {
                write!(f, "graphics state stack underflow: restore without matching save")
            }
        }
    }
}

impl std::error::Error for StateStackError {}

/// Machine-readable category of a [`Warning`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningCode {
    /// Operator token with no handler, outside a compatibility section.
    UnsupportedOperator,
    /// Missing or mistyped operands.
    MalformedOperands,
    /// A named resource is absent from the active resource scope.
    MissingResource,
    /// Text shown with no usable font selected.
    MissingFont,
    /// An operator appeared in a path phase where it does not belong.
    UnexpectedPhase,
    /// A path operator that needs a current point had none.
    NoCurrentPoint,
    /// A color-space selection could not be resolved.
    UnresolvedColorSpace,
    /// A registered default color space failed to resolve.
    DefaultColorSpace,
    /// `EMC` without an open marked-content sequence.
    UnbalancedMarkedContent,
    /// `EX` without a matching `BX`.
    UnbalancedCompatibility,
    /// A form XObject was nested deeper than allowed.
    FormDepthExceeded,
    Other(String),
}

impl WarningCode {
    /// Returns the string tag for this warning code.
    pub fn as_str(&self) -> &str {
        match self {
            WarningCode::UnsupportedOperator => "UNSUPPORTED_OPERATOR",
            WarningCode::MalformedOperands => "MALFORMED_OPERANDS",
            WarningCode::MissingResource => "MISSING_RESOURCE",
            WarningCode::MissingFont => "MISSING_FONT",
            WarningCode::UnexpectedPhase => "UNEXPECTED_PHASE",
            WarningCode::NoCurrentPoint => "NO_CURRENT_POINT",
            WarningCode::UnresolvedColorSpace => "UNRESOLVED_COLOR_SPACE",
            WarningCode::DefaultColorSpace => "DEFAULT_COLOR_SPACE",
            WarningCode::UnbalancedMarkedContent => "UNBALANCED_MARKED_CONTENT",
            WarningCode::UnbalancedCompatibility => "UNBALANCED_COMPATIBILITY",
            WarningCode::FormDepthExceeded => "FORM_DEPTH_EXCEEDED",
            WarningCode::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable condition raised while interpreting content.
///
/// Carries a [`code`](Warning::code), a human-readable description and,
/// once the interpreter has routed it, the operator and its position in the
/// content sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub code: WarningCode,
    pub description: String,
    /// Operator mnemonic the warning was raised for.
    pub operator: Option<String>,
    /// Index of the operation in its content sequence.
    pub operator_index: Option<usize>,
    /// Resource name involved, if any.
    pub resource: Option<String>,
}

impl Warning {
    pub fn new(code: WarningCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            operator: None,
            operator_index: None,
            resource: None,
        }
    }

    /// Warning about a resource named `name`.
    pub fn for_resource(code: WarningCode, description: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource: Some(name.into()),
            ..Self::new(code, description)
        }
    }

    /// Attach operator context (builder pattern). Existing context is kept.
    pub fn at_operator(mut self, operator: &str, index: usize) -> Self {
        if self.operator.is_none() {
            self.operator = Some(operator.to_string());
            self.operator_index = Some(index);
        }
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.description)?;
        if let Some(ref name) = self.resource {
            write!(f, " [resource /{name}]")?;
        }
        match (&self.operator, self.operator_index) {
            (Some(op), Some(index)) => write!(f, " [operator '{op}' #{index}]"),
            (Some(op), None) => write!(f, " [operator '{op}']"),
            _ => Ok(()),
        }
    }
}
