//! pdfpaint-core: backend-independent state for the pdfpaint content interpreter.
//!
//! This crate holds the types a drawing device mutates while a content stream
//! runs: the graphics state and its bounded save/restore stack, the text state
//! with its derived glyph-placement factors, the device-space path accumulator
//! and clip region, color spaces, and the font contract the text engine uses to
//! turn shown bytes into glyph advances. Geometry comes from `kurbo`.

pub mod clip;
pub mod color;
pub mod error;
pub mod font;
pub mod geometry;
pub mod graphics_state;
pub mod painting;
pub mod path;
pub mod text_state;

pub use clip::{ClipPath, ClipRegion};
pub use color::{Color, ColorSpace};
pub use error::{StateStackError, Warning, WarningCode};
pub use font::{CompositeFont, Font, Glyph, SimpleFont};
pub use graphics_state::{DEFAULT_MAX_STACK_DEPTH, ExtGState, GraphicsState, GraphicsStateStack};
pub use painting::{DashPattern, FillRule, LineCap, LineJoin, PaintOp};
pub use path::PathAccumulator;
pub use text_state::{FontRef, TextRenderMode, TextState};
