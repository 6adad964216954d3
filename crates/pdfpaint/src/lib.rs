//! pdfpaint: a PDF content-stream interpreter.
//!
//! A content stream is tokenized into [`Operation`]s ([`tokenize`]), then an
//! [`Interpreter`] runs them against a [`Device`], resolving resource names
//! through a [`Resources`] scope on the way. [`GraphicsDevice`] is the device
//! that implements the imaging model (state stack, paths, clipping, text
//! positioning) and reports finished marks to a [`Surface`];
//! [`FilterDevice`] narrows any device to a subset of callback categories.
//!
//! ```no_run
//! use std::sync::Arc;
//! use pdfpaint::{GraphicsDevice, Interpreter, PageContent, RecordingSurface};
//!
//! let doc = Arc::new(lopdf::Document::load("input.pdf")?);
//! let page = PageContent::load(doc, 1)?;
//! let mut interpreter = Interpreter::new(GraphicsDevice::new(RecordingSurface::new()));
//! interpreter.process(&page.operations, page.resources.clone())?;
//! for event in interpreter.device().surface().events() {
//!     println!("{}", event.kind());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod content;
pub mod device;
pub mod engine;
pub mod error;
pub mod filter;
pub mod handler;
pub mod interpreter;
pub mod lopdf_resources;
pub mod operands;
pub mod operation;
pub mod page;
pub mod resources;
pub mod surface;

pub use content::{ContentError, tokenize};
pub use device::{Device, Features, TextItem};
pub use engine::{DeviceOptions, GraphicsDevice, PathPhase};
pub use error::{InterpError, OpResult, Signal};
pub use filter::{Categories, FilterDevice};
pub use handler::{CollectingHandler, ConditionHandler, DefaultHandler};
pub use interpreter::{CancellationToken, Completion, Interpreter, InterpreterOptions};
pub use lopdf_resources::{LopdfResources, color_space_from_object};
pub use operation::{Category, Operation, Operator};
pub use page::{PageContent, PageError, page_count};
pub use resources::{
    FormXObject, ImageXObject, InlineImage, NoResources, Pattern, ResolveError, Resources,
    Shading, XObject,
};
pub use surface::{PaintEvent, RecordingSurface, Surface};

pub use pdfpaint_core;
