use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Trace how PDF pages are painted: paths, glyphs, images and clips.
#[derive(Debug, Parser)]
#[command(name = "pdfpaint", about, version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interpret pages and print every painted mark
    Trace {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Page range (e.g. '1,3-5'). Default: all pages
        #[arg(long)]
        pages: Option<String>,

        /// Keep only one kind of mark
        #[arg(long, value_enum)]
        only: Option<OnlyArg>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Maximum nesting of form XObjects
        #[arg(long, default_value_t = 10)]
        max_form_depth: usize,

        /// Maximum depth of the graphics state stack
        #[arg(long, default_value_t = 500)]
        max_stack_depth: usize,

        /// Report each installed clip as a separate event
        #[arg(long)]
        clip_hints: bool,
    },

    /// Print the tokenized content stream operations
    Ops {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Page range (e.g. '1,3-5'). Default: all pages
        #[arg(long)]
        pages: Option<String>,
    },
}

/// Output format for the trace subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Human-readable lines
    Text,
}

/// Mark kinds selectable with `--only`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnlyArg {
    /// Painted paths and clip hints
    Paths,
    /// Glyphs
    Text,
    /// Image XObjects, inline images and shadings
    Images,
}
