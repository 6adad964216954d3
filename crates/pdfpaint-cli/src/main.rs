mod cli;
mod ops_cmd;
mod page_range;
mod shared;
mod trace_cmd;

use clap::Parser;
use cli::Cli;
use pdfpaint::{DeviceOptions, InterpreterOptions};
use tracing_subscriber::EnvFilter;

fn main() {
    // routed warnings are printed by the commands; RUST_LOG=warn adds the log lines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        cli::Commands::Trace {
            ref file,
            ref pages,
            only,
            format,
            max_form_depth,
            max_stack_depth,
            clip_hints,
        } => {
            let options = trace_cmd::TraceOptions {
                only,
                format,
                device: DeviceOptions {
                    max_stack_depth,
                    forward_clip_hints: clip_hints,
                },
                interpreter: InterpreterOptions { max_form_depth },
            };
            trace_cmd::run(file, pages.as_deref(), &options)
        }
        cli::Commands::Ops {
            ref file,
            ref pages,
        } => ops_cmd::run(file, pages.as_deref()),
    };

    if let Err(code) = result {
        std::process::exit(code);
    }
}
