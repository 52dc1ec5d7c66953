//! PDF Page Fitter CLI
//!
//! Command-line interface for fitting PDF pages to a paper size.

use clap::Parser;
use fit_pdf::{file_ops::convert_pdf_file, ConvertOptions, FitStrategy, PaperSize};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fit every page of a PDF to A4 (or another paper size)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PDF file path
    input: PathBuf,

    /// Output PDF file path, or a directory to write the input's file name into
    output: PathBuf,

    /// Fitting strategy: resize, resize-contain, center or crop
    #[arg(short, long, default_value = "center")]
    strategy: FitStrategy,

    /// Target paper size: a3, a4, a5, letter or legal
    #[arg(short, long, default_value = "a4")]
    paper: PaperSize,

    /// Use the paper size in landscape orientation
    #[arg(short, long)]
    landscape: bool,

    /// Compress PDF streams (reduces file size)
    #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
    compress_streams: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "fit_pdf=debug" } else { "fit_pdf=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let target = if args.landscape {
        args.paper.landscape()
    } else {
        args.paper.dimensions()
    };
    let options = ConvertOptions {
        target,
        strategy: args.strategy,
        compress_streams: args.compress_streams,
    };

    info!(input = ?args.input, strategy = %options.strategy, target = %target, "fitting PDF");

    let (destination, result) = convert_pdf_file(&args.input, &args.output, &options)?;

    println!(
        "PDF fitted successfully: {} pages ({} adjusted, {} unchanged)",
        result.total_pages, result.adjusted_pages, result.unchanged_pages
    );
    println!("Output saved to: {:?}", destination);

    Ok(())
}
