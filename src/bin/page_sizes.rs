use anyhow::Context;
use clap::Parser;
use fit_pdf::{inspect_pdf_pages, ConvertOptions, FitResult, FitStrategy};
use std::fs;
use std::path::PathBuf;

/// Print every page's size and the fit a strategy would apply to it
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PDF file to inspect
    input: PathBuf,

    /// Fitting strategy: resize, resize-contain, center or crop
    #[arg(default_value = "center")]
    strategy: FitStrategy,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let bytes = fs::read(&args.input).with_context(|| format!("reading {:?}", args.input))?;
    println!("Read {} bytes", bytes.len());

    let options = ConvertOptions {
        strategy: args.strategy,
        ..ConvertOptions::default()
    };
    for report in inspect_pdf_pages(&bytes, &options)? {
        match report.fit {
            FitResult::Resized(page) => println!(
                "page {:>3}: {} -> {}",
                report.page_number,
                report.size,
                page.dimensions()
            ),
            FitResult::Placed(placed) => println!(
                "page {:>3}: {} -> scale {:.4} at ({:.2}, {:.2})",
                report.page_number, report.size, placed.scale, placed.offset_x, placed.offset_y
            ),
        }
    }

    Ok(())
}
