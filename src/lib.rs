//! PDF Page Fitter Library
//!
//! Fits every page of a PDF to a target paper size (A4 by default). Shared
//! between the CLI and WASM targets.
//!
//! Two families of strategies are available: resizing each page box in place
//! while keeping its aspect ratio, or re-paginating onto fixed target pages
//! with the original page scaled and centered on each.

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub mod convert;
pub mod engine;
pub mod geometry;
pub mod lopdf_engine;

pub use convert::{convert_document, crop_pages, plan_page, repaginate, resize_pages};
pub use engine::DocumentEngine;
pub use geometry::{
    fit_by_centering, fit_by_sizing, fit_by_sizing_contained, FitResult, PageDimensions,
    PaperSize, PlacedContent, ResizedPage, SizingPolicy, A4,
};
pub use lopdf_engine::LopdfDocument;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// How pages are brought to the target size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitStrategy {
    /// Resize each page box; the dominant axis takes the target size.
    Resize,
    /// Resize each page box so it fits inside the target on both axes.
    ResizeContain,
    /// New target-sized pages with the original content scaled and centered.
    #[default]
    Center,
    /// Set each page box to the target size without touching the content.
    Crop,
}

impl FitStrategy {
    pub fn name(self) -> &'static str {
        match self {
            FitStrategy::Resize => "resize",
            FitStrategy::ResizeContain => "resize-contain",
            FitStrategy::Center => "center",
            FitStrategy::Crop => "crop",
        }
    }
}

impl fmt::Display for FitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FitStrategy {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resize" => Ok(FitStrategy::Resize),
            "resize-contain" => Ok(FitStrategy::ResizeContain),
            "center" | "centre" => Ok(FitStrategy::Center),
            "crop" => Ok(FitStrategy::Crop),
            _ => Err(ParseNameError::new("strategy", s)),
        }
    }
}

/// Options for fitting a PDF
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Target page size in points
    pub target: PageDimensions,
    /// Fitting strategy
    pub strategy: FitStrategy,
    /// Compress PDF streams (reduces file size)
    pub compress_streams: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            target: A4,
            strategy: FitStrategy::default(),
            compress_streams: true,
        }
    }
}

/// Result of a conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertResult {
    pub total_pages: usize,
    /// Pages whose size changed
    pub adjusted_pages: usize,
    /// Pages that already had the size they were given
    pub unchanged_pages: usize,
}

/// Error type for PDF fitting operations
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Input file not found: {0:?}")]
    FileNotFound(PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to load PDF: {0}")]
    MalformedDocument(String),

    #[error("Failed to write {path:?}: {source}")]
    WriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Output {0:?} would overwrite the input file")]
    OutputIsInput(PathBuf),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Invalid page dimensions: {width}x{height}")]
    InvalidDimensions { width: f32, height: f32 },

    #[error("Unsupported page structure: {0}")]
    PageStructure(String),
}

/// Unrecognized strategy or paper size name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseNameError {
    kind: &'static str,
    value: String,
}

impl ParseNameError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        ParseNameError {
            kind,
            value: value.to_string(),
        }
    }
}

/// Size of one page and what the chosen strategy would do with it
#[derive(Debug, Clone)]
pub struct PageReport {
    pub page_number: u32,
    pub size: PageDimensions,
    pub fit: FitResult,
}

/// Fit a PDF given as bytes and return the fitted PDF bytes
pub fn convert_pdf_bytes(
    input_bytes: &[u8],
    options: &ConvertOptions,
) -> Result<(Vec<u8>, ConvertResult), ConvertError> {
    options.target.validate()?;

    let doc = LopdfDocument::load(input_bytes)?;
    let (mut converted, result) = convert_document(doc, options)?;
    let output_bytes = converted.save(options.compress_streams)?;

    Ok((output_bytes, result))
}

/// List every page's size together with the fit `options` would apply
pub fn inspect_pdf_pages(
    pdf_bytes: &[u8],
    options: &ConvertOptions,
) -> Result<Vec<PageReport>, ConvertError> {
    let doc = LopdfDocument::load(pdf_bytes)?;

    doc.pages()
        .into_iter()
        .zip(1u32..)
        .map(|(page, page_number)| -> Result<PageReport, ConvertError> {
            let size = doc.page_size(page)?;
            let fit = plan_page(options.strategy, size, options.target)?;
            Ok(PageReport {
                page_number,
                size,
                fit,
            })
        })
        .collect()
}

#[cfg(not(target_arch = "wasm32"))]
pub mod file_ops {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;
    use tracing::debug;

    /// Where the output lands: `output_path` itself, or the input's file name
    /// inside it when it is an existing directory.
    pub fn resolve_output_path(input_path: &Path, output_path: &Path) -> PathBuf {
        match input_path.file_name() {
            Some(name) if output_path.is_dir() => output_path.join(name),
            _ => output_path.to_path_buf(),
        }
    }

    /// Fit a PDF from file path to file path.
    ///
    /// The output is written to a temporary file next to the destination and
    /// moved into place only once the whole document converted, so an existing
    /// destination is never left truncated.
    pub fn convert_pdf_file(
        input_path: &Path,
        output_path: &Path,
        options: &ConvertOptions,
    ) -> Result<(PathBuf, ConvertResult), ConvertError> {
        if !input_path.is_file() {
            return Err(ConvertError::FileNotFound(input_path.to_path_buf()));
        }

        let destination = resolve_output_path(input_path, output_path);
        if is_same_file(input_path, &destination) {
            return Err(ConvertError::OutputIsInput(destination));
        }

        let input_bytes = fs::read(input_path).map_err(|source| ConvertError::Read {
            path: input_path.to_path_buf(),
            source,
        })?;
        debug!(path = ?input_path, bytes = input_bytes.len(), "read input");

        let (output_bytes, result) = convert_pdf_bytes(&input_bytes, options)?;

        write_atomically(&destination, &output_bytes)?;
        debug!(path = ?destination, bytes = output_bytes.len(), "wrote output");

        Ok((destination, result))
    }

    fn is_same_file(a: &Path, b: &Path) -> bool {
        match (fs::canonicalize(a), fs::canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
        let write_failure = |source: std::io::Error| ConvertError::WriteFailure {
            path: destination.to_path_buf(),
            source,
        };

        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(write_failure)?;
        staged.write_all(bytes).map_err(write_failure)?;
        staged
            .persist(destination)
            .map_err(|e| write_failure(e.error))?;
        Ok(())
    }
}
