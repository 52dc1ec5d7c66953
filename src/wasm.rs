//! WebAssembly bindings for the PDF Page Fitter

use crate::{convert_pdf_bytes, ConvertOptions, FitStrategy, PaperSize};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn options_from(strategy: Option<String>, paper: Option<String>) -> Result<ConvertOptions, JsError> {
    let strategy = match strategy {
        Some(name) => name.parse::<FitStrategy>()?,
        None => FitStrategy::default(),
    };
    let paper = match paper {
        Some(name) => name.parse::<PaperSize>()?,
        None => PaperSize::default(),
    };
    Ok(ConvertOptions {
        target: paper.dimensions(),
        strategy,
        ..ConvertOptions::default()
    })
}

/// Fit every page of a PDF to a paper size
///
/// # Arguments
/// * `pdf_bytes` - The input PDF file as a byte array
/// * `strategy` - "resize", "resize-contain", "center" or "crop" (default: "center")
/// * `paper` - "a3", "a4", "a5", "letter" or "legal" (default: "a4")
///
/// # Returns
/// The fitted PDF as a byte array, or throws an error
#[wasm_bindgen]
pub fn fit_pdf(
    pdf_bytes: &[u8],
    strategy: Option<String>,
    paper: Option<String>,
) -> Result<Vec<u8>, JsError> {
    let options = options_from(strategy, paper)?;
    let (output_bytes, _result) = convert_pdf_bytes(pdf_bytes, &options)?;
    Ok(output_bytes)
}

/// Fit every page of a PDF and report page statistics alongside the bytes
#[wasm_bindgen]
pub fn fit_pdf_with_info(
    pdf_bytes: &[u8],
    strategy: Option<String>,
    paper: Option<String>,
) -> Result<FitResultJs, JsError> {
    let options = options_from(strategy, paper)?;
    let (output_bytes, result) = convert_pdf_bytes(pdf_bytes, &options)?;

    Ok(FitResultJs {
        pdf_bytes: output_bytes,
        total_pages: result.total_pages,
        adjusted_pages: result.adjusted_pages,
    })
}

/// Result of a fitting operation with statistics
#[wasm_bindgen]
pub struct FitResultJs {
    pdf_bytes: Vec<u8>,
    total_pages: usize,
    adjusted_pages: usize,
}

#[wasm_bindgen]
impl FitResultJs {
    /// Get the fitted PDF bytes
    #[wasm_bindgen(getter)]
    pub fn pdf_bytes(&self) -> Vec<u8> {
        self.pdf_bytes.clone()
    }

    /// Get the number of pages in the output
    #[wasm_bindgen(getter)]
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Get the number of pages whose size changed
    #[wasm_bindgen(getter)]
    pub fn adjusted_pages(&self) -> usize {
        self.adjusted_pages
    }
}
