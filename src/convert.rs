//! Page-by-page conversion, written against [`DocumentEngine`].
//!
//! A failure on any page aborts the whole document; nothing here returns a
//! partially converted result.

use crate::engine::DocumentEngine;
use crate::geometry::{fit_by_centering, FitResult, PageDimensions, ResizedPage, SizingPolicy};
use crate::{ConvertError, ConvertOptions, ConvertResult, FitStrategy};
use tracing::{debug, info, warn};

/// Pages whose size moves less than this are counted as unchanged.
const SIZE_TOLERANCE: f32 = 0.01;

/// Resize every page box in place, keeping each page's aspect ratio.
pub fn resize_pages<E: DocumentEngine>(
    doc: &mut E,
    target: PageDimensions,
    policy: SizingPolicy,
) -> Result<ConvertResult, ConvertError> {
    target.validate()?;
    let mut result = ConvertResult::default();

    for (index, page) in doc.pages().into_iter().enumerate() {
        let source = doc.page_size(page)?;
        let resized = policy.apply(source, target)?;
        debug!(
            page = index + 1,
            from = %source,
            to = %resized.dimensions(),
            "resizing page"
        );
        record(&mut result, source, resized.dimensions());
        doc.set_page_size(page, resized.dimensions())?;
    }

    Ok(result)
}

/// Replace every page box with `target` at the page's own origin. Content is
/// left where it is, so anything outside the new box is cropped away.
pub fn crop_pages<E: DocumentEngine>(
    doc: &mut E,
    target: PageDimensions,
) -> Result<ConvertResult, ConvertError> {
    target.validate()?;
    let mut result = ConvertResult::default();

    for (index, page) in doc.pages().into_iter().enumerate() {
        let source = doc.page_size(page)?;
        debug!(page = index + 1, from = %source, to = %target, "cropping page");
        record(&mut result, source, target);
        doc.set_page_size(page, target)?;
    }

    Ok(result)
}

/// Build a new document of `target`-sized pages, each carrying one source
/// page scaled and centered. Source page order is kept.
pub fn repaginate<E: DocumentEngine>(
    source: &E,
    target: PageDimensions,
) -> Result<(E, ConvertResult), ConvertError> {
    target.validate()?;
    let mut output = E::create();
    let mut result = ConvertResult::default();

    for (index, page) in source.pages().into_iter().enumerate() {
        let size = source.page_size(page)?;
        let placement = fit_by_centering(size, target)?;
        debug!(
            page = index + 1,
            from = %size,
            scale = placement.scale,
            offset_x = placement.offset_x,
            offset_y = placement.offset_y,
            "placing page"
        );
        record(&mut result, size, target);
        let new_page = output.add_page(target)?;
        output.draw_page(new_page, source, page, &placement)?;
    }

    Ok((output, result))
}

/// Apply `options.strategy` to `doc`, returning the document to save.
pub fn convert_document<E: DocumentEngine>(
    mut doc: E,
    options: &ConvertOptions,
) -> Result<(E, ConvertResult), ConvertError> {
    let target = options.target;
    let (converted, result) = match options.strategy {
        FitStrategy::Resize => {
            let result = resize_pages(&mut doc, target, SizingPolicy::DominantAxis)?;
            (doc, result)
        }
        FitStrategy::ResizeContain => {
            let result = resize_pages(&mut doc, target, SizingPolicy::Contain)?;
            (doc, result)
        }
        FitStrategy::Crop => {
            let result = crop_pages(&mut doc, target)?;
            (doc, result)
        }
        FitStrategy::Center => repaginate(&doc, target)?,
    };

    if result.total_pages == 0 {
        warn!("document has no pages");
    }
    info!(
        strategy = %options.strategy,
        target = %target,
        pages = result.total_pages,
        adjusted = result.adjusted_pages,
        "document converted"
    );
    Ok((converted, result))
}

/// Compute what `strategy` would do to a page of `source` size.
pub fn plan_page(
    strategy: FitStrategy,
    source: PageDimensions,
    target: PageDimensions,
) -> Result<FitResult, ConvertError> {
    let fit = match strategy {
        FitStrategy::Resize => {
            FitResult::Resized(SizingPolicy::DominantAxis.apply(source, target)?)
        }
        FitStrategy::ResizeContain => {
            FitResult::Resized(SizingPolicy::Contain.apply(source, target)?)
        }
        FitStrategy::Crop => {
            source.validate()?;
            target.validate()?;
            FitResult::Resized(ResizedPage {
                width: target.width,
                height: target.height,
            })
        }
        FitStrategy::Center => FitResult::Placed(fit_by_centering(source, target)?),
    };
    Ok(fit)
}

fn record(result: &mut ConvertResult, from: PageDimensions, to: PageDimensions) {
    result.total_pages += 1;
    if from.approx_eq(&to, SIZE_TOLERANCE) {
        result.unchanged_pages += 1;
    } else {
        result.adjusted_pages += 1;
    }
}
