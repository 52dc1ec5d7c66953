//! Page-fitting geometry.
//!
//! All sizes are in PDF points (1/72 inch). The functions here are pure: they
//! never touch a document, they only turn a source page size and a target
//! envelope into either a new page size or a placement for scaled content.

use crate::{ConvertError, ParseNameError};
use std::fmt;
use std::str::FromStr;

/// Width and height of a page in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
}

impl PageDimensions {
    pub const fn new(width: f32, height: f32) -> Self {
        PageDimensions { width, height }
    }

    /// Reject zero, negative and non-finite sizes.
    pub fn validate(&self) -> Result<(), ConvertError> {
        let ok = |v: f32| v.is_finite() && v > 0.0;
        if ok(self.width) && ok(self.height) {
            Ok(())
        } else {
            Err(ConvertError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }

    /// Same page turned by 90 degrees.
    pub fn rotated(&self) -> Self {
        PageDimensions::new(self.height, self.width)
    }

    /// Whether both sides match `other` within `tolerance` points.
    pub fn approx_eq(&self, other: &PageDimensions, tolerance: f32) -> bool {
        (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

impl fmt::Display for PageDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x{:.2} pt", self.width, self.height)
    }
}

/// ISO A4, 210 x 297 mm.
pub const A4: PageDimensions = PageDimensions::new(595.0, 842.0);

/// Size assumed for pages that carry no media box at all.
pub const US_LETTER: PageDimensions = PageDimensions::new(612.0, 792.0);

/// Target paper sizes selectable from the CLI and WASM bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaperSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PaperSize {
    /// Portrait dimensions in points
    pub fn dimensions(self) -> PageDimensions {
        match self {
            PaperSize::A3 => PageDimensions::new(842.0, 1191.0),
            PaperSize::A4 => A4,
            PaperSize::A5 => PageDimensions::new(420.0, 595.0),
            PaperSize::Letter => US_LETTER,
            PaperSize::Legal => PageDimensions::new(612.0, 1008.0),
        }
    }

    pub fn landscape(self) -> PageDimensions {
        self.dimensions().rotated()
    }
}

impl FromStr for PaperSize {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a3" => Ok(PaperSize::A3),
            "a4" => Ok(PaperSize::A4),
            "a5" => Ok(PaperSize::A5),
            "letter" => Ok(PaperSize::Letter),
            "legal" => Ok(PaperSize::Legal),
            _ => Err(ParseNameError::new("paper size", s)),
        }
    }
}

/// New page box for a page resized in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizedPage {
    pub width: f32,
    pub height: f32,
}

impl ResizedPage {
    pub fn dimensions(&self) -> PageDimensions {
        PageDimensions::new(self.width, self.height)
    }
}

/// Where and how large an original page is drawn on a target-sized page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedContent {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub draw_width: f32,
    pub draw_height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitResult {
    Resized(ResizedPage),
    Placed(PlacedContent),
}

/// How a page box is shrunk or grown when resizing in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizingPolicy {
    /// Clamp only the dominant axis: landscape pages take the target width,
    /// portrait and square pages take the target height. Extreme ratios can
    /// overflow the other axis of the target.
    #[default]
    DominantAxis,
    /// Scale uniformly so the page touches the target on one axis and never
    /// exceeds it on either.
    Contain,
}

impl SizingPolicy {
    pub fn apply(
        self,
        source: PageDimensions,
        target: PageDimensions,
    ) -> Result<ResizedPage, ConvertError> {
        match self {
            SizingPolicy::DominantAxis => fit_by_sizing(source, target),
            SizingPolicy::Contain => fit_by_sizing_contained(source, target),
        }
    }
}

/// Resize a page box, keeping its aspect ratio, using the dominant axis.
///
/// A landscape source (`width / height > 1`) gets `target.width` as its new
/// width; anything else gets `target.height` as its new height. The other side
/// follows from the aspect ratio.
pub fn fit_by_sizing(
    source: PageDimensions,
    target: PageDimensions,
) -> Result<ResizedPage, ConvertError> {
    source.validate()?;
    target.validate()?;

    let aspect_ratio = source.aspect_ratio();
    let (width, height) = if aspect_ratio > 1.0 {
        (target.width, target.width / aspect_ratio)
    } else {
        (target.height * aspect_ratio, target.height)
    };

    Ok(ResizedPage { width, height })
}

/// Resize a page box so it fits entirely inside `target`, keeping its aspect
/// ratio. Unlike [`fit_by_sizing`] the result is bounded on both axes.
pub fn fit_by_sizing_contained(
    source: PageDimensions,
    target: PageDimensions,
) -> Result<ResizedPage, ConvertError> {
    source.validate()?;
    target.validate()?;

    let scale = uniform_scale(source, target);
    Ok(ResizedPage {
        width: (source.width * scale).min(target.width),
        height: (source.height * scale).min(target.height),
    })
}

/// Place `source` content on a `target` page: uniform scale so the content
/// fits without distortion, centered on both axes.
///
/// The scale is not clamped to 1, so pages smaller than the target are
/// enlarged until they touch it.
pub fn fit_by_centering(
    source: PageDimensions,
    target: PageDimensions,
) -> Result<PlacedContent, ConvertError> {
    source.validate()?;
    target.validate()?;

    let scale = uniform_scale(source, target);
    // min() absorbs float error on the touching axis so offsets stay >= 0
    let draw_width = (source.width * scale).min(target.width);
    let draw_height = (source.height * scale).min(target.height);

    Ok(PlacedContent {
        scale,
        offset_x: (target.width - draw_width) / 2.0,
        offset_y: (target.height - draw_height) / 2.0,
        draw_width,
        draw_height,
    })
}

fn uniform_scale(source: PageDimensions, target: PageDimensions) -> f32 {
    (target.width / source.width).min(target.height / source.height)
}
