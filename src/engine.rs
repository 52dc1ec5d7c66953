//! The document capability the conversion logic is written against.
//!
//! Anything that can enumerate pages, read and change their size, create
//! pages and draw another document's page onto them can be fitted. The
//! production implementation is [`crate::lopdf_engine::LopdfDocument`].

use crate::geometry::{PageDimensions, PlacedContent};
use crate::ConvertError;

pub trait DocumentEngine: Sized {
    /// Handle to one page of this document.
    type PageRef: Copy + std::fmt::Debug;

    /// Parse a serialized document.
    fn load(bytes: &[u8]) -> Result<Self, ConvertError>;

    /// A new document with no pages.
    fn create() -> Self;

    /// All pages, in document order.
    fn pages(&self) -> Vec<Self::PageRef>;

    fn page_size(&self, page: Self::PageRef) -> Result<PageDimensions, ConvertError>;

    fn set_page_size(
        &mut self,
        page: Self::PageRef,
        size: PageDimensions,
    ) -> Result<(), ConvertError>;

    /// Append an empty page of the given size.
    fn add_page(&mut self, size: PageDimensions) -> Result<Self::PageRef, ConvertError>;

    /// Draw `source_page` of `source` onto `target` at `placement`.
    fn draw_page(
        &mut self,
        target: Self::PageRef,
        source: &Self,
        source_page: Self::PageRef,
        placement: &PlacedContent,
    ) -> Result<(), ConvertError>;

    /// Serialize the document.
    fn save(&mut self, compress: bool) -> Result<Vec<u8>, ConvertError>;
}
