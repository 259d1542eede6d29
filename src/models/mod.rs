//! Data models for manual extraction.

mod document;
mod page;

pub use document::{CachedManual, Document, UrlCache};
pub use page::{ExtractionMethod, PageCount, PageResult};
