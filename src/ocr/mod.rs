//! OCR fallback for pages that render as images.
//!
//! Tesseract runs over the page's background image, which is downloaded
//! through an `ImageFetcher` so tests can substitute canned bytes.

mod backend;
mod image;
mod tesseract;

pub use backend::{check_binary, OcrBackend, OcrError, OcrResult};
pub use image::{HttpImageFetcher, ImageFetcher};
pub use tesseract::TesseractBackend;
