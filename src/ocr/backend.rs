//! OCR backend abstraction.

use std::io::Write;
use std::path::Path;

use thiserror::Error;

/// Errors from OCR backends and image downloads.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Result of OCR processing.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Extracted text content.
    pub text: String,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Trait for OCR backends. Calls block; run them on a blocking thread.
pub trait OcrBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Check if this backend is available (dependencies installed).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Run OCR on an image file.
    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError>;

    /// Run OCR on in-memory image bytes via a temporary file.
    fn ocr_image_bytes(&self, bytes: &[u8]) -> Result<OcrResult, OcrError> {
        let mut file = tempfile::Builder::new()
            .prefix("page-")
            .suffix(".img")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        self.ocr_image(file.path())
    }
}

/// Whether `name` resolves to an executable in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}
