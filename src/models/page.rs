//! Per-page extraction results.

use serde::{Deserialize, Serialize};

/// Method that produced a page's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Text layer of the viewer region.
    DomText,
    /// Whole-body text when the viewer region is absent or empty.
    BodyFallback,
    /// Tesseract over the page's background image.
    Ocr,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomText => "dom_text",
            Self::BodyFallback => "body_fallback",
            Self::Ocr => "ocr",
        }
    }

    pub fn is_ocr(&self) -> bool {
        matches!(self, Self::Ocr)
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Text extracted from one page. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub page_number: u32,
    pub text: String,
    pub char_count: usize,
    pub extraction_method: ExtractionMethod,
}

impl PageResult {
    /// Build a result from raw text (whitespace-trimmed).
    pub fn new(page_number: u32, text: &str, extraction_method: ExtractionMethod) -> Self {
        let text = text.trim().to_string();
        Self {
            page_number,
            char_count: text.chars().count(),
            text,
            extraction_method,
        }
    }

    /// Whether this page counts as real content.
    pub fn is_usable(&self, min_chars: usize) -> bool {
        self.char_count >= min_chars
    }
}

/// Page count as declared by the source.
///
/// The viewer's count comes from a heuristic over third-party markup, so a
/// missing or single-page count is `Unknown` and the page loop probes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageCount {
    Declared(u32),
    Unknown,
}
