//! Extraction strategies and the scripts they evaluate.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::ExtractionMethod;

/// `url(...)` inside an inline style attribute.
static STYLE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?([^"')]+)["']?\s*\)"#).expect("style url pattern should compile")
});

/// How a document's pages are read. OCR mode is sticky for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionMode {
    Dom,
    Ocr,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dom => "dom",
            Self::Ocr => "ocr",
        }
    }
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One way of turning a loaded page into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    DomText,
    BodyFallback,
    Ocr,
}

impl ExtractionStrategy {
    const DOM_CHAIN: &'static [ExtractionStrategy] = &[Self::DomText, Self::BodyFallback];
    const OCR_CHAIN: &'static [ExtractionStrategy] = &[Self::Ocr];

    /// Strategies to try, in order, for a page in `mode`.
    pub fn chain(mode: ExtractionMode) -> &'static [ExtractionStrategy] {
        match mode {
            ExtractionMode::Dom => Self::DOM_CHAIN,
            ExtractionMode::Ocr => Self::OCR_CHAIN,
        }
    }

    pub fn method(&self) -> ExtractionMethod {
        match self {
            Self::DomText => ExtractionMethod::DomText,
            Self::BodyFallback => ExtractionMethod::BodyFallback,
            Self::Ocr => ExtractionMethod::Ocr,
        }
    }
}

/// Quote `value` as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// innerText of the first element matching `selector`, or "".
pub(crate) fn element_text_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? (el.innerText || '') : ''; }})()",
        js_string(selector)
    )
}

pub(crate) const BODY_TEXT_SCRIPT: &str =
    "(() => document.body ? (document.body.innerText || '') : '')()";

/// Inline style (or computed background) of the page image element.
pub(crate) fn background_style_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return ''; \
         return el.getAttribute('style') || getComputedStyle(el).backgroundImage || ''; }})()",
        js_string(selector)
    )
}

/// Pull the image address out of a `background-image: url(...)` style.
pub fn extract_background_url(style: &str) -> Option<String> {
    STYLE_URL
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve a possibly relative image address against the page locator.
pub fn resolve_image_url(page_locator: &str, raw: &str) -> Option<String> {
    if let Ok(url) = Url::parse(raw) {
        return Some(url.to_string());
    }
    Url::parse(page_locator)
        .ok()?
        .join(raw)
        .ok()
        .map(|u| u.to_string())
}
