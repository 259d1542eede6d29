//! Shared helper functions for CLI commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::style;
use tracing::warn;

use crate::checkpoint::JsonCheckpointStore;
use crate::config::Settings;
use crate::extract::OcrFallback;
use crate::models::{Document, UrlCache};
use crate::ocr::{HttpImageFetcher, OcrBackend, TesseractBackend};

/// Read the URL cache and build the filtered worklist.
pub fn load_worklist(
    cache_path: &Path,
    categories: &[String],
    brand: Option<&str>,
) -> anyhow::Result<Vec<Document>> {
    let cache = UrlCache::load(cache_path)?;
    Ok(cache.documents(categories, brand))
}

/// Open the checkpoint file named in settings.
pub fn open_checkpoint(settings: &Settings) -> anyhow::Result<Arc<JsonCheckpointStore>> {
    let store = JsonCheckpointStore::open(&settings.checkpoint_path).with_context(|| {
        format!(
            "Failed to open checkpoint {}",
            settings.checkpoint_path.display()
        )
    })?;
    Ok(Arc::new(store))
}

/// Tesseract plus an HTTP image fetcher, when Tesseract is installed.
pub fn build_ocr(settings: &Settings) -> anyhow::Result<Option<OcrFallback>> {
    let backend = TesseractBackend::new(settings.ocr.clone());
    if !backend.is_available() {
        warn!("OCR fallback disabled: {}", backend.availability_hint());
        println!(
            "{} OCR fallback disabled ({})",
            style("!").yellow(),
            backend.availability_hint()
        );
        return Ok(None);
    }

    let images = HttpImageFetcher::new(
        &settings.browser.user_agent,
        Duration::from_secs(settings.ocr.image_timeout_secs),
    )?;
    Ok(Some(OcrFallback {
        backend: Arc::new(backend),
        images: Arc::new(images),
    }))
}

/// Format a number with thousands separators.
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format seconds as `1h 02m 03s` / `2m 03s` / `3s`.
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
