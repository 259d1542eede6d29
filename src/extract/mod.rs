//! Page content extraction.
//!
//! A loaded page is turned into a `PageResult` by trying an ordered chain
//! of strategies (DOM text layer, whole body, OCR over the page image)
//! until one yields at least `min_page_chars` characters.

mod page_count;
mod strategy;

pub use page_count::parse_page_count;
pub use strategy::{extract_background_url, resolve_image_url, ExtractionMode, ExtractionStrategy};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::{ExtractionConfig, ViewerSelectors};
use crate::models::{PageCount, PageResult};
use crate::ocr::{ImageFetcher, OcrBackend, OcrError};
use crate::scrapers::{DriverError, LoadedPage};
use strategy::{background_style_script, element_text_script, BODY_TEXT_SCRIPT};

/// Why a single strategy produced nothing usable.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Selector {0} did not render")]
    SelectorNotFound(String),

    #[error("Only {chars} characters extracted")]
    EmptyContent { chars: usize },

    #[error("No page image found")]
    NoImage,

    #[error("OCR fallback not configured")]
    OcrUnavailable,

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Ocr(#[from] OcrError),
}

/// OCR collaborators: the recognizer and the image downloader.
#[derive(Clone)]
pub struct OcrFallback {
    pub backend: Arc<dyn OcrBackend>,
    pub images: Arc<dyn ImageFetcher>,
}

/// Maps a loaded page to text via the strategy chain.
#[derive(Clone)]
pub struct PageContentExtractor {
    selectors: ViewerSelectors,
    min_page_chars: usize,
    selector_timeout: Duration,
    ocr: Option<OcrFallback>,
}

impl PageContentExtractor {
    pub fn new(selectors: ViewerSelectors, config: &ExtractionConfig) -> Self {
        Self {
            selectors,
            min_page_chars: config.min_page_chars,
            selector_timeout: config.selector_timeout(),
            ocr: None,
        }
    }

    pub fn with_ocr(mut self, ocr: OcrFallback) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Run the chain for `mode`, returning the first usable result.
    ///
    /// When nothing is usable the error of the first strategy that could
    /// not even find its content is preferred over a later "too short".
    pub async fn extract(
        &self,
        page: &LoadedPage<'_>,
        page_number: u32,
        mode: ExtractionMode,
    ) -> Result<PageResult, ExtractError> {
        let mut failure = ExtractError::EmptyContent { chars: 0 };
        for strategy in ExtractionStrategy::chain(mode) {
            match self.apply(*strategy, page, page_number).await {
                Ok(result) => {
                    debug!(
                        "Page {}: {} chars via {}",
                        page_number, result.char_count, result.extraction_method
                    );
                    return Ok(result);
                }
                Err(e) => {
                    debug!("Page {}: {:?} gave nothing ({})", page_number, strategy, e);
                    if !matches!(failure, ExtractError::SelectorNotFound(_)) {
                        failure = e;
                    }
                }
            }
        }
        Err(failure)
    }

    /// Apply one strategy; only usable results are returned as `Ok`.
    pub async fn apply(
        &self,
        strategy: ExtractionStrategy,
        page: &LoadedPage<'_>,
        page_number: u32,
    ) -> Result<PageResult, ExtractError> {
        let text = match strategy {
            ExtractionStrategy::DomText => self.dom_text(page).await?,
            ExtractionStrategy::BodyFallback => self.body_text(page).await,
            ExtractionStrategy::Ocr => self.ocr_text(page).await?,
        };

        let result = PageResult::new(page_number, &text, strategy.method());
        if result.is_usable(self.min_page_chars) {
            Ok(result)
        } else {
            Err(ExtractError::EmptyContent {
                chars: result.char_count,
            })
        }
    }

    /// Read the declared page count from page 1.
    pub async fn discover_page_count(&self, page: &LoadedPage<'_>, max_pages: u32) -> PageCount {
        let indicator = match self.selectors.page_count_indicator {
            Some(ref selector) => self.read_text(page, selector).await,
            None => None,
        };
        let heading = self
            .read_text(page, &self.selectors.title)
            .await
            .unwrap_or_default();
        let title = format!("{} {}", heading, page.title);

        parse_page_count(indicator.as_deref(), &title, &page.body_text, max_pages)
    }

    async fn read_text(&self, page: &LoadedPage<'_>, selector: &str) -> Option<String> {
        page.driver
            .evaluate(&element_text_script(selector))
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.trim().is_empty())
    }

    async fn dom_text(&self, page: &LoadedPage<'_>) -> Result<String, ExtractError> {
        let selector = &self.selectors.text_container;
        if !page.has_viewer {
            page.driver
                .wait_for_selector(selector, self.selector_timeout)
                .await
                .map_err(|e| match e {
                    DriverError::SelectorNotFound(s) => ExtractError::SelectorNotFound(s),
                    DriverError::Timeout(_) => ExtractError::SelectorNotFound(selector.clone()),
                    other => ExtractError::Driver(other),
                })?;
        }

        let value = page.driver.evaluate(&element_text_script(selector)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn body_text(&self, page: &LoadedPage<'_>) -> String {
        match page.driver.evaluate(BODY_TEXT_SCRIPT).await {
            Ok(value) => value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| page.body_text.clone()),
            Err(_) => page.body_text.clone(),
        }
    }

    async fn ocr_text(&self, page: &LoadedPage<'_>) -> Result<String, ExtractError> {
        let ocr = self.ocr.as_ref().ok_or(ExtractError::OcrUnavailable)?;
        let selector = &self.selectors.background_image;

        page.driver
            .wait_for_selector(selector, self.selector_timeout)
            .await
            .map_err(|_| ExtractError::SelectorNotFound(selector.clone()))?;

        let style = page
            .driver
            .evaluate(&background_style_script(selector))
            .await?;
        let raw = style
            .as_str()
            .and_then(extract_background_url)
            .ok_or(ExtractError::NoImage)?;
        let image_url = resolve_image_url(&page.locator, &raw).ok_or(ExtractError::NoImage)?;

        let bytes = ocr.images.fetch(&image_url, &page.locator).await?;
        let backend = ocr.backend.clone();
        let result = tokio::task::spawn_blocking(move || backend.ocr_image_bytes(&bytes))
            .await
            .map_err(|e| OcrError::OcrFailed(format!("OCR task failed: {}", e)))??;

        debug!(
            "{} recognised {} bytes in {}ms",
            ocr.backend.name(),
            result.text.len(),
            result.processing_time_ms
        );
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::models::ExtractionMethod;
    use crate::ocr::OcrResult;
    use crate::scrapers::BrowserDriver;

    /// Answers scripts by substring match on the expression.
    #[derive(Default)]
    struct ScriptedDriver {
        answers: Vec<(&'static str, Value)>,
        selectors: HashMap<&'static str, bool>,
    }

    #[async_trait]
    impl BrowserDriver for ScriptedDriver {
        async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<(), DriverError> {
            Ok(())
        }
        async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
            Ok(self
                .answers
                .iter()
                .find(|(needle, _)| expression.contains(needle))
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null))
        }
        async fn wait_for_selector(
            &self,
            selector: &str,
            _timeout: Duration,
        ) -> Result<(), DriverError> {
            if self.selectors.get(selector).copied().unwrap_or(false) {
                Ok(())
            } else {
                Err(DriverError::SelectorNotFound(selector.to_string()))
            }
        }
        async fn close(&self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    struct EchoOcr;

    impl OcrBackend for EchoOcr {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn availability_hint(&self) -> String {
            String::new()
        }
        fn ocr_image(&self, path: &Path) -> Result<OcrResult, OcrError> {
            let text = std::fs::read_to_string(path)?;
            Ok(OcrResult {
                text,
                processing_time_ms: 1,
            })
        }
    }

    struct StaticImages;

    #[async_trait]
    impl ImageFetcher for StaticImages {
        async fn fetch(&self, url: &str, _referer: &str) -> Result<Vec<u8>, OcrError> {
            Ok(format!("recognised text from the image at {}", url).into_bytes())
        }
    }

    fn extractor() -> PageContentExtractor {
        PageContentExtractor::new(ViewerSelectors::default(), &ExtractionConfig::default())
    }

    fn loaded<'a>(driver: &'a ScriptedDriver, has_viewer: bool) -> LoadedPage<'a> {
        LoadedPage {
            driver,
            locator: "https://www.manua.ls/hp/x/manual?p=2".to_string(),
            body_text: String::new(),
            title: "HP X manual (12 pages)".to_string(),
            has_viewer,
        }
    }

    #[tokio::test]
    async fn test_dom_text_first() {
        let driver = ScriptedDriver {
            answers: vec![(".viewer-page", json!("Chapter 1: Safety instructions for the device"))],
            ..Default::default()
        };
        let result = extractor()
            .extract(&loaded(&driver, true), 2, ExtractionMode::Dom)
            .await
            .unwrap();
        assert_eq!(result.extraction_method, ExtractionMethod::DomText);
        assert_eq!(result.page_number, 2);
    }

    #[tokio::test]
    async fn test_body_fallback_when_viewer_missing() {
        let driver = ScriptedDriver {
            answers: vec![(
                "document.body",
                json!("This manual uses a different layout with plenty of body text"),
            )],
            ..Default::default()
        };
        let result = extractor()
            .extract(&loaded(&driver, false), 1, ExtractionMode::Dom)
            .await
            .unwrap();
        assert_eq!(result.extraction_method, ExtractionMethod::BodyFallback);
    }

    #[tokio::test]
    async fn test_short_text_fails() {
        let driver = ScriptedDriver {
            answers: vec![(".viewer-page", json!("tiny")), ("document.body", json!("tiny"))],
            ..Default::default()
        };
        let result = extractor()
            .extract(&loaded(&driver, true), 3, ExtractionMode::Dom)
            .await;
        assert!(matches!(result, Err(ExtractError::EmptyContent { chars: 4 })));
    }

    #[tokio::test]
    async fn test_ocr_mode_uses_background_image() {
        let driver = ScriptedDriver {
            answers: vec![(".bi", json!("background-image: url(\"/viewer/bg2.webp\")"))],
            selectors: HashMap::from([(".bi", true)]),
        };
        let extractor = extractor().with_ocr(OcrFallback {
            backend: Arc::new(EchoOcr),
            images: Arc::new(StaticImages),
        });
        let result = extractor
            .extract(&loaded(&driver, true), 2, ExtractionMode::Ocr)
            .await
            .unwrap();
        assert_eq!(result.extraction_method, ExtractionMethod::Ocr);
        assert!(result
            .text
            .ends_with("https://www.manua.ls/viewer/bg2.webp"));
    }

    #[tokio::test]
    async fn test_ocr_mode_without_backend_fails() {
        let driver = ScriptedDriver::default();
        let result = extractor()
            .extract(&loaded(&driver, true), 4, ExtractionMode::Ocr)
            .await;
        assert!(matches!(result, Err(ExtractError::OcrUnavailable)));
    }

    #[tokio::test]
    async fn test_discover_page_count_from_title() {
        let driver = ScriptedDriver::default();
        let count = extractor()
            .discover_page_count(&loaded(&driver, true), 2000)
            .await;
        assert_eq!(count, PageCount::Declared(12));
    }
}
