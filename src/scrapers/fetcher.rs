//! Single-page loading with block detection.
//!
//! The fetcher never retries: the caller decides whether a failed load is
//! a first-page abandon or one more tick of the failure budget.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::browser::{BrowserDriver, DriverError};
use crate::config::ViewerSelectors;

/// Phrases that mark a block/rate-limit interstitial.
pub const DEFAULT_BLOCK_PHRASES: &[&str] = &[
    "too many requests",
    "rate limit",
    "captcha",
    "access denied",
    "unusual traffic",
];

/// Why a page could not be loaded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Timed out loading {locator} after {timeout:?}")]
    Timeout { locator: String, timeout: Duration },

    #[error("Failed to load {locator}: {reason}")]
    NetworkFailure { locator: String, reason: String },

    #[error("Blocked loading {locator} (matched \"{phrase}\")")]
    Blocked { locator: String, phrase: String },
}

impl LoadError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// A page the browser has navigated to, with the facts read at load time.
pub struct LoadedPage<'a> {
    pub driver: &'a dyn BrowserDriver,
    pub locator: String,
    pub body_text: String,
    pub title: String,
    /// Whether the viewer text container was already present.
    pub has_viewer: bool,
}

impl std::fmt::Debug for LoadedPage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPage")
            .field("locator", &self.locator)
            .field("title", &self.title)
            .field("has_viewer", &self.has_viewer)
            .field("body_chars", &self.body_text.len())
            .finish()
    }
}

/// Loads one locator through the browser capability.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    viewer_selector: String,
    block_phrases: Vec<String>,
}

impl PageFetcher {
    pub fn new(selectors: &ViewerSelectors) -> Self {
        Self {
            viewer_selector: selectors.text_container.clone(),
            block_phrases: DEFAULT_BLOCK_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    /// Replace the block phrase set (matched case-insensitively).
    pub fn with_block_phrases(mut self, phrases: Vec<String>) -> Self {
        self.block_phrases = phrases.into_iter().map(|p| p.to_lowercase()).collect();
        self
    }

    /// Navigate to `locator` and read the page summary.
    pub async fn load<'a>(
        &self,
        driver: &'a dyn BrowserDriver,
        locator: &str,
        timeout: Duration,
    ) -> Result<LoadedPage<'a>, LoadError> {
        debug!("Loading {}", locator);

        driver
            .navigate(locator, timeout)
            .await
            .map_err(|e| match e {
                DriverError::Timeout(_) => LoadError::Timeout {
                    locator: locator.to_string(),
                    timeout,
                },
                other => LoadError::NetworkFailure {
                    locator: locator.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let summary = driver
            .evaluate(&self.summary_script())
            .await
            .map_err(|e| LoadError::NetworkFailure {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;

        let body_text = summary
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let title = summary
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let has_viewer = summary
            .get("hasViewer")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        // Manual text may legitimately mention "rate limit"; only pages
        // without the viewer are checked.
        if !has_viewer {
            if let Some(phrase) = self.detect_block(&body_text) {
                return Err(LoadError::Blocked {
                    locator: locator.to_string(),
                    phrase: phrase.to_string(),
                });
            }
        }

        Ok(LoadedPage {
            driver,
            locator: locator.to_string(),
            body_text,
            title,
            has_viewer,
        })
    }

    /// First block phrase contained in `text`, if any.
    pub fn detect_block(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.block_phrases
            .iter()
            .find(|phrase| lower.contains(phrase.as_str()))
            .map(|p| p.as_str())
    }

    fn summary_script(&self) -> String {
        let selector = serde_json::Value::String(self.viewer_selector.clone()).to_string();
        format!(
            r#"(() => ({{
                hasViewer: document.querySelector({selector}) !== null,
                text: document.body ? document.body.innerText : '',
                title: document.title || ''
            }}))()"#
        )
    }
}
