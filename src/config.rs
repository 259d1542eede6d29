//! Configuration for the manual extraction engine.
//!
//! Settings come from (lowest to highest priority):
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, or `./manuals.toml` when present)
//! 3. Environment variables (`MANUALS_*`, `BROWSER_URL`, ...)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::scrapers::DEFAULT_BLOCK_PHRASES;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILENAME: &str = "manuals.toml";

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory for finished text files (`{output_dir}/{category}/{group}/`).
    pub output_dir: PathBuf,
    /// Directory for per-document partial page logs.
    pub partial_dir: PathBuf,
    /// Checkpoint JSON file.
    pub checkpoint_path: PathBuf,
    /// URL cache produced by the listing crawl.
    pub url_cache: PathBuf,
    /// Number of independent workers (each owns a browser session).
    pub workers: usize,
    pub extraction: ExtractionConfig,
    pub selectors: ViewerSelectors,
    pub browser: BrowserEngineConfig,
    pub ocr: OcrSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            partial_dir: PathBuf::from("partial_content"),
            checkpoint_path: PathBuf::from("progress/checkpoint.json"),
            url_cache: PathBuf::from("manual_urls_cache.json"),
            workers: 1,
            extraction: ExtractionConfig::default(),
            selectors: ViewerSelectors::default(),
            browser: BrowserEngineConfig::default(),
            ocr: OcrSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an explicit file, the default file, or defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        Ok(settings.with_env_overrides().expand_paths())
    }

    /// Parse a TOML settings file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env_path("MANUALS_OUTPUT_DIR") {
            self.output_dir = dir;
        }
        if let Some(dir) = env_path("MANUALS_PARTIAL_DIR") {
            self.partial_dir = dir;
        }
        if let Some(path) = env_path("MANUALS_CHECKPOINT") {
            self.checkpoint_path = path;
        }
        if let Some(path) = env_path("MANUALS_URL_CACHE") {
            self.url_cache = path;
        }
        if let Some(workers) = env_parse::<usize>("MANUALS_WORKERS") {
            self.workers = workers.max(1);
        }
        if let Some(ms) = env_parse::<u64>("MANUALS_MIN_REQUEST_INTERVAL_MS") {
            self.extraction.min_request_interval_ms = ms;
        }
        if let Ok(lang) = std::env::var("TESSERACT_LANG") {
            if !lang.is_empty() {
                self.ocr.language = lang;
            }
        }
        self.browser = self.browser.with_env_overrides();
        self
    }

    fn expand_paths(mut self) -> Self {
        self.output_dir = expand(&self.output_dir);
        self.partial_dir = expand(&self.partial_dir);
        self.checkpoint_path = expand(&self.checkpoint_path);
        self.url_cache = expand(&self.url_cache);
        self
    }

    /// Create output, partial and checkpoint directories.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;
        std::fs::create_dir_all(&self.partial_dir)
            .with_context(|| format!("Failed to create {}", self.partial_dir.display()))?;
        if let Some(parent) = self.checkpoint_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        Ok(())
    }
}

/// Thresholds and timings for the extraction state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Shortest page text accepted as real content.
    pub min_page_chars: usize,
    /// Shortest total document text written to final storage.
    pub min_document_chars: usize,
    /// Consecutive page failures (load errors and empty pages) before a restart.
    pub failure_budget: u32,
    /// Pages served by one browser session before it is recycled.
    pub pages_before_restart: u32,
    /// Resident memory of browser processes that forces a restart (0 disables).
    pub max_browser_memory_mb: u64,
    /// Whole-document retries after the first attempt before abandoning.
    pub max_document_retries: u32,
    /// Leading pages on which DOM extraction must fail before switching to OCR.
    pub ocr_probe_pages: u32,
    /// Navigation timeout per page.
    pub page_load_timeout_ms: u64,
    /// Wait budget for the viewer marker to render.
    pub selector_timeout_ms: u64,
    /// Pause after relaunching a browser session.
    pub restart_settle_ms: u64,
    /// Minimum spacing between any two requests across all workers.
    pub min_request_interval_ms: u64,
    /// First pause after a blocked page.
    pub block_backoff_initial_secs: u64,
    /// Cap for the doubling block backoff.
    pub block_backoff_max_secs: u64,
    /// Retry queue is drained every this many primary documents.
    pub retry_every_documents: usize,
    /// Maximum number of documents held for retry.
    pub retry_queue_capacity: usize,
    /// Consecutive under-threshold documents before a worker recycles its session.
    pub empty_documents_before_restart: u32,
    /// Upper bound on pages per document, whatever the source declares.
    pub max_pages: u32,
    /// Pause between documents on one worker.
    pub inter_document_delay_ms: u64,
    /// Phrases marking a block interstitial (matched case-insensitively).
    pub block_phrases: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_page_chars: 30,
            min_document_chars: 100,
            failure_budget: 5,
            pages_before_restart: 50,
            max_browser_memory_mb: 1500,
            max_document_retries: 3,
            ocr_probe_pages: 3,
            page_load_timeout_ms: 8_000,
            selector_timeout_ms: 15_000,
            restart_settle_ms: 1_000,
            min_request_interval_ms: 300,
            block_backoff_initial_secs: 30,
            block_backoff_max_secs: 180,
            retry_every_documents: 5,
            retry_queue_capacity: 500,
            empty_documents_before_restart: 3,
            max_pages: 2_000,
            inter_document_delay_ms: 1_000,
            block_phrases: DEFAULT_BLOCK_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl ExtractionConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    pub fn inter_document_delay(&self) -> Duration {
        Duration::from_millis(self.inter_document_delay_ms)
    }
}

/// Site-specific CSS selectors for the manual viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSelectors {
    /// Element holding a page's text layer.
    pub text_container: String,
    /// Element whose inline style carries the page image.
    pub background_image: String,
    /// Element showing "1 / N" style pagination, if the site has one.
    pub page_count_indicator: Option<String>,
    /// Manual title element.
    pub title: String,
}

impl Default for ViewerSelectors {
    fn default() -> Self {
        Self {
            text_container: ".viewer-page".to_string(),
            background_image: ".bi".to_string(),
            page_count_indicator: None,
            title: "h1".to_string(),
        }
    }
}

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    pub proxy: Option<String>,

    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    pub remote_url: Option<String>,

    /// User agent presented by every session.
    pub user_agent: String,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            chrome_args: Vec::new(),
            remote_url: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl BrowserEngineConfig {
    /// Apply `BROWSER_URL`, `BROWSER_HEADLESS` and `SOCKS_PROXY` overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("BROWSER_URL") {
            if !url.is_empty() {
                self.remote_url = Some(url);
            }
        }
        if let Ok(val) = std::env::var("BROWSER_HEADLESS") {
            self.headless = !(val == "0" || val.eq_ignore_ascii_case("false"));
        }
        if let Ok(proxy) = std::env::var("SOCKS_PROXY") {
            if !proxy.is_empty() {
                self.proxy = Some(proxy);
            }
        }
        self
    }
}

/// OCR fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language (e.g. "eng", "eng+spa").
    pub language: String,
    /// Tesseract page segmentation mode.
    pub psm: u8,
    /// Tesseract engine mode.
    pub oem: u8,
    /// Download timeout for page images.
    pub image_timeout_secs: u64,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            psm: 1,
            oem: 3,
            image_timeout_secs: 10,
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
