//! Browser session ownership, health tracking and restarts.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{BrowserDriver, BrowserLauncher, DriverError, MemoryProbe};
use crate::config::ExtractionConfig;

/// Launch attempts made by one restart before giving up.
const RELAUNCH_ATTEMPTS: u32 = 3;

/// Memory is sampled once every this many pages.
const MEMORY_SAMPLE_EVERY: u32 = 10;

/// Why a session must be recycled before the next fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// Served `pages_before_restart` pages.
    PageBudget,
    /// Hit `failure_budget` consecutive failures.
    FailureBudget,
    /// Browser processes grew past `max_browser_memory_mb`.
    MemoryExceeded,
}

impl std::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PageBudget => write!(f, "page budget reached"),
            Self::FailureBudget => write!(f, "consecutive failure budget reached"),
            Self::MemoryExceeded => write!(f, "browser memory exceeded"),
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHealth {
    pub pages_served_since_restart: u32,
    pub elapsed: Duration,
    pub consecutive_failures: u32,
    pub memory_footprint_mb: Option<u64>,
}

/// Restart thresholds.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub pages_before_restart: u32,
    pub failure_budget: u32,
    /// Zero disables the memory trigger.
    pub max_memory_mb: u64,
    pub settle: Duration,
}

impl From<&ExtractionConfig> for SessionLimits {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            pages_before_restart: config.pages_before_restart,
            failure_budget: config.failure_budget,
            max_memory_mb: config.max_browser_memory_mb,
            settle: config.restart_settle(),
        }
    }
}

/// One live browser plus the counters that decide when to recycle it.
pub struct BrowserSession {
    launcher: Arc<dyn BrowserLauncher>,
    memory: Arc<dyn MemoryProbe>,
    limits: SessionLimits,
    driver: Box<dyn BrowserDriver>,
    started: Instant,
    pages_served: u32,
    consecutive_failures: u32,
    memory_mb: Option<u64>,
    restarts: u32,
}

impl BrowserSession {
    /// Launch a fresh browser.
    pub async fn launch(
        launcher: Arc<dyn BrowserLauncher>,
        memory: Arc<dyn MemoryProbe>,
        limits: SessionLimits,
    ) -> Result<Self, DriverError> {
        let driver = launcher.launch().await?;
        info!("Browser session started");
        Ok(Self {
            launcher,
            memory,
            limits,
            driver,
            started: Instant::now(),
            pages_served: 0,
            consecutive_failures: 0,
            memory_mb: None,
            restarts: 0,
        })
    }

    pub fn driver(&self) -> &dyn BrowserDriver {
        self.driver.as_ref()
    }

    pub fn health(&self) -> SessionHealth {
        SessionHealth {
            pages_served_since_restart: self.pages_served,
            elapsed: self.started.elapsed(),
            consecutive_failures: self.consecutive_failures,
            memory_footprint_mb: self.memory_mb,
        }
    }

    /// Number of restarts performed over the session's lifetime.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Open a fresh failure budget for the next document.
    pub fn begin_document(&mut self) {
        self.consecutive_failures = 0;
    }

    /// A page produced usable content.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.note_page_served();
    }

    /// A page failed to load or came back empty.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.note_page_served();
    }

    fn note_page_served(&mut self) {
        self.pages_served += 1;
        if self.limits.max_memory_mb > 0 && self.pages_served % MEMORY_SAMPLE_EVERY == 0 {
            self.memory_mb = self.memory.browser_memory_mb();
        }
    }

    /// Whether the session must be recycled before the next fetch.
    pub fn restart_due(&self) -> Option<RestartReason> {
        if self.consecutive_failures >= self.limits.failure_budget {
            return Some(RestartReason::FailureBudget);
        }
        if self.limits.max_memory_mb > 0
            && self
                .memory_mb
                .is_some_and(|mb| mb > self.limits.max_memory_mb)
        {
            return Some(RestartReason::MemoryExceeded);
        }
        if self.pages_served >= self.limits.pages_before_restart {
            return Some(RestartReason::PageBudget);
        }
        None
    }

    /// Close and relaunch the browser. Completes (settle delay included)
    /// before returning so no fetch ever reuses the stale browser.
    pub async fn restart(&mut self) -> Result<(), DriverError> {
        info!(
            "Restarting browser session after {} pages ({} consecutive failures)",
            self.pages_served, self.consecutive_failures
        );

        if let Err(e) = self.driver.close().await {
            warn!("Closing browser before restart failed: {}", e);
        }
        tokio::time::sleep(self.limits.settle).await;

        let mut last_error = DriverError::Closed;
        for attempt in 1..=RELAUNCH_ATTEMPTS {
            match self.launcher.launch().await {
                Ok(driver) => {
                    self.driver = driver;
                    self.started = Instant::now();
                    self.pages_served = 0;
                    self.consecutive_failures = 0;
                    self.memory_mb = None;
                    self.restarts += 1;
                    debug!("Browser relaunched on attempt {}", attempt);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Browser relaunch attempt {} failed: {}", attempt, e);
                    last_error = e;
                    tokio::time::sleep(self.limits.settle).await;
                }
            }
        }

        Err(last_error)
    }

    pub async fn close(&mut self) {
        if let Err(e) = self.driver.close().await {
            debug!("Browser close failed: {}", e);
        }
    }
}
