//! Throttle configuration and statistics.

use std::time::Duration;

use crate::config::ExtractionConfig;

/// Pacing policy shared by every worker.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Minimum spacing between any two requests.
    pub min_interval: Duration,
    /// First pause after a blocked page.
    pub backoff_initial: Duration,
    /// Cap for the escalating pause.
    pub backoff_max: Duration,
    /// Multiplier applied on each new block.
    pub backoff_multiplier: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(300),
            backoff_initial: Duration::from_secs(30),
            backoff_max: Duration::from_secs(180),
            backoff_multiplier: 2.0,
        }
    }
}

impl From<&ExtractionConfig> for ThrottleConfig {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_request_interval_ms),
            backoff_initial: Duration::from_secs(config.block_backoff_initial_secs),
            backoff_max: Duration::from_secs(config.block_backoff_max_secs),
            ..Default::default()
        }
    }
}

/// Snapshot of throttle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleStats {
    pub total_requests: u64,
    pub blocked_hits: u64,
    /// Backoff that the next block escalates from, if any.
    pub current_backoff: Option<Duration>,
    /// Whether requests are currently held by a block window.
    pub in_backoff: bool,
}
