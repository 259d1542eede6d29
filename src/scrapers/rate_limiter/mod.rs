//! Global request pacing.
//!
//! One throttle is shared by every worker so the aggregate request rate,
//! not the per-worker rate, respects the minimum interval. Blocked pages
//! open a backoff window that doubles on each new block up to a cap, and
//! a clean page after the window closes resets it.

mod config;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use config::{ThrottleConfig, ThrottleStats};
use state::ThrottleState;

/// Shared minimum-interval gate with escalating block backoff.
#[derive(Debug, Clone)]
pub struct RequestThrottle {
    config: ThrottleConfig,
    state: Arc<Mutex<ThrottleState>>,
}

impl RequestThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    /// Wait until a request may be issued, then claim the slot.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let wait = state.time_until_ready(self.config.min_interval, now);
                if wait.is_zero() {
                    state.last_request = Some(now);
                    state.total_requests += 1;
                    return;
                }
                wait
            };

            debug!("Throttling: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Record a blocked page; returns the pause now in force.
    ///
    /// Blocks reported while a window is already open share that window.
    pub async fn report_blocked(&self) -> Duration {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if state.in_block_window(now) {
            if let Some(backoff) = state.current_backoff {
                return backoff;
            }
        }

        let next = match state.current_backoff {
            None => self.config.backoff_initial,
            Some(current) => {
                Duration::from_secs_f64(current.as_secs_f64() * self.config.backoff_multiplier)
                    .min(self.config.backoff_max)
            }
        };

        state.current_backoff = Some(next);
        state.blocked_until = Some(now + next);
        state.blocked_hits += 1;

        warn!("Blocked by source, backing off for {:?}", next);
        next
    }

    /// Record a clean page; clears the backoff once its window has passed.
    pub async fn report_success(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        if state.current_backoff.is_some() && !state.in_block_window(now) {
            state.current_backoff = None;
            state.blocked_until = None;
            info!("Recovered from block backoff");
        }
    }

    pub async fn stats(&self) -> ThrottleStats {
        let state = self.state.lock().await;
        ThrottleStats {
            total_requests: state.total_requests,
            blocked_hits: state.blocked_hits,
            current_backoff: state.current_backoff,
            in_backoff: state.in_block_window(Instant::now()),
        }
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}
