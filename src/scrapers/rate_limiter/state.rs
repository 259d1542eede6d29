//! Mutable throttle state.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub(crate) struct ThrottleState {
    pub last_request: Option<Instant>,
    /// Requests are held until this instant after a block.
    pub blocked_until: Option<Instant>,
    pub current_backoff: Option<Duration>,
    pub total_requests: u64,
    pub blocked_hits: u64,
}

impl ThrottleState {
    /// How long the next request has to wait.
    pub fn time_until_ready(&self, min_interval: Duration, now: Instant) -> Duration {
        let spacing = self
            .last_request
            .map(|last| (last + min_interval).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        let block = self
            .blocked_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        spacing.max(block)
    }

    pub fn in_block_window(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }
}
