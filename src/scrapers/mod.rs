//! Browser-facing plumbing: sessions, page loading and request pacing.

pub mod browser;
pub mod fetcher;
pub mod rate_limiter;

#[cfg(feature = "browser")]
pub use browser::ChromeLauncher;
pub use browser::{
    BrowserDriver, BrowserLauncher, BrowserSession, DriverError, MemoryProbe, NoMemoryProbe,
    ProcessMemoryProbe, RestartReason, SessionHealth, SessionLimits,
};
pub use fetcher::{LoadError, LoadedPage, PageFetcher, DEFAULT_BLOCK_PHRASES};
pub use rate_limiter::{RequestThrottle, ThrottleConfig, ThrottleStats};
