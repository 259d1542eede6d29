//! Browser automation capability and session lifecycle.
//!
//! The engine only needs three operations from a browser: navigate,
//! evaluate a script, and wait for a selector. They are expressed as the
//! `BrowserDriver` trait so the extraction loop can run against chromiumoxide
//! (CDP) in production and scripted fakes in tests.

#[cfg(feature = "browser")]
mod chrome;
mod memory;
mod session;

#[cfg(feature = "browser")]
pub use chrome::ChromeLauncher;
pub use memory::{MemoryProbe, NoMemoryProbe, ProcessMemoryProbe};
pub use session::{BrowserSession, RestartReason, SessionHealth, SessionLimits};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the browser capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("Navigation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Selector not found within wait budget: {0}")]
    SelectorNotFound(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Browser session is closed")]
    Closed,
}

/// One live browser tab.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to `url` and wait until the DOM is ready.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Evaluate a JavaScript expression in the current page.
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, DriverError>;

    /// Wait until `selector` matches an element in the current page.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), DriverError>;

    /// Close the tab and its browser.
    async fn close(&self) -> Result<(), DriverError>;
}

/// Creates fresh browser tabs; called on session launch and every restart.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverError>;
}
