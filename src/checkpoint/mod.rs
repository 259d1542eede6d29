//! Durable per-document progress.
//!
//! The checkpoint records, per category, which documents are done (or
//! abandoned) and the resume cursor of documents still in flight:
//!
//! ```json
//! {"laptops": {"done": ["3f2a..."], "partial": {"9c1e...": 14}, "abandoned": []}}
//! ```

mod store;

pub use store::JsonCheckpointStore;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from checkpoint persistence.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Progress of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryProgress {
    #[serde(default)]
    pub done: BTreeSet<String>,
    /// Resume cursor (next page to fetch) per in-flight document.
    #[serde(default)]
    pub partial: BTreeMap<String, u32>,
    /// Subset of `done` that ended without usable content.
    #[serde(default)]
    pub abandoned: BTreeSet<String>,
}

/// Whole checkpoint keyed by category.
pub type CheckpointSnapshot = BTreeMap<String, CategoryProgress>;

/// Progress store shared by every worker.
///
/// Each mutation is persisted before it becomes visible; a failed write
/// leaves both the file and the in-memory view at the prior state.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn is_done(&self, category: &str, id: &str) -> bool;

    /// Record completion and drop any resume cursor.
    async fn mark_done(&self, category: &str, id: &str) -> Result<(), CheckpointError>;

    /// Record a permanent failure; the document also counts as done.
    async fn mark_abandoned(&self, category: &str, id: &str) -> Result<(), CheckpointError>;

    /// Next page to fetch; 1 when nothing is recorded.
    async fn resume_cursor(&self, category: &str, id: &str) -> u32;

    async fn set_resume_cursor(
        &self,
        category: &str,
        id: &str,
        page: u32,
    ) -> Result<(), CheckpointError>;

    async fn clear_resume_cursor(&self, category: &str, id: &str) -> Result<(), CheckpointError>;

    /// Forget everything about one document so it is extracted again.
    async fn reset_document(&self, category: &str, id: &str) -> Result<bool, CheckpointError>;

    /// Make every abandoned document of a category eligible again.
    async fn clear_abandoned(&self, category: &str) -> Result<usize, CheckpointError>;

    async fn snapshot(&self) -> CheckpointSnapshot;
}
