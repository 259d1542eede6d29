//! Extraction controller types.

use std::path::PathBuf;

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::extract::ExtractionMode;
use crate::models::{PageCount, PageResult};
use crate::scrapers::{DriverError, LoadError, RestartReason};
use crate::storage::StorageError;

/// Failure kinds seen while extracting a document.
///
/// Page-level kinds are recovered inside the controller through the
/// failure budget; only `DocumentBelowMinimumContent` and first-page
/// failures reach the batch, as retry-eligible verdicts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Page {page} timed out")]
    LoadTimeout { page: u32 },

    #[error("Page {page} blocked (matched \"{phrase}\")")]
    LoadBlocked { page: u32, phrase: String },

    #[error("Page {page} failed to load: {reason}")]
    LoadFailed { page: u32, reason: String },

    #[error("Page {page} content never rendered")]
    SelectorNotFound { page: u32 },

    #[error("Page {page} yielded no usable content")]
    EmptyContent { page: u32 },

    #[error("Browser memory exceeded ({footprint_mb:?} MiB)")]
    SessionMemoryExceeded { footprint_mb: Option<u64> },

    #[error("Document has {chars} characters, below the {minimum} minimum")]
    DocumentBelowMinimumContent { chars: usize, minimum: usize },
}

impl ExtractionError {
    pub fn from_load(page: u32, err: &LoadError) -> Self {
        match err {
            LoadError::Timeout { .. } => Self::LoadTimeout { page },
            LoadError::Blocked { phrase, .. } => Self::LoadBlocked {
                page,
                phrase: phrase.clone(),
            },
            LoadError::NetworkFailure { reason, .. } => Self::LoadFailed {
                page,
                reason: reason.clone(),
            },
        }
    }
}

/// Errors that end a document run without a verdict.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Browser session could not be restarted: {0}")]
    Session(#[from] DriverError),
}

/// How one pass over a document (one session lifetime) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Reached the last page.
    Completed,
    /// Session must be recycled; resume at the page after the last good one.
    RestartRequested(RestartReason),
    /// Page 1 could not be loaded, so there is no loop bound.
    Abandoned(ExtractionError),
    /// Stop was requested; partial content and cursor stay in place.
    Interrupted,
}

/// One controller pass over one document.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    pub start_page: u32,
    /// Pages appended during this pass, in page order.
    pub pages_extracted: Vec<PageResult>,
    pub total_pages_declared: PageCount,
    /// Recoverable page failures seen during this pass.
    pub page_errors: Vec<ExtractionError>,
    pub outcome: AttemptOutcome,
}

impl ExtractionAttempt {
    pub fn new(start_page: u32, total_pages_declared: PageCount) -> Self {
        Self {
            start_page,
            pages_extracted: Vec::new(),
            total_pages_declared,
            page_errors: Vec::new(),
            outcome: AttemptOutcome::Completed,
        }
    }
}

/// Final word on a document run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentVerdict {
    /// Written to final storage and marked done.
    Completed { output: PathBuf },
    /// Nothing written; eligible for a whole-document retry.
    Failed(ExtractionError),
    /// Stopped before finishing.
    Interrupted,
}

/// Summary of one document run.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub document_id: String,
    pub verdict: DocumentVerdict,
    pub attempts: Vec<ExtractionAttempt>,
    pub total_pages: PageCount,
    /// Pages held for the document (previously flushed plus new).
    pub pages: usize,
    pub total_chars: usize,
    pub mode: ExtractionMode,
    /// Session restarts performed while extracting this document.
    pub restarts: u32,
}

impl DocumentReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.verdict, DocumentVerdict::Completed { .. })
    }
}
