//! Batch service types and events.

use std::path::PathBuf;
use std::time::Duration;

use crate::extract::ExtractionMode;

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// Worklist filtered against the checkpoint
    Planned { pending: usize, skipped: usize },
    /// Worker launched its browser session
    WorkerStarted { worker_id: usize },
    /// Document extraction started
    DocumentStarted {
        worker_id: usize,
        document_id: String,
        name: String,
        retry: u32,
    },
    /// Document written to final storage
    DocumentCompleted {
        worker_id: usize,
        document_id: String,
        pages: usize,
        chars: usize,
        mode: ExtractionMode,
        output: PathBuf,
    },
    /// Attempt failed; the document may come back from the retry queue
    DocumentFailed {
        worker_id: usize,
        document_id: String,
        error: String,
        will_retry: bool,
    },
    /// Retry budget exhausted; recorded as done and abandoned
    DocumentAbandoned {
        worker_id: usize,
        document_id: String,
        error: String,
    },
    /// Browser session recycled between documents
    SessionRestarted { worker_id: usize, reason: String },
    /// Worker stopped on an unrecoverable error
    WorkerFailed { worker_id: usize, error: String },
    /// Worker ran out of work or was stopped
    WorkerFinished { worker_id: usize },
}

/// Aggregate results of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    /// Documents in the worklist.
    pub total: usize,
    /// Already done before the run.
    pub skipped: usize,
    pub succeeded: usize,
    /// Failed attempts (a document can fail more than once).
    pub failed: usize,
    pub abandoned: usize,
    /// Attempts taken from the retry queue.
    pub retried: usize,
    pub interrupted: usize,
    /// Documents left unfinished (stop requested or workers lost).
    pub remaining: usize,
    pub total_chars: usize,
    pub total_pages: usize,
    pub text_count: usize,
    pub ocr_count: usize,
    pub restarts: usize,
    pub elapsed: Duration,
}

impl BatchStats {
    /// Completed documents per minute.
    pub fn documents_per_minute(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.succeeded as f64 * 60.0 / secs
    }

    /// Extracted characters per second.
    pub fn chars_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.total_chars as f64 / secs
    }
}
