//! Document extraction service.
//!
//! `DocumentExtractionController` owns the page loop for one document:
//! page-count discovery, per-page extraction, failure budget, restarts
//! mid-document, incremental flushing and the final content gate.

mod controller;
mod types;

pub use controller::DocumentExtractionController;
pub use types::{
    AttemptOutcome, ControllerError, DocumentReport, DocumentVerdict, ExtractionAttempt,
    ExtractionError,
};
