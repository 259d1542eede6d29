//! Service layer for manual extraction.
//!
//! Domain logic separated from UI concerns; the CLI consumes it through
//! progress events and result structs.

pub mod batch;
pub mod extraction;

pub use batch::{BatchEvent, BatchOrchestrator, BatchStats};
pub use extraction::{
    DocumentExtractionController, DocumentReport, DocumentVerdict, ExtractionError,
};
