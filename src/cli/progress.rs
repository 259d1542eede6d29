//! Progress display for batch extraction.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::services::BatchEvent;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}";

/// One bar counting finished documents, with a line per notable event.
pub struct ExtractionProgress {
    bar: ProgressBar,
}

impl ExtractionProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Render one batch event.
    pub fn handle(&self, event: &BatchEvent) {
        match event {
            BatchEvent::Planned { pending, .. } => {
                self.bar.set_length(*pending as u64);
            }
            BatchEvent::DocumentStarted { name, retry, .. } => {
                if *retry > 0 {
                    self.bar.set_message(format!("{} (retry {})", name, retry));
                } else {
                    self.bar.set_message(name.clone());
                }
            }
            BatchEvent::DocumentCompleted {
                pages, chars, mode, ..
            } => {
                self.bar.inc(1);
                self.bar.set_message(format!(
                    "last: {} pages, {} chars ({})",
                    pages, chars, mode
                ));
            }
            BatchEvent::DocumentFailed {
                document_id, error, ..
            } => {
                self.bar.println(format!(
                    "{} {} will be retried: {}",
                    style("!").yellow(),
                    document_id,
                    error
                ));
            }
            BatchEvent::DocumentAbandoned {
                document_id, error, ..
            } => {
                self.bar.inc(1);
                self.bar.println(format!(
                    "{} Abandoned {}: {}",
                    style("✗").red(),
                    document_id,
                    error
                ));
            }
            BatchEvent::SessionRestarted { worker_id, reason } => {
                self.bar.println(format!(
                    "{} Worker {} restarted its browser ({})",
                    style("→").dim(),
                    worker_id,
                    reason
                ));
            }
            BatchEvent::WorkerFailed { worker_id, error } => {
                self.bar.println(format!(
                    "{} Worker {} stopped: {}",
                    style("✗").red(),
                    worker_id,
                    error
                ));
            }
            BatchEvent::WorkerStarted { .. } | BatchEvent::WorkerFinished { .. } => {}
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
