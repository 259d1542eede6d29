//! The per-document extraction state machine.
//!
//! Discovering (page 1 gives the page count) -> Extracting (pages from the
//! resume cursor onward) -> either a session restart followed by more
//! extracting from the page after the last good one, or the final verdict.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::types::{
    AttemptOutcome, ControllerError, DocumentReport, DocumentVerdict, ExtractionAttempt,
    ExtractionError,
};
use crate::checkpoint::CheckpointStore;
use crate::config::ExtractionConfig;
use crate::extract::{ExtractError, ExtractionMode, PageContentExtractor};
use crate::models::{Document, PageCount, PageResult};
use crate::scrapers::{
    BrowserSession, LoadError, LoadedPage, PageFetcher, RequestThrottle, RestartReason,
};
use crate::storage::{OutputWriter, PartialStore};

/// Outcome of extracting one loaded page.
enum PageStep {
    Extracted(PageResult),
    Failed(ExtractError),
    /// DOM failed on every probe page; re-read from the first missing page with OCR.
    SwitchedToOcr,
}

/// Progress of one document across passes.
struct DocState {
    pages: Vec<PageResult>,
    next_page: u32,
    last_good: u32,
    total: Option<PageCount>,
    mode: ExtractionMode,
    dom_succeeded: bool,
    leading_dom_failures: u32,
}

impl DocState {
    /// Resume from flushed pages and the checkpoint cursor, whichever is further.
    fn resume(pages: Vec<PageResult>, cursor: u32) -> Self {
        let last_flushed = pages.last().map(|p| p.page_number).unwrap_or(0);
        let next_page = cursor.max(last_flushed + 1).max(1);
        let mode = if pages.iter().any(|p| p.extraction_method.is_ocr()) {
            ExtractionMode::Ocr
        } else {
            ExtractionMode::Dom
        };
        let dom_succeeded = pages.iter().any(|p| !p.extraction_method.is_ocr());

        Self {
            pages,
            next_page,
            last_good: next_page - 1,
            total: None,
            mode,
            dom_succeeded,
            leading_dom_failures: 0,
        }
    }

    fn has_more(&self, max_pages: u32, ocr_probe_pages: u32) -> bool {
        match self.total {
            None => true,
            Some(PageCount::Declared(n)) => self.next_page <= n,
            // Keep probing while pages keep coming, or while the OCR probe
            // window is still open
            Some(PageCount::Unknown) => {
                self.next_page <= max_pages
                    && (self.last_good + 1 == self.next_page
                        || self.in_ocr_probe_window(ocr_probe_pages))
            }
        }
    }

    fn in_ocr_probe_window(&self, ocr_probe_pages: u32) -> bool {
        self.mode == ExtractionMode::Dom
            && !self.dom_succeeded
            && self.next_page <= ocr_probe_pages
    }

    fn total_chars(&self) -> usize {
        self.pages.iter().map(|p| p.char_count).sum()
    }
}

/// Drives one document through the browser, page by page.
#[derive(Clone)]
pub struct DocumentExtractionController {
    fetcher: PageFetcher,
    extractor: PageContentExtractor,
    throttle: RequestThrottle,
    checkpoint: Arc<dyn CheckpointStore>,
    partials: PartialStore,
    output: OutputWriter,
    config: ExtractionConfig,
    stop: watch::Receiver<bool>,
}

impl DocumentExtractionController {
    pub fn new(
        fetcher: PageFetcher,
        extractor: PageContentExtractor,
        throttle: RequestThrottle,
        checkpoint: Arc<dyn CheckpointStore>,
        partials: PartialStore,
        output: OutputWriter,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            throttle,
            checkpoint,
            partials,
            output,
            config,
            stop: watch::channel(false).1,
        }
    }

    /// Observe a stop flag; when it flips the current page finishes and the run halts.
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    fn stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Extract one document to a verdict, restarting `session` as needed.
    pub async fn extract_document(
        &self,
        session: &mut BrowserSession,
        doc: &Document,
    ) -> Result<DocumentReport, ControllerError> {
        session.begin_document();
        let flushed = self.partials.load(doc)?;
        let cursor = self.checkpoint.resume_cursor(&doc.category, &doc.id).await;
        let mut st = DocState::resume(flushed, cursor);
        if st.next_page > 1 {
            info!(
                "Resuming {} {} at page {} ({} pages flushed)",
                doc.group,
                doc.display_name,
                st.next_page,
                st.pages.len()
            );
        }

        let mut attempts = Vec::new();
        let mut restarts = 0u32;

        loop {
            if let Some(reason) = session.restart_due() {
                self.restart(session, reason).await?;
                restarts += 1;
            }

            let attempt = self.run_pass(session, doc, &mut st).await?;
            let outcome = attempt.outcome.clone();
            let progressed = !attempt.pages_extracted.is_empty();
            attempts.push(attempt);

            match outcome {
                AttemptOutcome::Completed => break,
                AttemptOutcome::Interrupted => {
                    info!("Stopped during {} at page {}", doc.id, st.next_page);
                    return Ok(self.report(doc, &st, attempts, restarts, DocumentVerdict::Interrupted));
                }
                AttemptOutcome::Abandoned(err) => {
                    warn!("Abandoning attempt on {}: {}", doc.id, err);
                    return Ok(self.report(doc, &st, attempts, restarts, DocumentVerdict::Failed(err)));
                }
                AttemptOutcome::RestartRequested(reason) => {
                    if !progressed && restarts > 0 {
                        warn!(
                            "No progress on {} since the last restart; finishing with {} pages",
                            doc.id,
                            st.pages.len()
                        );
                        break;
                    }
                    st.next_page = st.last_good + 1;
                    self.restart(session, reason).await?;
                    restarts += 1;
                }
            }
        }

        self.finish(doc, st, attempts, restarts).await
    }

    /// One pass under the current session.
    async fn run_pass(
        &self,
        session: &mut BrowserSession,
        doc: &Document,
        st: &mut DocState,
    ) -> Result<ExtractionAttempt, ControllerError> {
        let mut attempt =
            ExtractionAttempt::new(st.next_page, st.total.unwrap_or(PageCount::Unknown));

        if st.total.is_none() {
            if self.stopped() {
                attempt.outcome = AttemptOutcome::Interrupted;
                return Ok(attempt);
            }

            match self.fetch_page(session, doc, 1, st, true).await {
                Ok((step, count)) => {
                    let count = count.unwrap_or(PageCount::Unknown);
                    debug!("{}: declared page count {:?}", doc.id, count);
                    st.total = Some(count);
                    attempt.total_pages_declared = count;
                    if let Some(step) = step {
                        self.record_step(session, doc, st, &mut attempt, 1, step)
                            .await?;
                    }
                }
                Err(err) => {
                    if err.is_blocked() {
                        self.throttle.report_blocked().await;
                    }
                    session.record_failure();
                    attempt.outcome = AttemptOutcome::Abandoned(ExtractionError::from_load(1, &err));
                    return Ok(attempt);
                }
            }
        }

        while st.has_more(self.config.max_pages, self.config.ocr_probe_pages) {
            if self.stopped() {
                attempt.outcome = AttemptOutcome::Interrupted;
                return Ok(attempt);
            }
            if let Some(reason) = session.restart_due() {
                attempt.outcome = AttemptOutcome::RestartRequested(reason);
                return Ok(attempt);
            }

            let page_number = st.next_page;
            match self.fetch_page(session, doc, page_number, st, false).await {
                Ok((Some(step), _)) => {
                    self.record_step(session, doc, st, &mut attempt, page_number, step)
                        .await?;
                }
                Ok((None, _)) => st.next_page = page_number + 1,
                Err(err) => {
                    self.record_load_failure(session, st, &mut attempt, page_number, err)
                        .await;
                }
            }
        }

        attempt.outcome = AttemptOutcome::Completed;
        Ok(attempt)
    }

    /// Load one page and extract it if it is due. Page 1 also yields the count.
    async fn fetch_page(
        &self,
        session: &BrowserSession,
        doc: &Document,
        page_number: u32,
        st: &mut DocState,
        discover: bool,
    ) -> Result<(Option<PageStep>, Option<PageCount>), LoadError> {
        self.throttle.acquire().await;

        let page = self
            .fetcher
            .load(
                session.driver(),
                &doc.page_locator(page_number),
                self.config.page_load_timeout(),
            )
            .await?;

        let count = if discover {
            Some(
                self.extractor
                    .discover_page_count(&page, self.config.max_pages)
                    .await,
            )
        } else {
            None
        };

        let step = if page_number >= st.next_page {
            Some(self.extract_page(&page, page_number, st).await)
        } else {
            None
        };

        Ok((step, count))
    }

    /// Extract with the document's mode, entering OCR mode when DOM
    /// extraction fails on each of the first `ocr_probe_pages` pages.
    async fn extract_page(
        &self,
        page: &LoadedPage<'_>,
        page_number: u32,
        st: &mut DocState,
    ) -> PageStep {
        let result = self.extractor.extract(page, page_number, st.mode).await;

        if st.mode == ExtractionMode::Dom && self.extractor.has_ocr() && !st.dom_succeeded {
            match result {
                Ok(_) => st.dom_succeeded = true,
                Err(_) if page_number <= self.config.ocr_probe_pages => {
                    st.leading_dom_failures += 1;
                    if st.leading_dom_failures >= self.config.ocr_probe_pages {
                        info!(
                            "No text layer on the first {} pages; switching to OCR",
                            st.leading_dom_failures
                        );
                        st.mode = ExtractionMode::Ocr;
                        return PageStep::SwitchedToOcr;
                    }
                }
                Err(_) => {}
            }
        }

        match result {
            Ok(page) => PageStep::Extracted(page),
            Err(e) => PageStep::Failed(e),
        }
    }

    async fn record_step(
        &self,
        session: &mut BrowserSession,
        doc: &Document,
        st: &mut DocState,
        attempt: &mut ExtractionAttempt,
        page_number: u32,
        step: PageStep,
    ) -> Result<(), ControllerError> {
        match step {
            PageStep::Extracted(page) => {
                self.partials.append(doc, &page)?;
                self.checkpoint
                    .set_resume_cursor(&doc.category, &doc.id, page_number + 1)
                    .await?;
                session.record_success();
                self.throttle.report_success().await;

                debug!(
                    "{} page {}: {} chars ({})",
                    doc.id, page_number, page.char_count, page.extraction_method
                );
                st.last_good = page_number;
                st.next_page = page_number + 1;
                st.pages.push(page.clone());
                attempt.pages_extracted.push(page);
            }
            PageStep::Failed(e) => {
                session.record_failure();
                let err = match e {
                    ExtractError::SelectorNotFound(_) => {
                        ExtractionError::SelectorNotFound { page: page_number }
                    }
                    _ => ExtractionError::EmptyContent { page: page_number },
                };
                debug!("{}: {}", doc.id, err);
                attempt.page_errors.push(err);
                st.next_page = page_number + 1;
            }
            PageStep::SwitchedToOcr => {
                st.next_page = st.last_good + 1;
            }
        }
        Ok(())
    }

    async fn record_load_failure(
        &self,
        session: &mut BrowserSession,
        st: &mut DocState,
        attempt: &mut ExtractionAttempt,
        page_number: u32,
        err: LoadError,
    ) {
        if err.is_blocked() {
            // Same page again once the backoff window has passed
            self.throttle.report_blocked().await;
        } else {
            st.next_page = page_number + 1;
        }
        session.record_failure();

        let err = ExtractionError::from_load(page_number, &err);
        warn!(
            "{} (consecutive failures: {})",
            err,
            session.health().consecutive_failures
        );
        attempt.page_errors.push(err);
    }

    async fn restart(
        &self,
        session: &mut BrowserSession,
        reason: RestartReason,
    ) -> Result<(), ControllerError> {
        match reason {
            RestartReason::MemoryExceeded => warn!(
                "{}",
                ExtractionError::SessionMemoryExceeded {
                    footprint_mb: session.health().memory_footprint_mb
                }
            ),
            other => info!("Restarting browser session: {}", other),
        }
        session.restart().await?;
        Ok(())
    }

    /// Apply the minimum-content gate and commit or discard the document.
    async fn finish(
        &self,
        doc: &Document,
        st: DocState,
        attempts: Vec<ExtractionAttempt>,
        restarts: u32,
    ) -> Result<DocumentReport, ControllerError> {
        let total_chars = st.total_chars();
        let minimum = self.config.min_document_chars;

        let verdict = if total_chars >= minimum {
            let total_pages = match st.total {
                Some(PageCount::Declared(n)) => n,
                _ => st.pages.last().map(|p| p.page_number).unwrap_or(0),
            };
            let output = self.output.write(doc, &st.pages, total_pages)?;
            self.checkpoint.mark_done(&doc.category, &doc.id).await?;
            self.partials.clear(doc)?;

            info!(
                "Completed {} {}: {} pages, {} chars -> {}",
                doc.group,
                doc.display_name,
                st.pages.len(),
                total_chars,
                output.display()
            );
            DocumentVerdict::Completed { output }
        } else {
            // Whole-document retry starts from scratch
            self.partials.clear(doc)?;
            self.checkpoint
                .clear_resume_cursor(&doc.category, &doc.id)
                .await?;

            let err = ExtractionError::DocumentBelowMinimumContent {
                chars: total_chars,
                minimum,
            };
            warn!("{} {}: {}", doc.group, doc.display_name, err);
            DocumentVerdict::Failed(err)
        };

        Ok(self.report(doc, &st, attempts, restarts, verdict))
    }

    fn report(
        &self,
        doc: &Document,
        st: &DocState,
        attempts: Vec<ExtractionAttempt>,
        restarts: u32,
        verdict: DocumentVerdict,
    ) -> DocumentReport {
        DocumentReport {
            document_id: doc.id.clone(),
            verdict,
            attempts,
            total_pages: st.total.unwrap_or(PageCount::Unknown),
            pages: st.pages.len(),
            total_chars: st.total_chars(),
            mode: st.mode,
            restarts,
        }
    }
}
