//! Batch extraction service.
//!
//! Runs a worklist through a fixed pool of workers. Each worker owns its
//! own browser session and pulls from a shared queue; only the checkpoint
//! and the request throttle are shared between workers. Separated from UI
//! concerns: progress is reported through `BatchEvent`s.

mod queue;
mod types;

pub use queue::{WorkItem, WorkQueue};
pub use types::{BatchEvent, BatchStats};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::extraction::{DocumentExtractionController, DocumentVerdict};
use crate::checkpoint::CheckpointStore;
use crate::config::ExtractionConfig;
use crate::extract::ExtractionMode;
use crate::models::Document;
use crate::scrapers::{BrowserLauncher, BrowserSession, MemoryProbe, SessionLimits};

/// Poll interval while other workers may still requeue work.
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    abandoned: AtomicUsize,
    retried: AtomicUsize,
    interrupted: AtomicUsize,
    total_chars: AtomicUsize,
    total_pages: AtomicUsize,
    text_count: AtomicUsize,
    ocr_count: AtomicUsize,
    restarts: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Whether a worker keeps pulling work.
enum Flow {
    Continue,
    Stop,
}

/// Runs documents through N workers with bounded whole-document retries.
pub struct BatchOrchestrator {
    controller: DocumentExtractionController,
    launcher: Arc<dyn BrowserLauncher>,
    memory: Arc<dyn MemoryProbe>,
    checkpoint: Arc<dyn CheckpointStore>,
    workers: usize,
    stop: watch::Receiver<bool>,
}

impl BatchOrchestrator {
    pub fn new(
        controller: DocumentExtractionController,
        launcher: Arc<dyn BrowserLauncher>,
        memory: Arc<dyn MemoryProbe>,
        checkpoint: Arc<dyn CheckpointStore>,
        workers: usize,
    ) -> Self {
        Self {
            controller,
            launcher,
            memory,
            checkpoint,
            workers: workers.max(1),
            stop: watch::channel(false).1,
        }
    }

    /// Observe a stop flag shared with the controller.
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.controller = self.controller.with_stop(stop.clone());
        self.stop = stop;
        self
    }

    /// Documents not yet recorded as done, in worklist order.
    pub async fn pending(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut pending = Vec::with_capacity(documents.len());
        for doc in documents {
            if !self.checkpoint.is_done(&doc.category, &doc.id).await {
                pending.push(doc);
            }
        }
        pending
    }

    /// Process the worklist until every document is done, abandoned or a
    /// stop is requested.
    pub async fn run(
        &self,
        documents: Vec<Document>,
        event_tx: mpsc::Sender<BatchEvent>,
    ) -> anyhow::Result<BatchStats> {
        let start = Instant::now();
        let total = documents.len();
        let pending = self.pending(documents).await;
        let skipped = total - pending.len();

        info!(
            "Batch: {} documents, {} already done, {} workers",
            total, skipped, self.workers
        );
        let _ = event_tx
            .send(BatchEvent::Planned {
                pending: pending.len(),
                skipped,
            })
            .await;

        if pending.is_empty() {
            return Ok(BatchStats {
                total,
                skipped,
                elapsed: start.elapsed(),
                ..Default::default()
            });
        }

        let config = self.controller.config().clone();
        let queue = Arc::new(WorkQueue::new(pending, config.retry_queue_capacity));
        let counters = Arc::new(Counters::default());

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let worker = Worker {
                id: worker_id,
                controller: self.controller.clone(),
                launcher: self.launcher.clone(),
                memory: self.memory.clone(),
                checkpoint: self.checkpoint.clone(),
                config: config.clone(),
                queue: queue.clone(),
                counters: counters.clone(),
                event_tx: event_tx.clone(),
                stop: self.stop.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker task failed: {}", e);
            }
        }

        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        let stats = BatchStats {
            total,
            skipped,
            succeeded: load(&counters.succeeded),
            failed: load(&counters.failed),
            abandoned: load(&counters.abandoned),
            retried: load(&counters.retried),
            interrupted: load(&counters.interrupted),
            remaining: queue.remaining().await,
            total_chars: load(&counters.total_chars),
            total_pages: load(&counters.total_pages),
            text_count: load(&counters.text_count),
            ocr_count: load(&counters.ocr_count),
            restarts: load(&counters.restarts),
            elapsed: start.elapsed(),
        };

        info!(
            "Batch finished: {} succeeded, {} failed attempts, {} abandoned, {} remaining",
            stats.succeeded, stats.failed, stats.abandoned, stats.remaining
        );
        Ok(stats)
    }
}

/// One worker: a browser session plus a loop over the shared queue.
struct Worker {
    id: usize,
    controller: DocumentExtractionController,
    launcher: Arc<dyn BrowserLauncher>,
    memory: Arc<dyn MemoryProbe>,
    checkpoint: Arc<dyn CheckpointStore>,
    config: ExtractionConfig,
    queue: Arc<WorkQueue>,
    counters: Arc<Counters>,
    event_tx: mpsc::Sender<BatchEvent>,
    stop: watch::Receiver<bool>,
}

impl Worker {
    async fn run(self) {
        let limits = SessionLimits::from(&self.config);
        let mut session =
            match BrowserSession::launch(self.launcher.clone(), self.memory.clone(), limits).await
            {
                Ok(session) => session,
                Err(e) => {
                    warn!("Worker {} could not start a browser: {}", self.id, e);
                    self.emit(BatchEvent::WorkerFailed {
                        worker_id: self.id,
                        error: e.to_string(),
                    })
                    .await;
                    return;
                }
            };
        self.emit(BatchEvent::WorkerStarted { worker_id: self.id })
            .await;

        let mut local_retries: VecDeque<WorkItem> = VecDeque::new();
        let mut since_drain = 0usize;
        let mut restarts_at_drain = session.restarts();
        let mut consecutive_empty = 0u32;

        loop {
            if *self.stop.borrow() {
                break;
            }

            let item = match local_retries.pop_front() {
                Some(item) => item,
                None => {
                    let restarted = session.restarts() > restarts_at_drain;
                    let primary_left = self.queue.has_primary().await;
                    let drain_due = since_drain >= self.config.retry_every_documents && restarted;

                    if self.queue.has_retries().await && (!primary_left || drain_due) {
                        // Retries only run on a session fresher than the failures
                        if !restarted {
                            if let Err(e) = self.restart(&mut session, "retry queue").await {
                                self.fail(e).await;
                                break;
                            }
                        }
                        local_retries.extend(self.queue.drain_retries().await);
                        debug!(
                            "Worker {} draining {} retries",
                            self.id,
                            local_retries.len()
                        );
                        since_drain = 0;
                        restarts_at_drain = session.restarts();
                        continue;
                    }

                    match self.queue.next_primary().await {
                        Some(item) => {
                            since_drain += 1;
                            item
                        }
                        None if self.queue.is_exhausted().await => break,
                        None => {
                            tokio::time::sleep(IDLE_POLL).await;
                            continue;
                        }
                    }
                }
            };

            match self
                .process(&mut session, item, &mut consecutive_empty)
                .await
            {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(e) => {
                    self.fail(e).await;
                    break;
                }
            }

            tokio::time::sleep(self.config.inter_document_delay()).await;
        }

        for item in local_retries {
            self.queue.release(item).await;
        }
        session.close().await;
        self.emit(BatchEvent::WorkerFinished { worker_id: self.id })
            .await;
    }

    async fn process(
        &self,
        session: &mut BrowserSession,
        mut item: WorkItem,
        consecutive_empty: &mut u32,
    ) -> anyhow::Result<Flow> {
        let doc = item.document.clone();
        if self.checkpoint.is_done(&doc.category, &doc.id).await {
            self.queue.complete().await;
            return Ok(Flow::Continue);
        }

        if item.failures > 0 {
            Counters::bump(&self.counters.retried, 1);
        }
        self.emit(BatchEvent::DocumentStarted {
            worker_id: self.id,
            document_id: doc.id.clone(),
            name: format!("{} {}", doc.group, doc.display_name),
            retry: item.failures,
        })
        .await;

        let restarts_before = session.restarts();
        let report = match self.controller.extract_document(session, &doc).await {
            Ok(report) => report,
            Err(e) => {
                self.queue.release(item).await;
                return Err(e.into());
            }
        };
        Counters::bump(
            &self.counters.restarts,
            (session.restarts() - restarts_before) as usize,
        );

        match report.verdict {
            DocumentVerdict::Completed { output } => {
                *consecutive_empty = 0;
                Counters::bump(&self.counters.succeeded, 1);
                Counters::bump(&self.counters.total_chars, report.total_chars);
                Counters::bump(&self.counters.total_pages, report.pages);
                match report.mode {
                    ExtractionMode::Dom => Counters::bump(&self.counters.text_count, 1),
                    ExtractionMode::Ocr => Counters::bump(&self.counters.ocr_count, 1),
                }
                self.queue.complete().await;
                self.emit(BatchEvent::DocumentCompleted {
                    worker_id: self.id,
                    document_id: doc.id.clone(),
                    pages: report.pages,
                    chars: report.total_chars,
                    mode: report.mode,
                    output,
                })
                .await;
            }
            DocumentVerdict::Failed(err) => {
                *consecutive_empty += 1;
                Counters::bump(&self.counters.failed, 1);
                item.failures += 1;

                if item.failures > self.config.max_document_retries {
                    self.queue.complete().await;
                    self.abandon(&doc, err.to_string()).await?;
                } else {
                    match self.queue.complete_with_retry(item).await {
                        Ok(()) => {
                            self.emit(BatchEvent::DocumentFailed {
                                worker_id: self.id,
                                document_id: doc.id.clone(),
                                error: err.to_string(),
                                will_retry: true,
                            })
                            .await;
                        }
                        Err(_) => {
                            warn!("Retry queue full; abandoning {}", doc.id);
                            self.abandon(&doc, err.to_string()).await?;
                        }
                    }
                }

                if *consecutive_empty >= self.config.empty_documents_before_restart {
                    self.restart(session, "consecutive failed documents").await?;
                    *consecutive_empty = 0;
                }
            }
            DocumentVerdict::Interrupted => {
                Counters::bump(&self.counters.interrupted, 1);
                self.queue.release(item).await;
                return Ok(Flow::Stop);
            }
        }

        Ok(Flow::Continue)
    }

    async fn abandon(&self, doc: &Document, error: String) -> anyhow::Result<()> {
        warn!(
            "Abandoning {} {} ({}): {}",
            doc.group, doc.display_name, doc.id, error
        );
        self.checkpoint
            .mark_abandoned(&doc.category, &doc.id)
            .await?;
        Counters::bump(&self.counters.abandoned, 1);
        self.emit(BatchEvent::DocumentAbandoned {
            worker_id: self.id,
            document_id: doc.id.clone(),
            error,
        })
        .await;
        Ok(())
    }

    async fn restart(&self, session: &mut BrowserSession, reason: &str) -> anyhow::Result<()> {
        info!("Worker {} restarting browser: {}", self.id, reason);
        session.restart().await?;
        Counters::bump(&self.counters.restarts, 1);
        self.emit(BatchEvent::SessionRestarted {
            worker_id: self.id,
            reason: reason.to_string(),
        })
        .await;
        Ok(())
    }

    async fn fail(&self, error: anyhow::Error) {
        warn!("Worker {} stopped: {:#}", self.id, error);
        self.emit(BatchEvent::WorkerFailed {
            worker_id: self.id,
            error: format!("{:#}", error),
        })
        .await;
    }

    async fn emit(&self, event: BatchEvent) {
        let _ = self.event_tx.send(event).await;
    }
}
