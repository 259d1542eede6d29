//! End-to-end extraction scenarios against a scripted manual site.
//!
//! The fake browser serves manuals from memory and can be told to time out
//! or show a block page on particular visits, per browser generation, so
//! restarts and resumes can be observed without Chrome or Tesseract.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

use manualscrape::checkpoint::{CheckpointStore, JsonCheckpointStore};
use manualscrape::config::{ExtractionConfig, ViewerSelectors};
use manualscrape::extract::{ExtractionMode, OcrFallback, PageContentExtractor};
use manualscrape::models::{Document, ExtractionMethod, PageCount, PageResult};
use manualscrape::ocr::{ImageFetcher, OcrBackend, OcrError, OcrResult};
use manualscrape::scrapers::{
    BrowserDriver, BrowserLauncher, BrowserSession, DriverError, NoMemoryProbe, PageFetcher,
    RequestThrottle, RestartReason, SessionLimits, ThrottleConfig,
};
use manualscrape::services::batch::{BatchEvent, BatchOrchestrator, BatchStats};
use manualscrape::services::extraction::{
    AttemptOutcome, DocumentExtractionController, DocumentVerdict, ExtractionError,
};
use manualscrape::storage::{OutputWriter, PartialStore};

const SITE: &str = "https://manuals.test";

// ---------------------------------------------------------------------------
// Scripted site
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Timeout,
    Blocked,
}

/// One navigation as seen by a fault rule.
struct Visit {
    generation: u32,
    page: u32,
    /// 1 for the first time this page of this manual is loaded.
    visit: u32,
}

type Rule = Box<dyn Fn(&Visit) -> Option<Fault> + Send + Sync>;

struct Manual {
    title: String,
    pages: Vec<String>,
    text_layer: bool,
    rule: Option<Rule>,
}

impl Manual {
    fn with_pages(pages: Vec<String>) -> Self {
        Self {
            title: format!("EliteBook ({} pages)", pages.len()),
            pages,
            text_layer: true,
            rule: None,
        }
    }

    fn text(count: usize) -> Self {
        Self::with_pages(
            (1..=count)
                .map(|n| format!("Page {} of the service manual, with enough words to count.", n))
                .collect(),
        )
    }

    fn scanned(count: usize) -> Self {
        Self {
            text_layer: false,
            ..Self::text(count)
        }
    }

    fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    fn faults(mut self, rule: impl Fn(&Visit) -> Option<Fault> + Send + Sync + 'static) -> Self {
        self.rule = Some(Box::new(rule));
        self
    }
}

#[derive(Default)]
struct Site {
    manuals: HashMap<String, Manual>,
    log: Mutex<Vec<(u32, String)>>,
    visits: Mutex<HashMap<(String, u32), u32>>,
}

impl Site {
    fn with(mut self, path: &str, manual: Manual) -> Self {
        self.manuals.insert(format!("{}{}", SITE, path), manual);
        self
    }

    /// Every navigated URL, in order.
    fn navigations(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(_, u)| u.clone()).collect()
    }

    fn navigations_in(&self, generation: u32) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(g, _)| *g == generation)
            .map(|(_, u)| u.clone())
            .collect()
    }

    fn count_of(&self, url: &str) -> usize {
        self.navigations().iter().filter(|u| *u == url).count()
    }
}

fn split_locator(url: &str) -> (String, u32) {
    match url.split_once("?p=") {
        Some((base, page)) => (base.to_string(), page.parse().unwrap_or(1)),
        None => (url.to_string(), 1),
    }
}

struct FakeDriver {
    site: Arc<Site>,
    generation: u32,
    current: Mutex<Option<(String, u32, bool)>>,
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let (base, page) = split_locator(url);
        self.site
            .log
            .lock()
            .unwrap()
            .push((self.generation, url.to_string()));
        let visit = {
            let mut visits = self.site.visits.lock().unwrap();
            let count = visits.entry((base.clone(), page)).or_insert(0);
            *count += 1;
            *count
        };

        let manual = self
            .site
            .manuals
            .get(&base)
            .ok_or_else(|| DriverError::Navigation(format!("404 {}", url)))?;
        let fault = manual.rule.as_ref().and_then(|rule| {
            rule(&Visit {
                generation: self.generation,
                page,
                visit,
            })
        });
        if fault == Some(Fault::Timeout) {
            return Err(DriverError::Timeout(timeout));
        }

        *self.current.lock().unwrap() = Some((base, page, fault == Some(Fault::Blocked)));
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
        let (base, page, blocked) = self.current.lock().unwrap().clone().ok_or(DriverError::Closed)?;
        let manual = &self.site.manuals[&base];

        if blocked {
            return Ok(if expression.contains("hasViewer") {
                json!({"hasViewer": false, "text": "Too Many Requests. Slow down.", "title": "Error"})
            } else {
                json!("")
            });
        }

        let text = manual
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default();
        let visible = if manual.text_layer {
            text
        } else {
            "Loading viewer".to_string()
        };

        let value = if expression.contains("hasViewer") {
            json!({"hasViewer": manual.text_layer, "text": visible, "title": manual.title})
        } else if expression.contains(".viewer-page") {
            json!(if manual.text_layer { visible } else { String::new() })
        } else if expression.contains("\"h1\"") {
            json!(manual.title)
        } else if expression.contains(".bi") {
            if (page as usize) <= manual.pages.len() {
                json!(format!("background-image: url(\"/img/{}.png\")", page))
            } else {
                json!("")
            }
        } else if expression.contains("document.body") {
            json!(visible)
        } else {
            json!("")
        };
        Ok(value)
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<(), DriverError> {
        let (base, _, _) = self.current.lock().unwrap().clone().ok_or(DriverError::Closed)?;
        if selector == ".viewer-page" && !self.site.manuals[&base].text_layer {
            return Err(DriverError::SelectorNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

struct FakeLauncher {
    site: Arc<Site>,
    launches: AtomicU32,
}

impl FakeLauncher {
    fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let generation = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(FakeDriver {
            site: self.site.clone(),
            generation,
            current: Mutex::new(None),
        }))
    }
}

/// Reads the image "bytes" (the image URL) back as text.
struct FakeOcr;

impl OcrBackend for FakeOcr {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError> {
        let bytes = std::fs::read(image_path)?;
        Ok(OcrResult {
            text: format!("Recognised scan of {}", String::from_utf8_lossy(&bytes)),
            processing_time_ms: 1,
        })
    }
}

struct UrlImages;

#[async_trait]
impl ImageFetcher for UrlImages {
    async fn fetch(&self, url: &str, _referer: &str) -> Result<Vec<u8>, OcrError> {
        Ok(url.as_bytes().to_vec())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    _dir: TempDir,
    site: Arc<Site>,
    launcher: Arc<FakeLauncher>,
    checkpoint: Arc<JsonCheckpointStore>,
    partials: PartialStore,
    output_dir: PathBuf,
    throttle: RequestThrottle,
    config: ExtractionConfig,
}

impl Harness {
    fn new(site: Site) -> Self {
        let dir = TempDir::new().unwrap();
        let site = Arc::new(site);
        let config = ExtractionConfig::default();
        Self {
            checkpoint: Arc::new(
                JsonCheckpointStore::open(dir.path().join("progress/checkpoint.json")).unwrap(),
            ),
            partials: PartialStore::new(dir.path().join("partial")),
            output_dir: dir.path().join("out"),
            launcher: Arc::new(FakeLauncher {
                site: site.clone(),
                launches: AtomicU32::new(0),
            }),
            throttle: RequestThrottle::new(ThrottleConfig::from(&config)),
            site,
            config,
            _dir: dir,
        }
    }

    fn controller(&self) -> DocumentExtractionController {
        let selectors = ViewerSelectors::default();
        let extractor =
            PageContentExtractor::new(selectors.clone(), &self.config).with_ocr(OcrFallback {
                backend: Arc::new(FakeOcr),
                images: Arc::new(UrlImages),
            });
        DocumentExtractionController::new(
            PageFetcher::new(&selectors)
                .with_block_phrases(self.config.block_phrases.clone()),
            extractor,
            self.throttle.clone(),
            self.checkpoint.clone(),
            self.partials.clone(),
            OutputWriter::new(&self.output_dir),
            self.config.clone(),
        )
    }

    async fn session(&self) -> BrowserSession {
        BrowserSession::launch(
            self.launcher.clone(),
            Arc::new(NoMemoryProbe),
            SessionLimits::from(&self.config),
        )
        .await
        .unwrap()
    }

    fn orchestrator(&self, workers: usize) -> BatchOrchestrator {
        BatchOrchestrator::new(
            self.controller(),
            self.launcher.clone(),
            Arc::new(NoMemoryProbe),
            self.checkpoint.clone(),
            workers,
        )
    }
}

fn doc(path: &str) -> Document {
    Document::new("laptops", "HP", "EliteBook 840", format!("{}{}", SITE, path))
}

async fn run_batch(orchestrator: &BatchOrchestrator, documents: Vec<Document>) -> BatchStats {
    let (tx, mut rx) = mpsc::channel::<BatchEvent>(100);
    let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
    let stats = orchestrator.run(documents, tx).await.unwrap();
    drain.await.unwrap();
    stats
}

fn completed_output(verdict: &DocumentVerdict) -> PathBuf {
    match verdict {
        DocumentVerdict::Completed { output } => output.clone(),
        other => panic!("expected a completed document, got {:?}", other),
    }
}

/// Page numbers of the `--- Page N ---` banners, in file order.
fn page_banners(contents: &str) -> Vec<u32> {
    contents
        .lines()
        .filter_map(|l| l.strip_prefix("--- Page "))
        .filter_map(|l| l.strip_suffix(" ---"))
        .filter_map(|n| n.parse().ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_done_documents_are_never_fetched() {
    let h = Harness::new(Site::default().with("/hp/840", Manual::text(3)));
    let d = doc("/hp/840");
    h.checkpoint.mark_done(&d.category, &d.id).await.unwrap();

    let stats = run_batch(&h.orchestrator(2), vec![d]).await;

    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.succeeded, 0);
    assert!(h.site.navigations().is_empty());
    assert_eq!(h.launcher.launches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resume_continues_from_cursor() {
    let h = Harness::new(Site::default().with("/hp/840", Manual::text(6)));
    let d = doc("/hp/840");

    for n in 1..=3 {
        let text = format!("Flushed page {} text saved before the crash.", n);
        h.partials
            .append(&d, &PageResult::new(n, &text, ExtractionMethod::DomText))
            .unwrap();
    }
    h.checkpoint
        .set_resume_cursor(&d.category, &d.id, 4)
        .await
        .unwrap();

    let mut session = h.session().await;
    let report = h.controller().extract_document(&mut session, &d).await.unwrap();
    let output = completed_output(&report.verdict);

    // Page 1 is loaded only to learn the page count
    let base = format!("{}/hp/840", SITE);
    assert_eq!(
        h.site.navigations(),
        vec![
            base.clone(),
            format!("{}?p=4", base),
            format!("{}?p=5", base),
            format!("{}?p=6", base),
        ]
    );

    let contents = std::fs::read_to_string(output).unwrap();
    assert_eq!(page_banners(&contents), vec![1, 2, 3, 4, 5, 6]);
    assert!(contents.contains("Flushed page 2 text"));
    assert!(!contents.contains("Page 2 of the service manual"));
    assert!(contents.contains("Page 5 of the service manual"));

    assert!(h.checkpoint.is_done(&d.category, &d.id).await);
    assert!(!h.partials.path(&d).exists());
}

#[tokio::test(start_paused = true)]
async fn test_failure_budget_restarts_and_resumes_mid_document() {
    let manual = Manual::text(10).faults(|v| {
        (v.generation == 1 && v.page >= 5).then_some(Fault::Timeout)
    });
    let h = Harness::new(Site::default().with("/hp/840", manual));
    let d = doc("/hp/840");

    let mut session = h.session().await;
    let report = h.controller().extract_document(&mut session, &d).await.unwrap();
    let output = completed_output(&report.verdict);

    assert_eq!(report.restarts, 1);
    assert_eq!(h.launcher.launches(), 2);
    assert_eq!(report.attempts.len(), 2);

    let first = &report.attempts[0];
    assert_eq!(
        first.outcome,
        AttemptOutcome::RestartRequested(RestartReason::FailureBudget)
    );
    assert_eq!(first.page_errors.len(), 5);
    assert!(first
        .page_errors
        .iter()
        .all(|e| matches!(e, ExtractionError::LoadTimeout { .. })));
    assert_eq!(report.attempts[1].start_page, 5);

    let base = format!("{}/hp/840", SITE);
    let second: Vec<String> = (5..=10).map(|n| format!("{}?p={}", base, n)).collect();
    assert_eq!(h.site.navigations_in(2), second);

    let contents = std::fs::read_to_string(output).unwrap();
    assert_eq!(page_banners(&contents), (1..=10).collect::<Vec<u32>>());
    assert!(h.checkpoint.is_done(&d.category, &d.id).await);
}

#[tokio::test(start_paused = true)]
async fn test_minimum_content_gate_is_inclusive() {
    let short = Manual::with_pages(vec!["a".repeat(33), "b".repeat(33), "c".repeat(33)]);
    let enough = Manual::with_pages(vec!["a".repeat(33), "b".repeat(33), "c".repeat(34)]);
    let h = Harness::new(
        Site::default()
            .with("/hp/short", short)
            .with("/hp/enough", enough),
    );
    let controller = h.controller();
    let mut session = h.session().await;

    let d = doc("/hp/short");
    let report = controller.extract_document(&mut session, &d).await.unwrap();
    assert_eq!(
        report.verdict,
        DocumentVerdict::Failed(ExtractionError::DocumentBelowMinimumContent {
            chars: 99,
            minimum: 100
        })
    );
    assert!(!h.checkpoint.is_done(&d.category, &d.id).await);
    assert_eq!(h.checkpoint.resume_cursor(&d.category, &d.id).await, 1);
    assert!(!h.partials.path(&d).exists());

    let d = doc("/hp/enough");
    let report = controller.extract_document(&mut session, &d).await.unwrap();
    completed_output(&report.verdict);
    assert_eq!(report.total_chars, 100);
    assert!(h.checkpoint.is_done(&d.category, &d.id).await);
}

#[tokio::test(start_paused = true)]
async fn test_unloadable_document_is_abandoned_after_retries() {
    let manual = Manual::text(3).faults(|v| (v.page == 1).then_some(Fault::Timeout));
    let h = Harness::new(Site::default().with("/hp/840", manual));
    let d = doc("/hp/840");

    let stats = run_batch(&h.orchestrator(1), vec![d.clone()]).await;

    // One first attempt plus three retries, never a fourth retry
    assert_eq!(h.site.count_of(&d.source_locator), 4);
    assert_eq!(stats.failed, 4);
    assert_eq!(stats.retried, 3);
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.succeeded, 0);
    assert_eq!(stats.remaining, 0);

    assert!(h.checkpoint.is_done(&d.category, &d.id).await);
    let snapshot = h.checkpoint.snapshot().await;
    assert!(snapshot["laptops"].abandoned.contains(&d.id));
}

#[tokio::test(start_paused = true)]
async fn test_short_document_is_abandoned_after_retries() {
    // 80 chars over two pages: every attempt ends below the content gate
    let manual = Manual::with_pages(vec!["a".repeat(40), "b".repeat(40)]);
    let h = Harness::new(Site::default().with("/hp/840", manual));
    let d = doc("/hp/840");

    let stats = run_batch(&h.orchestrator(1), vec![d.clone()]).await;

    assert_eq!(h.site.count_of(&d.source_locator), 4);
    assert_eq!(h.site.count_of(&d.page_locator(2)), 4);
    assert_eq!(stats.failed, 4);
    assert_eq!(stats.retried, 3);
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.succeeded, 0);

    assert!(h.checkpoint.is_done(&d.category, &d.id).await);
    let snapshot = h.checkpoint.snapshot().await;
    assert!(snapshot["laptops"].abandoned.contains(&d.id));
    assert!(!h.partials.path(&d).exists());
    assert!(!h.output_dir.join("laptops").exists());
}

#[tokio::test(start_paused = true)]
async fn test_workers_never_share_a_document() {
    let mut site = Site::default();
    for n in 1..=4 {
        site = site.with(&format!("/hp/m{}", n), Manual::text(3));
    }
    let h = Harness::new(site);
    let docs: Vec<Document> = (1..=4).map(|n| doc(&format!("/hp/m{}", n))).collect();

    let stats = run_batch(&h.orchestrator(2), docs.clone()).await;

    assert_eq!(stats.succeeded, 4);
    assert_eq!(stats.total_pages, 12);
    assert_eq!(h.launcher.launches(), 2);
    assert_eq!(h.site.navigations().len(), 12);
    for d in &docs {
        assert_eq!(h.site.count_of(&d.source_locator), 1);
        assert!(h.checkpoint.is_done(&d.category, &d.id).await);
    }
    let snapshot = h.checkpoint.snapshot().await;
    assert_eq!(snapshot["laptops"].done.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_page_is_retried_after_backoff() {
    let manual =
        Manual::text(3).faults(|v| (v.page == 2 && v.visit == 1).then_some(Fault::Blocked));
    let h = Harness::new(Site::default().with("/hp/840", manual));
    let d = doc("/hp/840");

    let started = tokio::time::Instant::now();
    let mut session = h.session().await;
    let report = h.controller().extract_document(&mut session, &d).await.unwrap();
    completed_output(&report.verdict);

    let base = format!("{}/hp/840", SITE);
    assert_eq!(
        h.site.navigations(),
        vec![
            base.clone(),
            format!("{}?p=2", base),
            format!("{}?p=2", base),
            format!("{}?p=3", base),
        ]
    );
    assert_eq!(
        report.attempts[0].page_errors,
        vec![ExtractionError::LoadBlocked {
            page: 2,
            phrase: "too many requests".to_string()
        }]
    );
    assert_eq!(h.throttle.stats().await.blocked_hits, 1);
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_scanned_manual_switches_to_ocr_in_order() {
    let h = Harness::new(Site::default().with("/hp/scanned", Manual::scanned(5)));
    let d = doc("/hp/scanned");

    let mut session = h.session().await;
    let report = h.controller().extract_document(&mut session, &d).await.unwrap();
    let output = completed_output(&report.verdict);

    assert_eq!(report.mode, ExtractionMode::Ocr);
    assert_eq!(report.pages, 5);

    // Three DOM probes, then the probe pages again with OCR
    let base = format!("{}/hp/scanned", SITE);
    let p = |n: u32| format!("{}?p={}", base, n);
    assert_eq!(
        h.site.navigations(),
        vec![base.clone(), p(2), p(3), base.clone(), p(2), p(3), p(4), p(5)]
    );

    let contents = std::fs::read_to_string(output).unwrap();
    assert_eq!(page_banners(&contents), vec![1, 2, 3, 4, 5]);
    assert!(contents.contains("Recognised scan of https://manuals.test/img/1.png"));
    assert!(contents.contains("Recognised scan of https://manuals.test/img/5.png"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_flag_halts_before_fetching() {
    let h = Harness::new(Site::default().with("/hp/840", Manual::text(3)));
    let d = doc("/hp/840");
    let (_tx, rx) = watch::channel(true);

    let mut session = h.session().await;
    let report = h
        .controller()
        .with_stop(rx)
        .extract_document(&mut session, &d)
        .await
        .unwrap();

    assert_eq!(report.verdict, DocumentVerdict::Interrupted);
    assert!(h.site.navigations().is_empty());
    assert!(!h.checkpoint.is_done(&d.category, &d.id).await);
}

#[tokio::test(start_paused = true)]
async fn test_single_page_title_still_reads_every_page() {
    let manual = Manual::text(4).titled("EliteBook (1 page)");
    let h = Harness::new(Site::default().with("/hp/one", manual));
    let d = doc("/hp/one");

    let mut session = h.session().await;
    let report = h.controller().extract_document(&mut session, &d).await.unwrap();
    let output = completed_output(&report.verdict);

    assert_eq!(report.total_pages, PageCount::Unknown);
    assert_eq!(report.pages, 4);

    // Probing stops at the first page without content
    let base = format!("{}/hp/one", SITE);
    let p = |n: u32| format!("{}?p={}", base, n);
    assert_eq!(
        h.site.navigations(),
        vec![base.clone(), p(2), p(3), p(4), p(5)]
    );

    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(page_banners(&contents), vec![1, 2, 3, 4]);
    assert!(output.to_string_lossy().ends_with("_4pages.txt"));
}

#[tokio::test(start_paused = true)]
async fn test_scanned_manual_without_page_count_switches_to_ocr() {
    let manual = Manual::scanned(5).titled("EliteBook service manual");
    let h = Harness::new(Site::default().with("/hp/scan", manual));
    let d = doc("/hp/scan");

    let mut session = h.session().await;
    let report = h.controller().extract_document(&mut session, &d).await.unwrap();
    let output = completed_output(&report.verdict);

    assert_eq!(report.total_pages, PageCount::Unknown);
    assert_eq!(report.mode, ExtractionMode::Ocr);
    assert_eq!(report.pages, 5);

    let base = format!("{}/hp/scan", SITE);
    let p = |n: u32| format!("{}?p={}", base, n);
    assert_eq!(
        h.site.navigations(),
        vec![base.clone(), p(2), p(3), base.clone(), p(2), p(3), p(4), p(5), p(6)]
    );

    let contents = std::fs::read_to_string(output).unwrap();
    assert_eq!(page_banners(&contents), vec![1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_budget_does_not_carry_across_documents() {
    // Four trailing timeouts, then a manual whose first page never loads
    let tail = Manual::text(6).faults(|v| (v.page >= 3).then_some(Fault::Timeout));
    let dead = Manual::text(3).faults(|v| (v.page == 1).then_some(Fault::Timeout));
    let h = Harness::new(
        Site::default()
            .with("/hp/tail", tail)
            .with("/hp/dead", dead)
            .with("/hp/next", Manual::text(3)),
    );
    let controller = h.controller();
    let mut session = h.session().await;

    let first = controller
        .extract_document(&mut session, &doc("/hp/tail"))
        .await
        .unwrap();
    completed_output(&first.verdict);
    assert_eq!(session.health().consecutive_failures, 4);

    let second = controller
        .extract_document(&mut session, &doc("/hp/dead"))
        .await
        .unwrap();
    assert!(matches!(
        second.verdict,
        DocumentVerdict::Failed(ExtractionError::LoadTimeout { page: 1, .. })
    ));
    assert_eq!(session.health().consecutive_failures, 1);
    assert_eq!(session.restart_due(), None);

    let third = controller
        .extract_document(&mut session, &doc("/hp/next"))
        .await
        .unwrap();
    completed_output(&third.verdict);
    assert_eq!(third.restarts, 0);
    assert_eq!(h.launcher.launches(), 1);
}
