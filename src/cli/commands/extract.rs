//! Batch extraction command.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::cli::helpers::{build_ocr, format_duration, format_number, load_worklist, open_checkpoint};
use crate::cli::progress::ExtractionProgress;
use crate::config::Settings;
use crate::extract::PageContentExtractor;
use crate::scrapers::{
    BrowserLauncher, MemoryProbe, NoMemoryProbe, PageFetcher, ProcessMemoryProbe,
    RequestThrottle, ThrottleConfig,
};
use crate::services::{BatchEvent, BatchOrchestrator, DocumentExtractionController};
use crate::storage::{OutputWriter, PartialStore};

/// Command-line choices for `manuals extract`.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub cache: Option<PathBuf>,
    pub categories: Vec<String>,
    pub brand: Option<String>,
    pub workers: Option<usize>,
    pub limit: usize,
    pub dry_run: bool,
    pub no_ocr: bool,
}

/// Extract every pending manual in the worklist.
pub async fn cmd_extract(settings: &Settings, options: ExtractOptions) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let cache_path = options
        .cache
        .clone()
        .unwrap_or_else(|| settings.url_cache.clone());
    let mut documents = load_worklist(&cache_path, &options.categories, options.brand.as_deref())?;
    if options.limit > 0 {
        documents.truncate(options.limit);
    }

    if documents.is_empty() {
        println!(
            "{} No manuals match the filters in {}",
            style("!").yellow(),
            cache_path.display()
        );
        return Ok(());
    }

    let checkpoint = open_checkpoint(settings)?;

    if options.dry_run {
        let mut pending = Vec::new();
        for doc in &documents {
            if !checkpoint.is_done(&doc.category, &doc.id).await {
                pending.push(doc);
            }
        }
        println!(
            "{} {} pending of {} manuals (dry run, nothing fetched)",
            style("→").cyan(),
            format_number(pending.len()),
            format_number(documents.len())
        );
        for doc in pending {
            println!(
                "  {} [{}] {} {}  {}",
                style(&doc.id).dim(),
                doc.category,
                doc.group,
                doc.display_name,
                style(&doc.source_locator).dim()
            );
        }
        return Ok(());
    }

    let config = settings.extraction.clone();
    let workers = options.workers.unwrap_or(settings.workers).max(1);

    let mut extractor = PageContentExtractor::new(settings.selectors.clone(), &config);
    if !options.no_ocr {
        if let Some(ocr) = build_ocr(settings)? {
            extractor = extractor.with_ocr(ocr);
        }
    }

    let controller = DocumentExtractionController::new(
        PageFetcher::new(&settings.selectors).with_block_phrases(config.block_phrases.clone()),
        extractor,
        RequestThrottle::new(ThrottleConfig::from(&config)),
        checkpoint.clone(),
        PartialStore::new(&settings.partial_dir),
        OutputWriter::new(&settings.output_dir),
        config.clone(),
    );

    // Memory of a remote browser is not visible from here
    let memory: Arc<dyn MemoryProbe> =
        if config.max_browser_memory_mb == 0 || settings.browser.remote_url.is_some() {
            Arc::new(NoMemoryProbe)
        } else {
            Arc::new(ProcessMemoryProbe::new())
        };

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            eprintln!(
                "\n{} Stopping after the current page; progress is kept",
                style("!").yellow()
            );
            let _ = stop_tx.send(true);
        }
    });

    let orchestrator = BatchOrchestrator::new(
        controller,
        build_launcher(settings)?,
        memory,
        checkpoint.clone(),
        workers,
    )
    .with_stop(stop_rx);

    println!(
        "{} Starting {} workers over {} manuals",
        style("→").cyan(),
        workers,
        format_number(documents.len())
    );

    let (event_tx, mut event_rx) = mpsc::channel::<BatchEvent>(100);
    let progress = Arc::new(ExtractionProgress::new(documents.len()));

    let progress_clone = progress.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            progress_clone.handle(&event);
        }
    });

    let stats = orchestrator.run(documents, event_tx).await?;

    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }
    progress.finish();

    println!(
        "{} Extracted {} manuals in {}",
        style("✓").green(),
        format_number(stats.succeeded),
        format_duration(stats.elapsed)
    );
    println!(
        "  {} {} pages, {} characters ({} text layer, {} OCR)",
        style("→").dim(),
        format_number(stats.total_pages),
        format_number(stats.total_chars),
        stats.text_count,
        stats.ocr_count
    );
    println!(
        "  {} {:.1} manuals/min, {:.0} chars/s, {} browser restarts",
        style("→").dim(),
        stats.documents_per_minute(),
        stats.chars_per_second(),
        stats.restarts
    );
    if stats.skipped > 0 {
        println!(
            "  {} {} already done",
            style("→").dim(),
            format_number(stats.skipped)
        );
    }
    if stats.retried > 0 {
        println!("  {} {} retry attempts", style("→").dim(), stats.retried);
    }
    if stats.abandoned > 0 {
        println!(
            "  {} {} abandoned (see 'manuals status', clear with 'manuals reset <category> --abandoned')",
            style("✗").red(),
            stats.abandoned
        );
    }
    if stats.remaining > 0 {
        println!(
            "  {} {} manuals still pending; run again to resume",
            style("!").yellow(),
            stats.remaining
        );
    }

    Ok(())
}

#[cfg(feature = "browser")]
fn build_launcher(settings: &Settings) -> anyhow::Result<Arc<dyn BrowserLauncher>> {
    Ok(Arc::new(crate::scrapers::ChromeLauncher::new(
        settings.browser.clone(),
    )))
}

#[cfg(not(feature = "browser"))]
fn build_launcher(_settings: &Settings) -> anyhow::Result<Arc<dyn BrowserLauncher>> {
    anyhow::bail!("manuals was built without browser support (enable the `browser` feature)")
}
