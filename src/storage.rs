//! On-disk storage for extracted text.
//!
//! Two layouts:
//! - partial page logs, one JSON line per page:
//!   `{partial_dir}/{category}/{id}.jsonl`
//! - finished documents:
//!   `{output_dir}/{category}/{group}/{group}_{name}_{N}pages.txt`

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Document, PageResult};

/// Width of the rule under the output header.
const HEADER_RULE_WIDTH: usize = 60;

/// Errors from page and document storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode page: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Replace characters that are invalid in file names.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Write `contents` to `path` through a temp file in the same directory.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err(dir))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err(dir))?;
    tmp.write_all(contents).map_err(io_err(path))?;
    tmp.as_file().sync_all().map_err(io_err(path))?;
    tmp.persist(path).map_err(|e| io_err(path)(e.error))?;
    Ok(())
}

/// Append-only per-document page log.
#[derive(Debug, Clone)]
pub struct PartialStore {
    root: PathBuf,
}

impl PartialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, doc: &Document) -> PathBuf {
        self.root
            .join(sanitize_filename(&doc.category))
            .join(format!("{}.jsonl", doc.id))
    }

    /// Durably append one page.
    pub fn append(&self, doc: &Document, page: &PageResult) -> Result<(), StorageError> {
        let path = self.path(doc);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let mut line = serde_json::to_vec(page)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err(&path))?;
        file.write_all(&line).map_err(io_err(&path))?;
        file.sync_data().map_err(io_err(&path))?;
        Ok(())
    }

    /// Pages flushed so far, in strictly increasing page order.
    ///
    /// A torn last line (crash mid-append) or an out-of-order line is
    /// dropped and the log is rewritten without it.
    pub fn load(&self, doc: &Document) -> Result<Vec<PageResult>, StorageError> {
        let path = self.path(doc);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&path)(e)),
        };

        let mut pages: Vec<PageResult> = Vec::new();
        let mut dropped = 0usize;
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<PageResult>(line) {
                Ok(page) if pages.last().map_or(true, |last| page.page_number > last.page_number) => {
                    pages.push(page)
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 || (!raw.is_empty() && !raw.ends_with('\n')) {
            warn!(
                "Repairing partial log {} ({} bad lines dropped)",
                path.display(),
                dropped
            );
            let mut clean = Vec::new();
            for page in &pages {
                clean.extend(serde_json::to_vec(page)?);
                clean.push(b'\n');
            }
            write_atomic(&path, &clean)?;
        }

        Ok(pages)
    }

    pub fn clear(&self, doc: &Document) -> Result<(), StorageError> {
        let path = self.path(doc);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed partial log {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    /// Remove a partial log by category and id.
    pub fn clear_by_id(&self, category: &str, id: &str) -> Result<bool, StorageError> {
        let path = self
            .root
            .join(sanitize_filename(category))
            .join(format!("{}.jsonl", id));
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path)(e)),
        }
    }
}

/// Writer for finished text files.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/{category}/{group}/{group}_{name}_{N}pages.txt`
    pub fn path(&self, doc: &Document, total_pages: u32) -> PathBuf {
        let group = sanitize_filename(&doc.group);
        let filename = format!(
            "{}_{}_{}pages.txt",
            group,
            sanitize_filename(&doc.display_name),
            total_pages
        );
        self.root
            .join(sanitize_filename(&doc.category))
            .join(group)
            .join(filename)
    }

    /// Header block followed by one banner-delimited section per page.
    pub fn render(doc: &Document, pages: &[PageResult], total_pages: u32) -> String {
        let mut out = String::new();
        out.push_str(&format!("Brand: {}\n", doc.group));
        out.push_str(&format!("Model: {}\n", doc.display_name));
        out.push_str(&format!("URL: {}\n", doc.source_locator));
        out.push_str(&format!("Total Pages: {}\n", total_pages));
        out.push_str(&"=".repeat(HEADER_RULE_WIDTH));
        out.push_str("\n\n");

        let body: Vec<String> = pages
            .iter()
            .map(|p| format!("--- Page {} ---\n{}", p.page_number, p.text))
            .collect();
        out.push_str(&body.join("\n\n"));
        out.push('\n');
        out
    }

    pub fn write(
        &self,
        doc: &Document,
        pages: &[PageResult],
        total_pages: u32,
    ) -> Result<PathBuf, StorageError> {
        let path = self.path(doc, total_pages);
        write_atomic(&path, Self::render(doc, pages, total_pages).as_bytes())?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}
