//! Resident memory sampling for browser processes.

use std::path::Path;

use tracing::debug;

/// Process names counted as part of the browser footprint.
const BROWSER_PROCESS_NAMES: &[&str] = &["chrome", "chromium", "chromium-browser", "headless_shell"];

/// Reports how much memory the browser currently holds.
pub trait MemoryProbe: Send + Sync {
    /// Total resident memory in MiB, or `None` when it cannot be measured.
    fn browser_memory_mb(&self) -> Option<u64>;
}

/// Probe that never measures anything; disables the memory trigger.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn browser_memory_mb(&self) -> Option<u64> {
        None
    }
}

/// Sums `VmRSS` of every Chrome/Chromium process visible in `/proc`.
#[derive(Debug, Clone)]
pub struct ProcessMemoryProbe {
    proc_root: std::path::PathBuf,
}

impl Default for ProcessMemoryProbe {
    fn default() -> Self {
        Self {
            proc_root: std::path::PathBuf::from("/proc"),
        }
    }
}

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe rooted at another procfs-shaped directory.
    pub fn with_root(proc_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn sample(&self) -> Option<u64> {
        let entries = std::fs::read_dir(&self.proc_root).ok()?;
        let mut total_kb: u64 = 0;
        let mut matched = 0usize;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }

            let dir = entry.path();
            if !is_browser_process(&dir) {
                continue;
            }
            if let Some(kb) = resident_kb(&dir) {
                total_kb += kb;
                matched += 1;
            }
        }

        debug!("Browser memory: {} processes, {} KiB", matched, total_kb);
        if matched == 0 {
            return None;
        }
        Some(total_kb / 1024)
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn browser_memory_mb(&self) -> Option<u64> {
        self.sample()
    }
}

fn is_browser_process(dir: &Path) -> bool {
    std::fs::read_to_string(dir.join("comm"))
        .map(|comm| {
            let comm = comm.trim().to_lowercase();
            BROWSER_PROCESS_NAMES
                .iter()
                .any(|name| comm == *name || comm.starts_with(name))
        })
        .unwrap_or(false)
}

fn resident_kb(dir: &Path) -> Option<u64> {
    let status = std::fs::read_to_string(dir.join("status")).ok()?;
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse().ok())
}
