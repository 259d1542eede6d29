//! JSON-file checkpoint store.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{CheckpointError, CheckpointSnapshot, CheckpointStore};

/// Checkpoint held in memory and rewritten whole on every mutation.
///
/// Writes go to a temp file in the same directory which is then renamed
/// over the checkpoint, so a crash leaves either the old or the new file.
#[derive(Debug)]
pub struct JsonCheckpointStore {
    path: PathBuf,
    state: Mutex<CheckpointSnapshot>,
}

impl JsonCheckpointStore {
    /// Read the checkpoint at `path`, or start empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| CheckpointError::Read {
                path: path.clone(),
                source,
            })?;
            if raw.trim().is_empty() {
                CheckpointSnapshot::new()
            } else {
                serde_json::from_str(&raw).map_err(|source| CheckpointError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            CheckpointSnapshot::new()
        };

        let done: usize = state.values().map(|c| c.done.len()).sum();
        info!(
            "Loaded checkpoint {} ({} categories, {} done)",
            path.display(),
            state.len(),
            done
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy, persist it, then publish it.
    async fn mutate<F>(&self, change: F) -> Result<(), CheckpointError>
    where
        F: FnOnce(&mut CheckpointSnapshot) -> bool,
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn persist(&self, snapshot: &CheckpointSnapshot) -> Result<(), CheckpointError> {
        let write_err = |source: std::io::Error| CheckpointError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!("Checkpoint written ({} bytes)", json.len());
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for JsonCheckpointStore {
    async fn is_done(&self, category: &str, id: &str) -> bool {
        self.state
            .lock()
            .await
            .get(category)
            .is_some_and(|c| c.done.contains(id))
    }

    async fn mark_done(&self, category: &str, id: &str) -> Result<(), CheckpointError> {
        self.mutate(|s| {
            let progress = s.entry(category.to_string()).or_default();
            let removed = progress.partial.remove(id).is_some();
            progress.done.insert(id.to_string()) || removed
        })
        .await
    }

    async fn mark_abandoned(&self, category: &str, id: &str) -> Result<(), CheckpointError> {
        self.mutate(|s| {
            let progress = s.entry(category.to_string()).or_default();
            let removed = progress.partial.remove(id).is_some();
            let newly_done = progress.done.insert(id.to_string());
            progress.abandoned.insert(id.to_string()) || newly_done || removed
        })
        .await
    }

    async fn resume_cursor(&self, category: &str, id: &str) -> u32 {
        self.state
            .lock()
            .await
            .get(category)
            .and_then(|c| c.partial.get(id).copied())
            .unwrap_or(1)
            .max(1)
    }

    async fn set_resume_cursor(
        &self,
        category: &str,
        id: &str,
        page: u32,
    ) -> Result<(), CheckpointError> {
        self.mutate(|s| {
            let progress = s.entry(category.to_string()).or_default();
            progress.partial.insert(id.to_string(), page) != Some(page)
        })
        .await
    }

    async fn clear_resume_cursor(&self, category: &str, id: &str) -> Result<(), CheckpointError> {
        self.mutate(|s| {
            s.get_mut(category)
                .is_some_and(|c| c.partial.remove(id).is_some())
        })
        .await
    }

    async fn reset_document(&self, category: &str, id: &str) -> Result<bool, CheckpointError> {
        let mut changed = false;
        self.mutate(|s| {
            if let Some(progress) = s.get_mut(category) {
                let a = progress.done.remove(id);
                let b = progress.abandoned.remove(id);
                let c = progress.partial.remove(id).is_some();
                changed = a || b || c;
            }
            changed
        })
        .await?;
        Ok(changed)
    }

    async fn clear_abandoned(&self, category: &str) -> Result<usize, CheckpointError> {
        let mut cleared = 0;
        self.mutate(|s| {
            if let Some(progress) = s.get_mut(category) {
                let abandoned = std::mem::take(&mut progress.abandoned);
                for id in &abandoned {
                    progress.done.remove(id);
                }
                cleared = abandoned.len();
            }
            cleared > 0
        })
        .await?;
        Ok(cleared)
    }

    async fn snapshot(&self) -> CheckpointSnapshot {
        self.state.lock().await.clone()
    }
}
