//! JSON checkpoint file with atomic replacement
//!
//! The file is written to a temporary sibling and renamed over the target,
//! so a crash mid-write leaves either the previous checkpoint or the new one.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use lotledger_core::{CheckpointStore, CoreError, IngestionCheckpoint};

/// Checkpoint store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> lotledger_core::Result<IngestionCheckpoint> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No checkpoint found, starting fresh");
                return Ok(IngestionCheckpoint::new());
            }
            Err(e) => return Err(CoreError::Io(e)),
        };

        let checkpoint: IngestionCheckpoint = serde_json::from_str(&content).map_err(|e| {
            CoreError::Checkpoint(format!(
                "Corrupt checkpoint file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!(
            path = %self.path.display(),
            processed = checkpoint.processed_count(),
            "Loaded checkpoint"
        );

        Ok(checkpoint)
    }

    async fn save(&self, checkpoint: &IngestionCheckpoint) -> lotledger_core::Result<()> {
        let json = serde_json::to_vec_pretty(checkpoint)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &json))
            .await
            .map_err(|e| CoreError::Checkpoint(format!("Checkpoint writer panicked: {}", e)))??;

        debug!(
            path = %self.path.display(),
            processed = checkpoint.processed_count(),
            "Checkpoint flushed"
        );

        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> lotledger_core::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CoreError::Io(e.error))?;

    Ok(())
}
