//! Durable, append-only audit log sink.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Contract for writing audit blobs keyed by a relative path.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append `blob` to the object at `path`.
    async fn write(&self, path: &str, blob: &[u8]) -> Result<()>;
}

/// Log sink backed by a local directory.
///
/// Each blob is appended to its file followed by a newline, so repeated
/// writes for the same key accumulate instead of replacing each other.
#[derive(Debug, Clone)]
pub struct FsLogSink {
    root: PathBuf,
}

impl FsLogSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(ClientError::ValidationError(format!(
                "log path must be relative and stay inside the sink root: {:?}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl LogSink for FsLogSink {
    async fn write(&self, path: &str, blob: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target)
            .await?;
        file.write_all(blob).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        tracing::debug!(path = %target.display(), bytes = blob.len(), "Audit blob written");
        Ok(())
    }
}
