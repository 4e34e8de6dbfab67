/// Persistent sync cursor stored as a single plain-text timestamp
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::types::Watermark;

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Cursor of the previous run, `None` before the first one
    async fn load(&self) -> Result<Option<Watermark>>;

    /// Overwrite the stored cursor
    async fn save(&self, watermark: &Watermark) -> Result<()>;
}

pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileWatermarkStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> Result<Option<Watermark>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No watermark at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed.lines().count() > 1 {
            return Err(SyncError::InvalidWatermark(format!(
                "{} holds more than one line",
                self.path.display()
            )));
        }

        Ok(Some(Watermark::new(trimmed)))
    }

    async fn save(&self, watermark: &Watermark) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, watermark.as_str()).await?;

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                warn!("Could not remove {}: {}", tmp_path.display(), cleanup);
            }
            return Err(SyncError::FileWriteFailed(format!(
                "Failed to move watermark into {}: {}",
                self.path.display(),
                e
            )));
        }

        info!("💾 Saved watermark {} to {}", watermark, self.path.display());
        Ok(())
    }
}
