/// Local JSON copy of each run's record set
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::types::MergedRecord;

pub struct OutputArtifact {
    path: PathBuf,
}

impl OutputArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        OutputArtifact { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the artifact with `records`, written even when empty
    pub async fn write(&self, records: &[MergedRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, json).await?;

        info!("💾 Wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    pub async fn read(&self) -> Result<Vec<MergedRecord>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
