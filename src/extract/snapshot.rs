use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::extract::{ExtractError, UsageExtractor};
use crate::record::ExtractedUsage;

/// Replays a captured usage table from a JSON file.
pub struct SnapshotExtractor {
    path: PathBuf,
}

impl SnapshotExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UsageExtractor for SnapshotExtractor {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn extract(&self) -> Result<ExtractedUsage, ExtractError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| ExtractError::SnapshotIo {
            path: self.path.clone(),
            source,
        })?;
        let usage: ExtractedUsage =
            serde_json::from_str(&raw).map_err(|source| ExtractError::SnapshotParse {
                path: self.path.clone(),
                source,
            })?;
        info!(
            path = %self.path.display(),
            rows = usage.rows.len(),
            "snapshot usage table loaded"
        );
        Ok(usage)
    }
}
