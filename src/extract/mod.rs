pub mod portal;
pub mod snapshot;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::ExtractedUsage;

pub use portal::{parse_usage_page, PortalExtractor};
pub use snapshot::SnapshotExtractor;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("consumer id is not configured")]
    MissingConsumerId,
    #[error("invalid portal configuration: {0}")]
    Config(String),
    #[error("portal request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("portal returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("unexpected portal page layout: {0}")]
    Layout(String),
    #[error("failed reading snapshot {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot {path}: {source}")]
    SnapshotParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of the current monthly usage table.
#[async_trait]
pub trait UsageExtractor: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self) -> Result<ExtractedUsage, ExtractError>;
}
