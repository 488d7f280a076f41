use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::notify::format::NotificationMessage;

/// Why one delivery attempt did not land.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is not configured: {0}")]
    NotConfigured(String),
    #[error("authentication rejected: {0}")]
    Unauthorized(String),
    #[error("missing permission: {0}")]
    Forbidden(String),
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("API returned {status}: {description}")]
    Api { status: u16, description: String },
}

impl ChannelError {
    /// Short, stable tag used in logs and reports.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::Unauthorized(_) => "auth",
            Self::Forbidden(_) => "permission",
            Self::RecipientNotFound(_) => "missing_recipient",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::Api { .. } => "api",
        }
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Transport(format!("request timed out: {err}"));
        }
        Self::Transport(err.to_string())
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, message: &NotificationMessage) -> Result<(), ChannelError>;
}

/// Outcome of one sink attempt for one message.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelResult {
    pub channel: String,
    pub period: String,
    pub success: bool,
    pub category: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ChannelResult {
    pub fn delivered(channel: &str, period: &str, duration_ms: u64) -> Self {
        Self {
            channel: channel.to_string(),
            period: period.to_string(),
            success: true,
            category: None,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(channel: &str, period: &str, error: &ChannelError, duration_ms: u64) -> Self {
        Self {
            channel: channel.to_string(),
            period: period.to_string(),
            success: false,
            category: Some(error.category().to_string()),
            error: Some(error.to_string()),
            duration_ms,
        }
    }
}

pub struct StdoutSink;

#[async_trait]
impl NotificationSink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), ChannelError> {
        println!("{}", message.text);
        Ok(())
    }
}
