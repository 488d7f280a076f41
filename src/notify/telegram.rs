//! Telegram Bot API sink: one stateless `sendMessage` call per message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::notify::format::NotificationMessage;
use crate::notify::sink::{ChannelError, NotificationSink};

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

pub struct TelegramSink {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let bot_token = bot_token.into();
        let chat_id = chat_id.into();
        if bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured(
                "telegram bot token is empty".to_string(),
            ));
        }
        if chat_id.trim().is_empty() {
            return Err(ChannelError::NotConfigured(
                "telegram chat id is empty".to_string(),
            ));
        }
        let client = Client::builder()
            .user_agent(concat!("meter-watch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), ChannelError> {
        debug!(chat_id = %self.chat_id, period = %message.period, "sending telegram message");
        // The endpoint embeds the bot token, so it is stripped from transport errors.
        let response = self
            .client
            .post(self.endpoint())
            .json(&json!({ "chat_id": self.chat_id, "text": message.text }))
            .send()
            .await
            .map_err(|e| ChannelError::from(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChannelError::from(e.without_url()))?;
        let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        if status.is_success() && parsed.get("ok") == Some(&Value::Bool(true)) {
            info!(chat_id = %self.chat_id, period = %message.period, "telegram message sent");
            return Ok(());
        }
        Err(classify_telegram_error(status, &parsed))
    }
}

fn classify_telegram_error(status: StatusCode, body: &Value) -> ChannelError {
    let description = body
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::TOO_MANY_REQUESTS => ChannelError::RateLimited {
            retry_after_secs: body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        // Telegram answers 404 for tokens it does not recognise at all.
        StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => ChannelError::Unauthorized(description),
        StatusCode::FORBIDDEN => ChannelError::Forbidden(description),
        StatusCode::BAD_REQUEST if description.to_ascii_lowercase().contains("chat not found") => {
            ChannelError::RecipientNotFound(description)
        }
        _ => ChannelError::Api {
            status: status.as_u16(),
            description,
        },
    }
}
