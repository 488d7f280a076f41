//! Discord bot sink.
//!
//! Every message goes through a short-lived gateway session: connect, wait for
//! HELLO, IDENTIFY as the bot, wait for READY, post the message over REST,
//! then close the socket. The socket is closed explicitly on every normal
//! path and dropped (which tears down the TCP stream) when the caller's
//! timeout cancels the attempt mid-flight.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::notify::format::NotificationMessage;
use crate::notify::sink::{ChannelError, NotificationSink};

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;

const INTENT_GUILDS: u64 = 1;

const CLOSE_AUTHENTICATION_FAILED: u16 = 4004;
const CLOSE_INVALID_INTENTS: u16 = 4013;
const CLOSE_DISALLOWED_INTENTS: u16 = 4014;

type GatewayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    t: Option<String>,
}

/// An identified gateway connection. Must be handed back through [`close`].
///
/// [`close`]: GatewaySession::close
pub struct GatewaySession {
    stream: GatewayStream,
    session_id: String,
    bot_user: String,
}

impl GatewaySession {
    pub async fn open(gateway_url: &str, bot_token: &str) -> Result<Self, ChannelError> {
        let (mut stream, _response) = connect_async(gateway_url)
            .await
            .map_err(|e| ChannelError::Transport(format!("gateway connect failed: {e}")))?;

        match identify(&mut stream, bot_token).await {
            Ok((session_id, bot_user)) => {
                debug!(%session_id, %bot_user, "discord gateway ready");
                Ok(Self {
                    stream,
                    session_id,
                    bot_user,
                })
            }
            Err(err) => {
                let _ = stream.close(None).await;
                Err(err)
            }
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn bot_user(&self) -> &str {
        &self.bot_user
    }

    pub async fn close(mut self) {
        if let Err(err) = self.stream.close(None).await {
            debug!(error = %err, "discord gateway close was not acknowledged");
        }
        debug!(session_id = %self.session_id, "discord gateway session released");
    }
}

async fn identify(
    stream: &mut GatewayStream,
    bot_token: &str,
) -> Result<(String, String), ChannelError> {
    let hello = next_payload(stream).await?;
    if hello.op != OP_HELLO {
        return Err(ChannelError::Protocol(format!(
            "expected HELLO, gateway sent op {}",
            hello.op
        )));
    }

    let identify = json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": bot_token,
            "intents": INTENT_GUILDS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "meter-watch",
                "device": "meter-watch"
            }
        }
    });
    stream
        .send(Message::Text(identify.to_string().into()))
        .await
        .map_err(|e| ChannelError::Transport(format!("failed sending IDENTIFY: {e}")))?;

    loop {
        let payload = next_payload(stream).await?;
        match payload.op {
            OP_DISPATCH if payload.t.as_deref() == Some("READY") => {
                let session_id = payload.d["session_id"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let bot_user = payload.d["user"]["username"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                return Ok((session_id, bot_user));
            }
            OP_INVALID_SESSION => {
                return Err(ChannelError::Unauthorized(
                    "gateway rejected the session".to_string(),
                ))
            }
            OP_HEARTBEAT => {
                let beat = json!({ "op": OP_HEARTBEAT, "d": Value::Null });
                stream
                    .send(Message::Text(beat.to_string().into()))
                    .await
                    .map_err(|e| {
                        ChannelError::Transport(format!("failed answering heartbeat: {e}"))
                    })?;
            }
            _ => continue,
        }
    }
}

async fn next_payload(stream: &mut GatewayStream) -> Result<GatewayPayload, ChannelError> {
    loop {
        let frame = stream
            .next()
            .await
            .ok_or_else(|| ChannelError::Protocol("gateway closed the connection".to_string()))?
            .map_err(|e| ChannelError::Transport(format!("gateway read failed: {e}")))?;
        match frame {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str())
                    .map_err(|e| ChannelError::Protocol(format!("malformed gateway payload: {e}")))
            }
            Message::Close(frame) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                    .unwrap_or((1000, String::new()));
                return Err(match code {
                    CLOSE_AUTHENTICATION_FAILED => ChannelError::Unauthorized(format!(
                        "gateway closed with {code}: {reason}"
                    )),
                    CLOSE_INVALID_INTENTS | CLOSE_DISALLOWED_INTENTS => ChannelError::Forbidden(
                        format!("gateway closed with {code}: {reason}"),
                    ),
                    _ => ChannelError::Protocol(format!("gateway closed with {code}: {reason}")),
                });
            }
            Message::Binary(_) => {
                return Err(ChannelError::Protocol(
                    "unexpected binary gateway frame".to_string(),
                ))
            }
            _ => continue,
        }
    }
}

pub struct DiscordSink {
    client: Client,
    api_base: String,
    gateway_url: String,
    bot_token: String,
    channel_id: String,
}

impl DiscordSink {
    pub fn new(
        bot_token: impl Into<String>,
        channel_id: impl Into<String>,
        api_base: impl Into<String>,
        gateway_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let bot_token = bot_token.into();
        let channel_id = channel_id.into().trim().to_string();
        if bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured(
                "discord bot token is empty".to_string(),
            ));
        }
        if channel_id.is_empty() || !channel_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ChannelError::NotConfigured(format!(
                "discord channel id must be numeric, got {channel_id:?}"
            )));
        }
        let client = Client::builder()
            .user_agent(concat!("meter-watch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            gateway_url: gateway_url.into(),
            bot_token,
            channel_id,
        })
    }

    async fn post_message(&self, message: &NotificationMessage) -> Result<(), ChannelError> {
        let url = format!("{}/channels/{}/messages", self.api_base, self.channel_id);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&json!({ "content": message.text }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(classify_discord_error(status, &body))
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), ChannelError> {
        let session = GatewaySession::open(&self.gateway_url, &self.bot_token).await?;
        let outcome = self.post_message(message).await;
        let bot_user = session.bot_user().to_string();
        session.close().await;

        match &outcome {
            Ok(()) => info!(
                channel_id = %self.channel_id,
                %bot_user,
                period = %message.period,
                "discord message sent"
            ),
            Err(err) => warn!(
                channel_id = %self.channel_id,
                %bot_user,
                error = %err,
                "discord message rejected"
            ),
        }
        outcome
    }
}

fn classify_discord_error(status: StatusCode, body: &Value) -> ChannelError {
    let description = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::TOO_MANY_REQUESTS => ChannelError::RateLimited {
            retry_after_secs: body
                .get("retry_after")
                .and_then(Value::as_f64)
                .map(|secs| secs.ceil() as u64)
                .unwrap_or(1),
        },
        StatusCode::UNAUTHORIZED => ChannelError::Unauthorized(description),
        StatusCode::FORBIDDEN => ChannelError::Forbidden(description),
        StatusCode::NOT_FOUND => ChannelError::RecipientNotFound(description),
        _ => ChannelError::Api {
            status: status.as_u16(),
            description,
        },
    }
}
