pub mod discord;
pub mod dispatcher;
pub mod format;
pub mod sink;
pub mod telegram;

use tracing::{info, warn};

use crate::config::{resolve_secret, DiscordConfig, NotifyConfig, TelegramConfig};
use crate::notify::discord::DiscordSink;
use crate::notify::dispatcher::Dispatcher;
use crate::notify::sink::StdoutSink;
use crate::notify::telegram::TelegramSink;

pub use format::{format_usage, Language, NotificationMessage};
pub use sink::{ChannelError, ChannelResult, NotificationSink};

/// Builds the dispatcher for one process lifetime.
///
/// Enabled channels whose credentials are missing or unresolvable are left
/// out with a single log line; they never make the build fail.
pub fn dispatcher_from_config(config: &NotifyConfig) -> Dispatcher {
    let mut sinks: Vec<Box<dyn NotificationSink>> = Vec::new();
    if config.enable_stdout {
        sinks.push(Box::new(StdoutSink));
    }

    if config.telegram.enabled {
        match telegram_sink(&config.telegram, config) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(err) => warn!(channel = "telegram", error = %err, "channel skipped"),
        }
    }
    if config.discord.enabled {
        match discord_sink(&config.discord, config) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(err) => warn!(channel = "discord", error = %err, "channel skipped"),
        }
    }

    let dispatcher = Dispatcher::new(sinks, config.timeout());
    info!(
        channels = ?dispatcher.channel_names(),
        timeout_secs = config.timeout().as_secs(),
        "notification channels ready"
    );
    dispatcher
}

fn telegram_sink(
    telegram: &TelegramConfig,
    config: &NotifyConfig,
) -> Result<TelegramSink, ChannelError> {
    let token = resolve_secret(&telegram.bot_token)
        .map_err(|e| ChannelError::NotConfigured(format!("{e:#}")))?;
    let chat_id = resolve_secret(&telegram.chat_id)
        .map_err(|e| ChannelError::NotConfigured(format!("{e:#}")))?;
    TelegramSink::new(token, chat_id, telegram.api_base.clone(), config.timeout())
}

fn discord_sink(
    discord: &DiscordConfig,
    config: &NotifyConfig,
) -> Result<DiscordSink, ChannelError> {
    let token = resolve_secret(&discord.bot_token)
        .map_err(|e| ChannelError::NotConfigured(format!("{e:#}")))?;
    let channel_id = resolve_secret(&discord.channel_id)
        .map_err(|e| ChannelError::NotConfigured(format!("{e:#}")))?;
    DiscordSink::new(
        token,
        channel_id,
        discord.api_base.clone(),
        discord.gateway_url.clone(),
        config.timeout(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_channels_are_skipped() {
        let config = NotifyConfig::default();
        assert!(dispatcher_from_config(&config).is_empty());
    }

    #[test]
    fn configured_channels_are_built_in_order() {
        let mut config = NotifyConfig::default();
        config.enable_stdout = true;
        config.telegram.bot_token = "123:ABC".to_string();
        config.telegram.chat_id = "42".to_string();
        config.discord.bot_token = "bot".to_string();
        config.discord.channel_id = "1234567890".to_string();

        let dispatcher = dispatcher_from_config(&config);
        assert_eq!(dispatcher.channel_names(), vec!["stdout", "telegram", "discord"]);
    }

    #[test]
    fn disabled_channel_is_left_out() {
        let mut config = NotifyConfig::default();
        config.telegram.enabled = false;
        config.telegram.bot_token = "123:ABC".to_string();
        config.telegram.chat_id = "42".to_string();
        assert!(dispatcher_from_config(&config).is_empty());
    }

    #[test]
    fn unresolved_env_secret_skips_channel() {
        let mut config = NotifyConfig::default();
        config.discord.bot_token = "${METER_WATCH_UNSET_DISCORD_TOKEN}".to_string();
        config.discord.channel_id = "1234567890".to_string();
        assert!(dispatcher_from_config(&config).is_empty());
    }
}
