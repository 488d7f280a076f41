use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::notify::discord::{DEFAULT_DISCORD_API_BASE, DEFAULT_DISCORD_GATEWAY_URL};
use crate::notify::format::Language;
use crate::notify::telegram::DEFAULT_TELEGRAM_API_BASE;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub customer: CustomerConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CustomerConfig {
    #[serde(default)]
    pub consumer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_portal_url")]
    pub url: String,
    #[serde(default = "default_consumer_field")]
    pub consumer_field: String,
    #[serde(default = "default_history_button")]
    pub history_button: String,
    #[serde(default = "default_portal_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub language: Language,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub enable_stdout: bool,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
    #[serde(default = "default_discord_gateway_url")]
    pub gateway_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub consumer_id: Option<String>,
    pub history_path: Option<String>,
    pub language: Option<Language>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/meter-watch/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(consumer_id) = overrides.consumer_id {
            self.customer.consumer_id = consumer_id;
        }
        if let Some(history_path) = overrides.history_path {
            self.storage.history_path = history_path;
        }
        if let Some(language) = overrides.language {
            self.notify.language = language;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    /// Copy safe to print: literal tokens are masked, `${VAR}` references kept.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.notify.telegram.bot_token = mask_secret(&copy.notify.telegram.bot_token);
        copy.notify.discord.bot_token = mask_secret(&copy.notify.discord.bot_token);
        copy
    }

    pub fn resolved_history_path(&self) -> PathBuf {
        expand_tilde(&self.storage.history_path)
    }

    pub fn default_template() -> String {
        let template = r#"[customer]
consumer_id = "YourConsumerNumberHere"

[portal]
url = "https://customer.nesco.gov.bd/pre/panel"
consumer_field = "cust_no"
history_button = "consumption_hist_button"
request_timeout_secs = 30

[storage]
history_path = "~/.local/share/meter-watch/log.json"

[notify]
# "en" or "bn"
language = "en"
timeout_secs = 10
enable_stdout = false

# Secrets may be written as "${ENV_VAR}" to read them from the environment.
[notify.telegram]
enabled = true
bot_token = "${TELEGRAM_BOT_TOKEN}"
chat_id = "${TELEGRAM_CHAT_ID}"
api_base = "https://api.telegram.org"

# The bot must be invited to the server with permission to post in the channel.
[notify.discord]
enabled = true
bot_token = "${DISCORD_BOT_TOKEN}"
channel_id = "${DISCORD_CHANNEL_ID}"
api_base = "https://discord.com/api/v10"
gateway_url = "wss://gateway.discord.gg/?v=10&encoding=json"
"#;
        template.to_string()
    }
}

impl PortalConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Resolves `${VAR}` to the environment variable's value; other text is
/// returned unchanged.
pub fn resolve_secret(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("${") else {
        return Ok(trimmed.to_string());
    };
    let var_name = inner
        .strip_suffix('}')
        .ok_or_else(|| anyhow!("malformed env var reference: {trimmed}"))?;
    std::env::var(var_name).with_context(|| format!("environment variable {var_name} is not set"))
}

fn mask_secret(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with("${") {
        return trimmed.to_string();
    }
    "********".to_string()
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: default_portal_url(),
            consumer_field: default_consumer_field(),
            history_button: default_history_button(),
            request_timeout_secs: default_portal_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            timeout_secs: default_notify_timeout_secs(),
            enable_stdout: false,
            telegram: TelegramConfig::default(),
            discord: DiscordConfig::default(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_telegram_api_base(),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            channel_id: String::new(),
            api_base: default_discord_api_base(),
            gateway_url: default_discord_gateway_url(),
        }
    }
}

fn default_portal_url() -> String {
    "https://customer.nesco.gov.bd/pre/panel".to_string()
}

fn default_consumer_field() -> String {
    "cust_no".to_string()
}

fn default_history_button() -> String {
    "consumption_hist_button".to_string()
}

fn default_portal_timeout_secs() -> u64 {
    30
}

fn default_history_path() -> String {
    "~/.local/share/meter-watch/log.json".to_string()
}

fn default_notify_timeout_secs() -> u64 {
    10
}

fn default_telegram_api_base() -> String {
    DEFAULT_TELEGRAM_API_BASE.to_string()
}

fn default_discord_api_base() -> String {
    DEFAULT_DISCORD_API_BASE.to_string()
}

fn default_discord_gateway_url() -> String {
    DEFAULT_DISCORD_GATEWAY_URL.to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).expect("template parses");
        let defaults = Config::default();
        assert_eq!(parsed.portal.url, defaults.portal.url);
        assert_eq!(parsed.storage.history_path, defaults.storage.history_path);
        assert_eq!(parsed.notify.timeout_secs, defaults.notify.timeout_secs);
        assert_eq!(parsed.notify.discord.gateway_url, DEFAULT_DISCORD_GATEWAY_URL);
        assert_eq!(parsed.notify.telegram.bot_token, "${TELEGRAM_BOT_TOKEN}");
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[customer]
consumer_id = "77001234"

[notify]
language = "bn"
"#,
        )
        .expect("partial config parses");
        assert_eq!(parsed.customer.consumer_id, "77001234");
        assert_eq!(parsed.notify.language, Language::Bn);
        assert_eq!(parsed.notify.timeout(), Duration::from_secs(10));
        assert!(parsed.notify.telegram.enabled);
        assert_eq!(parsed.portal.consumer_field, "cust_no");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = Config::load(Some(&tmp.path().join("absent.toml"))).expect("load");
        assert!(config.customer.consumer_id.is_empty());
    }

    #[test]
    fn overrides_replace_loaded_values() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            consumer_id: Some("1234".to_string()),
            history_path: Some("/tmp/log.json".to_string()),
            language: Some(Language::Bn),
        });
        assert_eq!(config.customer.consumer_id, "1234");
        assert_eq!(config.resolved_history_path(), PathBuf::from("/tmp/log.json"));
        assert_eq!(config.notify.language, Language::Bn);
    }

    #[test]
    fn redacted_masks_literal_tokens_only() {
        let mut config = Config::default();
        config.notify.telegram.bot_token = "123:ABC".to_string();
        config.notify.discord.bot_token = "${DISCORD_BOT_TOKEN}".to_string();
        let shown = config.redacted();
        assert_eq!(shown.notify.telegram.bot_token, "********");
        assert_eq!(shown.notify.discord.bot_token, "${DISCORD_BOT_TOKEN}");
    }

    #[test]
    fn resolves_env_secret_references() {
        std::env::set_var("METER_WATCH_TEST_SECRET", "123:ABC");
        assert_eq!(
            resolve_secret("${METER_WATCH_TEST_SECRET}").expect("resolve"),
            "123:ABC"
        );
        std::env::remove_var("METER_WATCH_TEST_SECRET");

        assert_eq!(resolve_secret(" literal ").expect("literal"), "literal");
        let err = resolve_secret("${METER_WATCH_TEST_MISSING_XYZ}").expect_err("missing var");
        assert!(err.to_string().contains("METER_WATCH_TEST_MISSING_XYZ"));
        assert!(resolve_secret("${UNCLOSED").is_err());
    }
}
