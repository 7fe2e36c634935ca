//! Configuration types.
//!
//! Process settings come from the environment ([`BridgeConfig`]); the
//! operator-editable settings ([`PersistedConfig`]) live behind a
//! [`ConfigStore`] and are written back whenever a command changes them.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::conversation::DEFAULT_COUNTRY_CODE;
use crate::error::ConfigError;

/// Default auto-reply text.
pub const DEFAULT_AUTO_REPLY_TEXT: &str =
    "Thanks for your message. I'm away right now and will reply as soon as I can.";

/// Process settings read once at startup.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub telegram_token: SecretString,
    /// Usernames or numeric ids; `*` allows everyone.
    pub allowed_users: Vec<String>,
    /// Seeds `control_channel_id` when the persisted config has none.
    pub control_chat_id: Option<String>,
    pub config_path: PathBuf,
    pub default_country_code: String,
    /// Minimum gap between auto-replies to the same sender.
    pub auto_reply_cooldown: Duration,
    /// Upper bound on a single outbound send.
    pub send_timeout: Duration,
    pub contacts_page_size: usize,
    /// HTTP gateway for the source network; console source when unset.
    pub gateway_url: Option<String>,
    pub gateway_token: Option<SecretString>,
    pub log_dir: Option<PathBuf>,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let telegram_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()))?;

        let allowed_users: Vec<String> = std::env::var("TELEGRAM_ALLOWED_USERS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let default_country_code = std::env::var("RELAY_DEFAULT_COUNTRY_CODE")
            .unwrap_or_else(|_| DEFAULT_COUNTRY_CODE.to_string());
        if default_country_code.is_empty()
            || !default_country_code.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_DEFAULT_COUNTRY_CODE".into(),
                message: format!("expected digits, got {default_country_code:?}"),
            });
        }

        Ok(Self {
            telegram_token: SecretString::from(telegram_token),
            allowed_users,
            control_chat_id: non_empty_var("TELEGRAM_CHAT_ID"),
            config_path: non_empty_var("RELAY_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/relay-config.json")),
            default_country_code,
            auto_reply_cooldown: Duration::from_secs(parse_var("RELAY_AUTO_REPLY_COOLDOWN_SECS", 60)?),
            send_timeout: Duration::from_secs(parse_var("RELAY_SEND_TIMEOUT_SECS", 30)?),
            contacts_page_size: parse_var("RELAY_CONTACTS_PAGE_SIZE", 8usize)?.max(1),
            gateway_url: non_empty_var("RELAY_GATEWAY_URL"),
            gateway_token: non_empty_var("RELAY_GATEWAY_TOKEN").map(SecretString::from),
            log_dir: non_empty_var("RELAY_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Automatic acknowledgement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReplyConfig {
    pub enabled: bool,
    pub text: String,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            text: DEFAULT_AUTO_REPLY_TEXT.to_string(),
        }
    }
}

/// Operator-editable settings persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedConfig {
    /// Chat that receives forwarded messages.
    #[serde(default)]
    pub control_channel_id: Option<String>,
    #[serde(default)]
    pub auto_reply: AutoReplyConfig,
}

/// A partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    pub control_channel_id: Option<String>,
    pub auto_reply_enabled: Option<bool>,
    pub auto_reply_text: Option<String>,
}

impl PersistedConfig {
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(id) = &patch.control_channel_id {
            self.control_channel_id = Some(id.clone());
        }
        if let Some(enabled) = patch.auto_reply_enabled {
            self.auto_reply.enabled = enabled;
        }
        if let Some(text) = &patch.auto_reply_text {
            self.auto_reply.text = text.clone();
        }
    }
}

/// Where [`PersistedConfig`] lives.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the stored config; a missing store yields the defaults.
    async fn load(&self) -> Result<PersistedConfig, ConfigError>;

    /// Replace the stored config with `config`.
    async fn save(&self, config: &PersistedConfig) -> Result<(), ConfigError>;
}

/// JSON file on disk, replaced atomically on every save.
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, config: &PersistedConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    async fn load(&self) -> Result<PersistedConfig, ConfigError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedConfig::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    async fn save(&self, config: &PersistedConfig) -> Result<(), ConfigError> {
        self.write(config).await?;
        tracing::debug!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryConfigStore {
    config: Mutex<PersistedConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: PersistedConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<PersistedConfig, ConfigError> {
        Ok(self
            .config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, config: &PersistedConfig) -> Result<(), ConfigError> {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        Ok(())
    }
}
