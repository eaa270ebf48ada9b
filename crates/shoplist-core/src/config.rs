//! Configuration management for shoplist.
//!
//! Loads configuration from ${SHOPLIST_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::backend::RestSettings;

pub const TELEGRAM_TOKEN_ENV: &str = "SHOPLIST_TELEGRAM_BOT_TOKEN";
pub const BACKEND_URL_ENV: &str = "SHOPLIST_BACKEND_URL";
pub const BACKEND_TOKEN_ENV: &str = "SHOPLIST_BACKEND_TOKEN";

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for shoplist configuration.
    //!
    //! SHOPLIST_HOME resolution order:
    //! 1. SHOPLIST_HOME environment variable (if set)
    //! 2. ~/.config/shoplist (default)

    use std::path::PathBuf;

    pub fn shoplist_home() -> PathBuf {
        if let Ok(home) = std::env::var("SHOPLIST_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".shoplist"),
            |home| home.join(".config").join("shoplist"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        shoplist_home().join("config.toml")
    }
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token for Telegram API.
    pub bot_token: Option<String>,
    /// Allowlist of numeric Telegram user IDs. Empty serves everyone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowlist_user_ids: Vec<i64>,
    pub poll_timeout_secs: u64,
    /// Prefix edited messages with the raw button token.
    pub debug_tokens: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowlist_user_ids: Vec::new(),
            poll_timeout_secs: 30,
            debug_tokens: false,
        }
    }
}

impl TelegramConfig {
    /// Bot token from config, falling back to `SHOPLIST_TELEGRAM_BOT_TOKEN`.
    ///
    /// # Errors
    /// Fails when neither source holds a token.
    pub fn resolve_bot_token(&self) -> Result<String> {
        resolve_value(
            self.bot_token.as_deref(),
            std::env::var(TELEGRAM_TOKEN_ENV).ok(),
        )
        .with_context(|| format!("telegram.bot_token or {TELEGRAM_TOKEN_ENV} is required"))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

/// Session lifetime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub start_node: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 180,
            start_node: "firstpage".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// List service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    /// Token used for user lookup and registration.
    pub start_token: Option<String>,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            start_token: None,
            read_timeout_secs: 15,
            write_timeout_secs: 20,
        }
    }
}

impl BackendConfig {
    /// Resolves URL and token (config first, then environment) into client
    /// settings.
    ///
    /// # Errors
    /// Fails when the URL or token is missing, or the URL is not absolute.
    pub fn rest_settings(&self) -> Result<RestSettings> {
        let base_url = resolve_value(self.base_url.as_deref(), std::env::var(BACKEND_URL_ENV).ok())
            .with_context(|| format!("backend.base_url or {BACKEND_URL_ENV} is required"))?;
        let token = resolve_value(
            self.start_token.as_deref(),
            std::env::var(BACKEND_TOKEN_ENV).ok(),
        )
        .with_context(|| format!("backend.start_token or {BACKEND_TOKEN_ENV} is required"))?;
        self.settings_with(&base_url, token)
    }

    fn settings_with(&self, base_url: &str, token: String) -> Result<RestSettings> {
        validate_url(base_url)?;
        Ok(RestSettings {
            base_url: base_url.to_string(),
            token,
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
        })
    }
}

/// Picks the trimmed config value when non-empty, else the trimmed env value.
fn resolve_value(config_value: Option<&str>, env_value: Option<String>) -> Result<String> {
    config_value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            env_value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
        .context("value not set")
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).with_context(|| format!("Invalid backend base URL: {url}"))?;
    if parsed.cannot_be_a_base() {
        bail!("Backend base URL must be absolute: {url}");
    }
    Ok(())
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Version shown on the settings screen.
    pub service_version: String,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            telegram: TelegramConfig::default(),
            session: SessionConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    ///
    /// # Errors
    /// Fails if the file exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
