//! Configuration data structures

use crate::models::Credential;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding a comma-separated credential pool
pub const API_KEYS_ENV: &str = "POLLBOT_API_KEYS";
/// Environment variable holding the delivery bot token
pub const BOT_TOKEN_ENV: &str = "POLLBOT_BOT_TOKEN";

/// Logging level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    #[default]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "trace")]
    Trace,
}

/// Answer speed tier. Each tier maps to a fixed reaction delay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSpeed {
    Instant,
    #[default]
    Superfast,
    Fast,
    Normal,
}

impl AnswerSpeed {
    /// Delay applied before voting for this tier
    pub fn delay(self) -> Duration {
        match self {
            AnswerSpeed::Instant => Duration::ZERO,
            AnswerSpeed::Superfast => Duration::from_millis(50),
            AnswerSpeed::Fast => Duration::from_millis(200),
            AnswerSpeed::Normal => Duration::from_millis(500),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Configuration {
    /// Logging verbosity level
    pub log_level: LogLevel,
    pub accounts: AccountsConfig,
    pub groups: GroupsConfig,
    pub response: ResponseConfig,
    pub reasoning: ReasoningConfig,
    pub login: LoginConfig,
    pub delivery: DeliveryConfig,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Number of accounts to log in
    pub count: usize,
    /// Abort when any account fails to log in instead of running with the rest
    pub require_all: bool,
    /// Folder holding one session file per account
    pub session_folder: PathBuf,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            count: 1,
            require_all: false,
            session_folder: PathBuf::from("sessions"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GroupsConfig {
    /// Group names or usernames to watch, in priority order
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub speed: AnswerSpeed,
    /// Shorter prompts and halved delays
    pub fast_mode: bool,
    /// Cast the vote automatically
    pub auto_vote: bool,
    /// Upper bound on the delay when fast mode halves it
    pub fast_delay_cap_ms: u64,
    /// Maximum number of resolved polls kept in memory
    pub cache_capacity: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            speed: AnswerSpeed::Superfast,
            fast_mode: true,
            auto_vote: true,
            fast_delay_cap_ms: 200,
            cache_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Ordered credential pool; rotation is cyclic
    pub api_keys: Vec<Credential>,
    pub model: String,
    pub base_url: String,
    /// Upper bound on in-flight reasoning calls across all accounts
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_concurrent_requests: 4,
            request_timeout_secs: 30,
        }
    }
}

/// Pre-supplied login secrets for one account
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LoginPreset {
    pub account: usize,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub max_qr_attempts: u32,
    pub max_phone_attempts: u32,
    pub qr_backoff_secs: u64,
    pub phone_backoff_secs: u64,
    pub presets: Vec<LoginPreset>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            max_qr_attempts: 3,
            max_phone_attempts: 3,
            qr_backoff_secs: 30,
            phone_backoff_secs: 10,
            presets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Bot token used to deliver login QR codes. Prefer `POLLBOT_BOT_TOKEN`.
    pub bot_token: Option<String>,
    pub chat_id: String,
    pub api_base: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: "777000".to_string(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// WebSocket URL of the network gateway
    pub url: String,
    /// Timeout for bridge calls that do not wait on a human
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Configuration {
    /// Load configuration from file
    pub fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Configuration = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Return default configuration if file doesn't exist
            Ok(Configuration::default())
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn default_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_dir = dirs::config_dir().ok_or("Could not determine config directory")?;
        Ok(config_dir.join("pollbot").join("config.toml"))
    }

    /// Overlay secrets from the environment. Env values replace file values.
    pub fn apply_env(&mut self) {
        self.apply_env_values(
            std::env::var(API_KEYS_ENV).ok(),
            std::env::var(BOT_TOKEN_ENV).ok(),
        );
    }

    fn apply_env_values(&mut self, api_keys: Option<String>, bot_token: Option<String>) {
        if let Some(keys) = api_keys {
            let keys = split_credentials(&keys);
            if !keys.is_empty() {
                self.reasoning.api_keys = keys;
            }
        }
        if let Some(token) = bot_token.filter(|t| !t.trim().is_empty()) {
            self.delivery.bot_token = Some(token.trim().to_string());
        }
    }

    /// Delay for the configured tier after fast-mode adjustment
    pub fn response_delay(&self) -> Duration {
        crate::responder::response_delay(
            self.response.speed,
            self.response.fast_mode,
            Duration::from_millis(self.response.fast_delay_cap_ms),
        )
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.accounts.count == 0 {
            errors.push("accounts.count must be at least 1".to_string());
        }

        if self.groups.targets.iter().all(|t| t.trim().is_empty()) {
            errors.push("groups.targets must name at least one group".to_string());
        }

        if self.reasoning.api_keys.is_empty() {
            errors.push(format!(
                "reasoning.api_keys is empty (set it in the config file or {})",
                API_KEYS_ENV
            ));
        }

        if self.reasoning.model.trim().is_empty() {
            errors.push("reasoning.model cannot be empty".to_string());
        }

        if self.reasoning.max_concurrent_requests == 0 {
            errors.push("reasoning.max_concurrent_requests must be at least 1".to_string());
        }

        if self.response.cache_capacity == 0 {
            errors.push("response.cache_capacity must be at least 1".to_string());
        }

        if self.login.max_qr_attempts == 0 && self.login.max_phone_attempts == 0 {
            errors.push(
                "login.max_qr_attempts and login.max_phone_attempts cannot both be 0".to_string(),
            );
        }

        if url::Url::parse(&self.bridge.url).is_err() {
            errors.push(format!("bridge.url is not a valid URL: {}", self.bridge.url));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Session file of one account inside `folder`: `user<index>.session`
pub fn session_file(folder: &Path, account: usize) -> PathBuf {
    folder.join(format!("user{}.session", account))
}

/// Split a comma-separated credential list, dropping blanks
pub fn split_credentials(raw: &str) -> Vec<Credential> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Credential::new)
        .collect()
}
