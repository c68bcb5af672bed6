use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `telegram.token`
pub const TOKEN_ENV: &str = "BIRTHDAY_BOT_TOKEN";
/// Environment variable overriding `telegram.username`
pub const USERNAME_ENV: &str = "BIRTHDAY_BOT_USERNAME";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Apply environment overrides for secrets and identity
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            log::debug!("Using bot token from {}", TOKEN_ENV);
            self.telegram.token = token;
        }
        if let Some(username) = lookup(USERNAME_ENV).filter(|u| !u.trim().is_empty()) {
            self.telegram.username = username;
        }
    }

    /// Resolve the registry file path; relative paths are taken from `data_dir`
    pub fn data_file(&self, data_dir: &Path) -> PathBuf {
        if self.general.data_file.is_absolute() {
            self.general.data_file.clone()
        } else {
            data_dir.join(&self.general.data_file)
        }
    }
}

/// General configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Registry file (JSON object of name -> date)
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    /// Log level for the log file: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log level mirrored to stderr
    #[serde(default = "default_console_level")]
    pub console_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            data_file: default_data_file(),
            log_level: default_log_level(),
            console_level: default_console_level(),
        }
    }
}

/// Telegram Bot API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather
    #[serde(default)]
    pub token: String,

    /// Bot username, used to accept `/command@username` addressing
    #[serde(default)]
    pub username: String,

    /// Long-poll timeout for getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Back-off after a failed poll
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Discard updates queued while the bot was offline
    #[serde(default = "default_drop_pending_updates")]
    pub drop_pending_updates: bool,

    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        TelegramConfig {
            token: String::new(),
            username: String::new(),
            poll_timeout_secs: default_poll_timeout(),
            retry_delay_secs: default_retry_delay(),
            drop_pending_updates: default_drop_pending_updates(),
            api_url: default_api_url(),
        }
    }
}

impl TelegramConfig {
    /// Username without a leading '@', or None when unset
    pub fn bot_username(&self) -> Option<&str> {
        let name = self.username.trim().trim_start_matches('@');
        (!name.is_empty()).then_some(name)
    }
}

// Default value functions for serde
fn default_data_file() -> PathBuf {
    PathBuf::from("birthdays.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_console_level() -> String {
    "info".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_retry_delay() -> u64 {
    5
}

fn default_drop_pending_updates() -> bool {
    true
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

/// Trait for configuration storage
pub trait ConfigStorage: Send + Sync {
    /// Load configuration from file
    fn load(&self) -> Result<Config>;

    /// Get the config file path
    fn path(&self) -> &PathBuf;

    /// Create default configuration file if it doesn't exist
    fn create_default(&self) -> Result<()>;
}

/// TOML-based implementation of ConfigStorage
pub struct TomlConfigStorage {
    path: PathBuf,
}

impl TomlConfigStorage {
    /// Create a new TomlConfigStorage with the given path
    pub fn new(path: PathBuf) -> Self {
        TomlConfigStorage { path }
    }
}

impl ConfigStorage for TomlConfigStorage {
    fn load(&self) -> Result<Config> {
        // If file doesn't exist, create default and return it
        if !self.path.exists() {
            log::info!(
                "Config file not found at {:?}, creating default configuration",
                self.path
            );
            self.create_default()?;
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {:?}", self.path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", self.path))?;

        log::info!("Loaded configuration from {:?}", self.path);
        log::debug!(
            "Config: data_file={:?}, poll_timeout={}s",
            config.general.data_file,
            config.telegram.poll_timeout_secs
        );

        Ok(config)
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn create_default(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        // Use the example config compiled into the binary
        let example_config = include_str!("../../birthday-bot.toml.example");

        fs::write(&self.path, example_config)
            .with_context(|| format!("Failed to create default config at {:?}", self.path))?;

        log::info!("Created default configuration at {:?}", self.path);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.general.data_file, PathBuf::from("birthdays.json"));
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.telegram.retry_delay_secs, 5);
        assert!(config.telegram.drop_pending_updates);
        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(include_str!("../../birthday-bot.toml.example")).unwrap();
        assert_eq!(config.general.data_file, PathBuf::from("birthdays.json"));
        assert!(config.telegram.token.is_empty());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let toml_str = r#"
        [telegram]
        token = "123:abc"
        username = "@birthday_bot"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.telegram.token, "123:abc");
        assert_eq!(config.telegram.bot_username(), Some("birthday_bot"));
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            TOKEN_ENV => Some("999:xyz".to_string()),
            USERNAME_ENV => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.telegram.token, "999:xyz");
        assert_eq!(config.telegram.bot_username(), None);
    }

    #[test]
    fn test_data_file_resolution() {
        let mut config = Config::default();
        assert_eq!(
            config.data_file(Path::new("/var/lib/bot")),
            PathBuf::from("/var/lib/bot/birthdays.json")
        );

        config.general.data_file = PathBuf::from("/tmp/other.json");
        assert_eq!(
            config.data_file(Path::new("/var/lib/bot")),
            PathBuf::from("/tmp/other.json")
        );
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let storage = TomlConfigStorage::new(dir.path().join("birthday-bot.toml"));

        let config = storage.load().unwrap();

        assert!(storage.path().exists());
        assert_eq!(config.telegram.poll_timeout_secs, 30);
    }
}
