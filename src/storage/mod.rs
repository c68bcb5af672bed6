pub mod config;
pub mod error;
pub mod registry;
pub mod store;

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

pub use config::{Config, ConfigStorage, GeneralConfig, TelegramConfig, TomlConfigStorage};
pub use error::StoreError;
pub use registry::{JsonRegistryStorage, RegistryStorage};
pub use store::BirthdayStore;

/// Ensure XDG data and config directories exist
/// Returns (data_dir, config_dir)
///
/// XDG Base Directory Specification:
/// - Data: $XDG_DATA_HOME/birthday-bot (default: ~/.local/share/birthday-bot)
/// - Config: $XDG_CONFIG_HOME/birthday-bot (default: ~/.config/birthday-bot)
pub fn ensure_directories() -> Result<(PathBuf, PathBuf)> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    let home_path = PathBuf::from(home);

    let data_dir = match env::var("XDG_DATA_HOME") {
        Ok(xdg_data) if !xdg_data.is_empty() => PathBuf::from(xdg_data).join("birthday-bot"),
        _ => home_path.join(".local/share/birthday-bot"),
    };

    let config_dir = match env::var("XDG_CONFIG_HOME") {
        Ok(xdg_config) if !xdg_config.is_empty() => {
            PathBuf::from(xdg_config).join("birthday-bot")
        }
        _ => home_path.join(".config/birthday-bot"),
    };

    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

    log::debug!("Data directory: {:?}", data_dir);
    log::debug!("Config directory: {:?}", config_dir);

    Ok((data_dir, config_dir))
}
