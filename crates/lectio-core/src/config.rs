//! Lectio configuration system.
//!
//! TOML file with per-field defaults, loaded from `~/.lectio/config.toml`
//! unless an explicit path is given.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LectioError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LectioConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

impl LectioConfig {
    /// Load config from the default path, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LectioError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LectioError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Check required settings before wiring anything up.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            return Err(LectioError::Config("telegram.bot_token is required".into()));
        }
        if self.telegram.admin_chat_id == 0 {
            return Err(LectioError::Config(
                "telegram.admin_chat_id is required".into(),
            ));
        }
        if self.watcher.check_interval_minutes == 0 {
            return Err(LectioError::Config(
                "watcher.check_interval_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Lectio home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lectio")
    }

    /// Database path, defaulting under the home directory.
    pub fn db_path(&self) -> PathBuf {
        if self.storage.db_path.is_empty() {
            Self::home_dir().join("lectio.db")
        } else {
            PathBuf::from(&self.storage.db_path)
        }
    }
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Chat that receives startup/shutdown notices and admin commands.
    #[serde(default)]
    pub admin_chat_id: i64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    1
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_chat_id: 0,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Upstream timetable API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Division alias used for program discovery.
    #[serde(default = "default_division")]
    pub division_alias: String,
}

fn default_base_url() -> String {
    "https://timetable.spbu.ru/api/v1".into()
}
fn default_division() -> String {
    "GSOM".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            division_alias: default_division(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file path; empty means `~/.lectio/lectio.db`.
    #[serde(default)]
    pub db_path: String,
}

/// Poll watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u64,
    /// Regular watch window: today + N days.
    #[serde(default = "default_regular_days")]
    pub regular_days: i64,
    /// Session watch window: today + N days.
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Cooldown between session-window probes.
    #[serde(default = "default_session_hours")]
    pub session_check_hours: i64,
    /// Campus-local clock offset from UTC.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i64,
}

fn default_check_interval() -> u64 {
    10
}
fn default_regular_days() -> i64 {
    14
}
fn default_session_days() -> i64 {
    90
}
fn default_session_hours() -> i64 {
    6
}
fn default_utc_offset() -> i64 {
    3
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: default_check_interval(),
            regular_days: default_regular_days(),
            session_days: default_session_days(),
            session_check_hours: default_session_hours(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LectioConfig::default();
        assert_eq!(config.watcher.check_interval_minutes, 10);
        assert_eq!(config.watcher.regular_days, 14);
        assert_eq!(config.watcher.session_days, 90);
        assert!(config.api.base_url.contains("timetable"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [telegram]
            bot_token = "123:abc"
            admin_chat_id = 42

            [watcher]
            check_interval_minutes = 5
        "#;
        let config: LectioConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.watcher.check_interval_minutes, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.watcher.session_check_hours, 6);
    }

    #[test]
    fn test_validate_requires_token_and_admin() {
        let mut config = LectioConfig::default();
        assert!(config.validate().is_err());
        config.telegram.bot_token = "123:abc".into();
        assert!(config.validate().is_err());
        config.telegram.admin_chat_id = 42;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_check_interval() {
        let mut config = LectioConfig::default();
        config.telegram.bot_token = "123:abc".into();
        config.telegram.admin_chat_id = 42;
        config.watcher.check_interval_minutes = 0;
        assert!(config.validate().is_err());
    }
}
