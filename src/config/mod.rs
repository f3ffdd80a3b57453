//! # Configuration Management Module
//!
//! Runtime settings for the Gym Legend bot, loaded from a TOML file.
//!
//! ## Configuration Structure
//!
//! - [`BotConfig`] - Bot identity, bootstrap admins, command prefix and pacing
//! - [`StorageConfig`] - Where the Sled database lives
//! - [`ScheduleConfig`] - Local day boundary and the daily/periodic jobs
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! Game balance (prices, damage ranges, chances, cooldowns) is not configurable here; it is
//! compiled in as [`crate::gym::GameTables::standard`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gymlegend::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Bot: {}", config.bot.name);
//!     println!("Database: {}", config.storage.db_path().display());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bot]
//! name = "Gym Legend"
//! token_env = "GYMLEGEND_TOKEN"
//! admins = [123456]
//! inspection_delay_ms = 1000
//! command_prefix = "/"
//!
//! [storage]
//! data_dir = "./data"
//!
//! [schedule]
//! enabled = true
//! utc_offset_minutes = 180
//! payout_offset_minutes = 1
//! protection_sweep_secs = 300
//!
//! [logging]
//! level = "info"
//! file = "gymlegend.log"
//! security_file = "gymlegend-security.log"
//! ```
//!
//! The platform token itself never lives in the file: `token_env` names the environment
//! variable it is read from.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::gym::types::UserId;
use crate::gym::LocalCalendar;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,
    /// Environment variable holding the platform access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Players with admin rights regardless of their stored admin level.
    #[serde(default)]
    pub admins: Vec<UserId>,
    /// Pause between "inspection started" and the result (ms).
    #[serde(default = "default_inspection_delay_ms")]
    pub inspection_delay_ms: u64,
    /// Optional leading character accepted before any command, e.g. "/lift".
    #[serde(default = "default_command_prefix")]
    pub command_prefix: Option<String>,
}

fn default_token_env() -> String {
    "GYMLEGEND_TOKEN".to_string()
}

fn default_inspection_delay_ms() -> u64 {
    1000
}

fn default_command_prefix() -> Option<String> {
    Some("/".to_string())
}

impl BotConfig {
    pub fn inspection_delay(&self) -> Duration {
        Duration::from_millis(self.inspection_delay_ms)
    }

    /// Read the access token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.trim().is_empty())
    }

    /// The command prefix as a single char, if one is configured.
    pub fn prefix_char(&self) -> Option<char> {
        self.command_prefix
            .as_deref()
            .and_then(|p| p.trim().chars().next())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl StorageConfig {
    /// Sled database directory.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("gym")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,
    /// Offset of "local" time from UTC; day boundaries follow it.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// The hall payout runs this many minutes after local midnight.
    #[serde(default = "default_payout_offset_minutes")]
    pub payout_offset_minutes: u32,
    #[serde(default = "default_protection_sweep_secs")]
    pub protection_sweep_secs: u64,
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_utc_offset_minutes() -> i32 {
    180
}

fn default_payout_offset_minutes() -> u32 {
    1
}

fn default_protection_sweep_secs() -> u64 {
    300
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_schedule_enabled(),
            utc_offset_minutes: default_utc_offset_minutes(),
            payout_offset_minutes: default_payout_offset_minutes(),
            protection_sweep_secs: default_protection_sweep_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn calendar(&self) -> Result<LocalCalendar> {
        LocalCalendar::new(self.utc_offset_minutes)
            .map_err(|e| anyhow!("Invalid schedule.utc_offset_minutes: {}", e))
    }

    /// Sweep interval, never shorter than one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.protection_sweep_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// Separate file for `security`-target lines (admin actions, denied admin attempts).
    #[serde(default)]
    pub security_file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values that would only fail later at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.bot.name.trim().is_empty() {
            return Err(anyhow!("bot.name must not be empty"));
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if let Some(prefix) = &self.bot.command_prefix {
            let trimmed = prefix.trim();
            if trimmed.chars().count() > 1 || trimmed.chars().any(|c| c.is_alphanumeric()) {
                return Err(anyhow!(
                    "bot.command_prefix must be a single non-alphanumeric character, got '{}'",
                    prefix
                ));
            }
        }
        if self.schedule.payout_offset_minutes >= 24 * 60 {
            return Err(anyhow!("schedule.payout_offset_minutes must be below 1440"));
        }
        self.schedule.calendar()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig {
                name: "Gym Legend".to_string(),
                token_env: default_token_env(),
                admins: Vec::new(),
                inspection_delay_ms: default_inspection_delay_ms(),
                command_prefix: default_command_prefix(),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("gymlegend.log".to_string()),
                security_file: Some("gymlegend-security.log".to_string()),
            },
        }
    }
}
