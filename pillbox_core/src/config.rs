//! Configuration file support for Pillbox.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/pillbox/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub mascot: MascotConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Mascot tier thresholds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MascotConfig {
    /// Streak length at which the mascot starts thriving
    #[serde(default = "default_thriving_streak")]
    pub thriving_streak: u32,

    /// Consecutive fully-missed required days before the mascot dies
    #[serde(default = "default_dead_after_missed_days")]
    pub dead_after_missed_days: u32,
}

impl Default for MascotConfig {
    fn default() -> Self {
        Self {
            thriving_streak: default_thriving_streak(),
            dead_after_missed_days: default_dead_after_missed_days(),
        }
    }
}

/// Dose timing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes past the scheduled time before a dose counts as late
    #[serde(default = "default_late_after_minutes")]
    pub late_after_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            late_after_minutes: default_late_after_minutes(),
        }
    }
}

/// Push notification configuration
///
/// Credentials are deliberately not part of the file: the notifier reads
/// `ONESIGNAL_APP_ID` and `ONESIGNAL_REST_API_KEY` from the environment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// IANA time zone the reminder schedule is evaluated in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Notification service endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Optional click-through link attached to each push
    #[serde(default)]
    pub site_url: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            api_url: default_api_url(),
            site_url: None,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME")
            .expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("pillbox")
}

fn default_thriving_streak() -> u32 {
    3
}

fn default_dead_after_missed_days() -> u32 {
    3
}

fn default_late_after_minutes() -> u32 {
    60
}

fn default_timezone() -> String {
    "UTC".into()
}

fn default_api_url() -> String {
    "https://onesignal.com/api/v1/notifications".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME")
                .expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("pillbox").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Check threshold and endpoint fields for values the engine and
    /// notifier cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.mascot.thriving_streak == 0 {
            return Err(Error::Config(
                "mascot.thriving_streak must be at least 1".into(),
            ));
        }
        if self.mascot.dead_after_missed_days == 0 {
            return Err(Error::Config(
                "mascot.dead_after_missed_days must be at least 1".into(),
            ));
        }
        if self.schedule.late_after_minutes == 0 {
            return Err(Error::Config(
                "schedule.late_after_minutes must be at least 1".into(),
            ));
        }
        if self.notify.timezone.trim().is_empty() {
            return Err(Error::Config("notify.timezone must not be empty".into()));
        }
        if self.notify.api_url.trim().is_empty() {
            return Err(Error::Config("notify.api_url must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mascot.thriving_streak, 3);
        assert_eq!(config.mascot.dead_after_missed_days, 3);
        assert_eq!(config.schedule.late_after_minutes, 60);
        assert_eq!(config.notify.timezone, "UTC");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.mascot.thriving_streak,
            parsed.mascot.thriving_streak
        );
        assert_eq!(config.notify.api_url, parsed.notify.api_url);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[mascot]
thriving_streak = 7
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.mascot.thriving_streak, 7);
        assert_eq!(config.mascot.dead_after_missed_days, 3); // default
        assert_eq!(config.schedule.late_after_minutes, 60); // default
    }

    #[test]
    fn test_zero_thresholds_rejected() {
        let toml_str = r#"
[mascot]
dead_after_missed_days = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timezone_override() {
        let toml_str = r#"
[notify]
timezone = "America/Sao_Paulo"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.notify.timezone, "America/Sao_Paulo");
        assert!(config.validate().is_ok());
    }
}
