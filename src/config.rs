//! Configuration management for Waterius
//!
//! This module handles loading, validation, and management of the poller
//! configuration from YAML files with support for environment variable overrides.

use crate::error::{Result, WateriusError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "WATERIUS_CONFIG";

/// Environment variable overriding the API token
pub const TOKEN_ENV: &str = "WATERIUS_TOKEN";

/// Bounds accepted by the options form for the scan interval
pub const MIN_OPTIONS_SCAN_INTERVAL: u64 = 10;
pub const MAX_OPTIONS_SCAN_INTERVAL: u64 = 86_400;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display name of this account entry
    pub name: String,

    /// Static API token issued by the account portal
    pub token: String,

    /// Refresh interval in minutes
    pub scan_interval_minutes: u64,

    /// Remote API configuration
    pub api: ApiConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// Remote account API parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Scheme and host of the account API, without trailing slash
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (its parent directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Values editable after setup through the options form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsUpdate {
    pub token: String,
    pub scan_interval_minutes: u64,
}

impl OptionsUpdate {
    /// Validate the submitted options
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(WateriusError::validation("token", "Token cannot be empty"));
        }
        if !(MIN_OPTIONS_SCAN_INTERVAL..=MAX_OPTIONS_SCAN_INTERVAL)
            .contains(&self.scan_interval_minutes)
        {
            return Err(WateriusError::Validation {
                field: "scan_interval_minutes".to_string(),
                message: format!(
                    "Must be between {} and {}",
                    MIN_OPTIONS_SCAN_INTERVAL, MAX_OPTIONS_SCAN_INTERVAL
                ),
            });
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first existing location, then apply env overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => {
                let default_paths = [
                    "waterius.yaml",
                    "/data/waterius.yaml",
                    "/etc/waterius/config.yaml",
                ];
                match default_paths.iter().find(|p| Path::new(p).exists()) {
                    Some(path) => Self::from_file(path)?,
                    None => Config::default(),
                }
            }
        };

        if let Ok(token) = std::env::var(TOKEN_ENV)
            && !token.trim().is_empty()
        {
            config.token = token;
        }
        config.token = config.token.trim().to_string();
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(WateriusError::validation("token", "Token cannot be empty"));
        }

        if self.name.trim().is_empty() {
            return Err(WateriusError::validation("name", "Name cannot be empty"));
        }

        if self.api.base_url.trim().is_empty() {
            return Err(WateriusError::validation(
                "api.base_url",
                "Base URL cannot be empty",
            ));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(WateriusError::validation(
                "api.request_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.web.port == 0 {
            return Err(WateriusError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Effective refresh interval; never shorter than one minute
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_minutes.max(1) * 60)
    }

    /// Per-request timeout for the account API
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Stable identifier of this account entry, derived from the token tail
    pub fn unique_id(&self) -> String {
        let token = self.token.trim();
        let tail: String = {
            let chars: Vec<char> = token.chars().collect();
            let start = chars.len().saturating_sub(8);
            chars[start..].iter().collect()
        };
        format!("waterius_{}", tail)
    }

    /// Apply options-form values after validating them
    pub fn apply_options(&mut self, options: &OptionsUpdate) -> Result<()> {
        options.validate()?;
        self.token = options.token.trim().to_string();
        self.scan_interval_minutes = options.scan_interval_minutes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            token: "abcdef0123456789".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.name, "Waterius");
        assert_eq!(config.scan_interval_minutes, 15);
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.api.base_url, "https://account.waterius.ru");
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.token = "   ".to_string();
        assert!(config.validate().is_err());

        config = valid_config();
        config.api.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_update_interval_clamped() {
        let mut config = valid_config();
        config.scan_interval_minutes = 0;
        assert_eq!(config.update_interval(), Duration::from_secs(60));
        config.scan_interval_minutes = 15;
        assert_eq!(config.update_interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_unique_id_uses_token_tail() {
        let config = valid_config();
        assert_eq!(config.unique_id(), "waterius_23456789");

        let short = Config {
            token: "abc".to_string(),
            ..Config::default()
        };
        assert_eq!(short.unique_id(), "waterius_abc");
    }

    #[test]
    fn test_options_bounds() {
        let mut config = valid_config();
        let ok = OptionsUpdate {
            token: " newtoken ".to_string(),
            scan_interval_minutes: 10,
        };
        config.apply_options(&ok).unwrap();
        assert_eq!(config.token, "newtoken");
        assert_eq!(config.scan_interval_minutes, 10);

        let too_small = OptionsUpdate {
            token: "t".to_string(),
            scan_interval_minutes: 9,
        };
        assert!(config.apply_options(&too_small).is_err());
        assert_eq!(config.scan_interval_minutes, 10);

        let too_big = OptionsUpdate {
            token: "t".to_string(),
            scan_interval_minutes: 86_401,
        };
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = valid_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.token, deserialized.token);
        assert_eq!(config.web.port, deserialized.web.port);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("token: xyz\n").unwrap();
        assert_eq!(config.token, "xyz");
        assert_eq!(config.scan_interval_minutes, 15);
        assert_eq!(config.logging.level, "INFO");
    }
}
