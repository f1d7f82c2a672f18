//! Daemon configuration loaded from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mpv::DEFAULT_SOCKET;

/// Discord application whose assets (`logo`, `play`, `pause`, `stop`) are used.
pub const DEFAULT_APPLICATION_ID: &str = "484736379171897344";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config: {0}")]
  Io(#[from] std::io::Error),
  #[error("Invalid config file: {0}")]
  Json(#[from] serde_json::Error),
  #[error("{0}")]
  Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
  /// Discord application (client) id.
  #[serde(default = "default_application_id")]
  pub application_id: String,

  /// mpv `--input-ipc-server` path.
  #[serde(default = "default_mpv_socket")]
  pub mpv_socket: String,

  /// Settings file override (None = user config dir).
  #[serde(default)]
  pub settings_path: Option<PathBuf>,

  /// How long to wait for Discord to accept the connection, in seconds.
  #[serde(default = "default_handshake_timeout")]
  pub handshake_timeout_secs: u64,

  /// Log filter used when `RUST_LOG` is unset.
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

fn default_application_id() -> String {
  DEFAULT_APPLICATION_ID.to_string()
}

fn default_mpv_socket() -> String {
  DEFAULT_SOCKET.to_string()
}

fn default_handshake_timeout() -> u64 {
  10
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      application_id: default_application_id(),
      mpv_socket: default_mpv_socket(),
      settings_path: None,
      handshake_timeout_secs: default_handshake_timeout(),
      log_level: default_log_level(),
    }
  }
}

impl AppConfig {
  /// Default location under the user's config directory.
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nowplaying-rpc").join("config.json"))
  }

  /// Load from `path`. A missing file yields the defaults.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    if !path.exists() {
      log::debug!("No config file at {:?}, using defaults", path);
      return Ok(Self::default());
    }

    let raw = std::fs::read_to_string(path)?;
    let config: Self = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.application_id.chars().all(|c| c.is_ascii_digit())
      || self.application_id.parse::<i64>().is_err()
    {
      return Err(ConfigError::Invalid(
        "Application id must be a non-empty numeric snowflake".to_string(),
      ));
    }
    if self.mpv_socket.trim().is_empty() {
      return Err(ConfigError::Invalid("mpv socket path cannot be empty".to_string()));
    }
    if !(1..=60).contains(&self.handshake_timeout_secs) {
      return Err(ConfigError::Invalid(
        "Handshake timeout must be between 1 and 60 seconds".to_string(),
      ));
    }
    if self.log_level.trim().is_empty() {
      return Err(ConfigError::Invalid("Log level cannot be empty".to_string()));
    }
    Ok(())
  }

  pub fn handshake_timeout(&self) -> Duration {
    Duration::from_secs(self.handshake_timeout_secs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_are_valid() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.application_id, "484736379171897344");
    assert_eq!(config.handshake_timeout(), Duration::from_secs(10));
  }

  #[test]
  fn test_partial_json_uses_defaults() {
    let config: AppConfig =
      serde_json::from_str(r#"{"mpvSocket": "/run/user/1000/mpv", "logLevel": "debug"}"#).unwrap();
    assert_eq!(config.mpv_socket, "/run/user/1000/mpv");
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.application_id, DEFAULT_APPLICATION_ID);
    assert_eq!(config.settings_path, None);
  }

  #[test]
  fn test_validation() {
    let bad_timeout = AppConfig {
      handshake_timeout_secs: 0,
      ..AppConfig::default()
    };
    assert!(matches!(bad_timeout.validate(), Err(ConfigError::Invalid(_))));

    let bad_id = AppConfig {
      application_id: "not-a-number".to_string(),
      ..AppConfig::default()
    };
    assert!(bad_id.validate().is_err());

    let oversized_id = AppConfig {
      application_id: "99999999999999999999".to_string(),
      ..AppConfig::default()
    };
    assert!(oversized_id.validate().is_err());

    let bad_socket = AppConfig {
      mpv_socket: " ".to_string(),
      ..AppConfig::default()
    };
    assert!(bad_socket.validate().is_err());
  }

  #[test]
  fn test_load() {
    let dir = std::env::temp_dir().join(format!("nowplaying-rpc-config-{}", uuid::Uuid::new_v4()));
    let path = dir.join("config.json");
    assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());

    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(&path, r#"{"handshakeTimeoutSecs": 3}"#).unwrap();
    assert_eq!(AppConfig::load(&path).unwrap().handshake_timeout_secs, 3);

    std::fs::write(&path, r#"{"handshakeTimeoutSecs": 300}"#).unwrap();
    assert!(matches!(AppConfig::load(&path), Err(ConfigError::Invalid(_))));

    let _ = std::fs::remove_dir_all(&dir);
  }
}
