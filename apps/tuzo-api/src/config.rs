//! # API Configuration
//!
//! Configuration for the Tuzo API server.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TUZO_DB_PATH=/var/lib/tuzo/tuzo.db                                 │
//! │     TUZO_PORT=9000                                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/tuzo/tuzo.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.tuzo.tuzo/tuzo.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     0.0.0.0:8080, ./tuzo.db, KES at 129.50                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # tuzo.toml
//! [server]
//! bind_addr = "127.0.0.1"
//! port = 8080
//!
//! [database]
//! path = "/var/lib/tuzo/tuzo.db"
//! max_connections = 5
//! operation_timeout_ms = 10000
//!
//! [rules]
//! display_currency = "KES"
//! display_rate = 129.5
//! earn_rate = 100
//! referrer_bonus_points = 30
//! referee_bonus_points = 15
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 25
//! max_backoff_ms = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use tuzo_core::{CoreError, LoyaltyRules};
use tuzo_db::{DbConfig, RetryPolicy};

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Loyalty rules failed validation.
    #[error("Invalid loyalty rules: {0}")]
    Rules(#[from] CoreError),

    /// Any other out-of-range setting.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Server Settings
// =============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address (default: 0.0.0.0 for all interfaces).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Listening port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Deadline for one attempt of a ledger operation (milliseconds).
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tuzo.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_operation_timeout() -> u64 {
    10_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            operation_timeout_ms: default_operation_timeout(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete API configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuzoConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    /// Business constants: earn rate, bonuses, display currency.
    #[serde(default)]
    pub rules: LoyaltyRules,

    /// Retry policy for transient storage faults.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl TuzoConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tuzo.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.operation_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.operation_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.max_backoff_ms must not be below retry.initial_backoff_ms".into(),
            ));
        }

        self.rules.validate()?;
        Ok(())
    }

    /// Applies overrides from `lookup`, normally the process environment.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TUZO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(addr) = lookup("TUZO_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Some(port) = lookup("TUZO_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding port from environment");
                    self.server.port = p;
                }
                Err(_) => warn!(value = %port, "Ignoring unparseable TUZO_PORT"),
            }
        }

        if let Some(rate) = lookup("TUZO_DISPLAY_RATE") {
            match rate.parse::<f64>() {
                Ok(r) => self.rules.display_rate = r,
                Err(_) => warn!(value = %rate, "Ignoring unparseable TUZO_DISPLAY_RATE"),
            }
        }

        if let Some(currency) = lookup("TUZO_DISPLAY_CURRENCY") {
            self.rules.display_currency = currency;
        }

        if let Some(retries) = lookup("TUZO_MAX_RETRIES") {
            match retries.parse::<u32>() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => warn!(value = %retries, "Ignoring unparseable TUZO_MAX_RETRIES"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tuzo", "tuzo")
            .map(|dirs| dirs.config_dir().join("tuzo.toml"))
    }

    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.server.port)
    }

    /// Storage configuration derived from the `[database]` section.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .operation_timeout(Duration::from_millis(self.database.operation_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TuzoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.rules.display_currency, "KES");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TuzoConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [rules]
            display_rate = 130.0
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr, "0.0.0.0");
        assert_eq!(config.rules.display_rate, 130.0);
        assert_eq!(config.rules.referrer_bonus_points, 30);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TUZO_DB_PATH", "/tmp/t.db"),
            ("TUZO_PORT", "7000"),
            ("TUZO_DISPLAY_RATE", "140.25"),
            ("TUZO_DISPLAY_CURRENCY", "UGX"),
            ("TUZO_MAX_RETRIES", "not-a-number"),
        ]);

        let mut config = TuzoConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.rules.display_rate, 140.25);
        assert_eq!(config.rules.display_currency, "UGX");
        // Unparseable values are ignored
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_validation() {
        let mut config = TuzoConfig::default();
        config.rules.display_rate = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Rules(_))));

        let mut config = TuzoConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = TuzoConfig::default();
        config.retry.initial_backoff_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = TuzoConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[rules]"));
    }
}
