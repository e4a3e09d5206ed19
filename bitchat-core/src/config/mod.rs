//! Configuration for the error subsystem
//!
//! Every section has sensible defaults, can be loaded from TOML or from
//! `BITCHAT_*` environment variables, and is checked by `validate()`.
//!
//! ```toml
//! [dispatcher]
//! max_log_size = 200
//!
//! [retry]
//! max_attempts = 5
//! initial_delay = "500ms"
//!
//! [circuit_breaker]
//! failure_threshold = 3
//! recovery_timeout = "30s"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BitChatError, BitChatResult};

pub mod defaults;
pub mod dispatcher;
pub mod logging;
pub mod recovery;

pub use dispatcher::{DispatcherConfig, DispatcherConfigPatch};
pub use logging::LoggingConfig;
pub use recovery::{CircuitBreakerSettings, RetrySettings};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitchatConfig {
    /// Error dispatcher settings
    pub dispatcher: DispatcherConfig,

    /// Default retry policy
    pub retry: RetrySettings,

    /// Default circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerSettings,

    /// Log output
    pub logging: LoggingConfig,
}

impl BitchatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> BitChatResult<Self> {
        let config = Self {
            dispatcher: DispatcherConfig::from_env()?,
            retry: RetrySettings::from_env()?,
            circuit_breaker: CircuitBreakerSettings::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> BitChatResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            BitChatError::configuration("config", format!("Failed to parse TOML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> BitChatResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BitChatError::configuration(
                "config",
                format!("Failed to read {}: {}", path.display(), e),
            )
            .with_foreign_cause(&e)
        })?;

        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> BitChatResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            BitChatError::configuration("config", format!("Failed to render TOML: {}", e))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> BitChatResult<()> {
        self.dispatcher.validate()?;
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Parse an environment variable, `None` when unset
pub(crate) fn parse_env<T: FromStr>(key: &str) -> BitChatResult<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BitChatError::configuration("env", format!("Invalid {}", key))),
        Err(_) => Ok(None),
    }
}

/// Parse a boolean environment variable; accepts 1/0, true/false, yes/no
pub(crate) fn parse_env_bool(key: &str) -> BitChatResult<Option<bool>> {
    match std::env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(BitChatError::configuration("env", format!("Invalid {}", key))),
        },
        Err(_) => Ok(None),
    }
}

/// Millisecond duration from the environment, falling back to `default`
pub(crate) fn parse_duration_from_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serial_test::serial;

    #[test]
    fn test_default_config_validation() {
        assert!(BitchatConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BitchatConfig::from_toml_str(
            r#"
            [dispatcher]
            max_log_size = 250

            [retry]
            initial_delay = "250ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatcher.max_log_size, 250);
        assert!(config.dispatcher.log_to_console);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, defaults::DEFAULT_RETRY_MAX_ATTEMPTS);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BitchatConfig::default();
        let rendered = config.to_toml_string().unwrap();
        let parsed = BitchatConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        for content in ["[retry]\nmax_attempts = 0\n", "not toml at all ["] {
            let err = BitchatConfig::from_toml_str(content).unwrap_err();
            assert_eq!(err.code(), ErrorCode::Configuration);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("BITCHAT_MAX_LOG_SIZE", "42");
        std::env::set_var("BITCHAT_LOG_TO_CONSOLE", "false");
        std::env::set_var("BITCHAT_RETRY_MAX_ATTEMPTS", "7");
        std::env::set_var("BITCHAT_CB_WINDOW_MS", "1500");

        let config = BitchatConfig::from_env();

        std::env::remove_var("BITCHAT_MAX_LOG_SIZE");
        std::env::remove_var("BITCHAT_LOG_TO_CONSOLE");
        std::env::remove_var("BITCHAT_RETRY_MAX_ATTEMPTS");
        std::env::remove_var("BITCHAT_CB_WINDOW_MS");

        let config = config.unwrap();
        assert_eq!(config.dispatcher.max_log_size, 42);
        assert!(!config.dispatcher.log_to_console);
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.circuit_breaker.window, Duration::from_millis(1500));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        std::env::set_var("BITCHAT_MAX_LOG_SIZE", "lots");
        let result = BitchatConfig::from_env();
        std::env::remove_var("BITCHAT_MAX_LOG_SIZE");
        assert!(result.is_err());
    }
}
