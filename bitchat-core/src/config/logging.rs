//! Logging configuration

use serde::{Deserialize, Serialize};

use super::defaults::DEFAULT_LOG_LEVEL;
use super::parse_env_bool;
use crate::error::{BitChatError, BitChatResult};

/// Settings for the `tracing` subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `bitchat_core=debug,warn`
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,

    /// Include the event target in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Load logging configuration from environment variables
    pub fn from_env() -> BitChatResult<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("BITCHAT_LOG_LEVEL") {
            config.level = level;
        }
        if let Some(json) = parse_env_bool("BITCHAT_LOG_JSON")? {
            config.json = json;
        }

        Ok(config)
    }

    pub fn validate(&self) -> BitChatResult<()> {
        tracing_subscriber::EnvFilter::try_new(&self.level).map_err(|e| {
            BitChatError::configuration(
                "logging",
                format!("Invalid log level '{}': {}", self.level, e),
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_validation() {
        assert!(LoggingConfig::default().validate().is_ok());

        let config = LoggingConfig {
            level: "bitchat_core=debug,warn".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = LoggingConfig {
            level: "bitchat_core=loud".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
