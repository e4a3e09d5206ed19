//! Dispatcher configuration

use serde::{Deserialize, Serialize};

use super::defaults::*;
use super::{parse_env, parse_env_bool};
use crate::error::{BitChatError, BitChatResult};

/// Settings for the error dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of log entries kept in memory
    pub max_log_size: usize,

    /// Write handled failures to the console transport
    pub log_to_console: bool,

    /// Route panics through the dispatcher while installed
    pub capture_global_errors: bool,

    /// Route failures of tracked background tasks through the dispatcher
    pub capture_unhandled_rejections: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            log_to_console: DEFAULT_LOG_TO_CONSOLE,
            capture_global_errors: DEFAULT_CAPTURE_GLOBAL_ERRORS,
            capture_unhandled_rejections: DEFAULT_CAPTURE_UNHANDLED_REJECTIONS,
        }
    }
}

impl DispatcherConfig {
    /// Load dispatcher configuration from environment variables
    pub fn from_env() -> BitChatResult<Self> {
        let mut config = Self::default();

        if let Some(size) = parse_env("BITCHAT_MAX_LOG_SIZE")? {
            config.max_log_size = size;
        }
        if let Some(enabled) = parse_env_bool("BITCHAT_LOG_TO_CONSOLE")? {
            config.log_to_console = enabled;
        }
        if let Some(enabled) = parse_env_bool("BITCHAT_CAPTURE_GLOBAL_ERRORS")? {
            config.capture_global_errors = enabled;
        }
        if let Some(enabled) = parse_env_bool("BITCHAT_CAPTURE_UNHANDLED_REJECTIONS")? {
            config.capture_unhandled_rejections = enabled;
        }

        Ok(config)
    }

    pub fn validate(&self) -> BitChatResult<()> {
        if self.max_log_size == 0 {
            return Err(BitChatError::configuration(
                "dispatcher",
                "max_log_size must be at least 1",
            ));
        }
        Ok(())
    }

    /// Apply a partial update
    pub fn apply(&mut self, patch: &DispatcherConfigPatch) {
        if let Some(size) = patch.max_log_size {
            self.max_log_size = size;
        }
        if let Some(enabled) = patch.log_to_console {
            self.log_to_console = enabled;
        }
        if let Some(enabled) = patch.capture_global_errors {
            self.capture_global_errors = enabled;
        }
        if let Some(enabled) = patch.capture_unhandled_rejections {
            self.capture_unhandled_rejections = enabled;
        }
    }
}

/// Partial dispatcher configuration; unset fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfigPatch {
    pub max_log_size: Option<usize>,
    pub log_to_console: Option<bool>,
    pub capture_global_errors: Option<bool>,
    pub capture_unhandled_rejections: Option<bool>,
}

impl DispatcherConfigPatch {
    pub fn max_log_size(mut self, size: usize) -> Self {
        self.max_log_size = Some(size);
        self
    }

    pub fn log_to_console(mut self, enabled: bool) -> Self {
        self.log_to_console = Some(enabled);
        self
    }

    pub fn capture_global_errors(mut self, enabled: bool) -> Self {
        self.capture_global_errors = Some(enabled);
        self
    }

    pub fn capture_unhandled_rejections(mut self, enabled: bool) -> Self {
        self.capture_unhandled_rejections = Some(enabled);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_log_size, 100);
        assert!(config.log_to_console);
        assert!(config.capture_global_errors);
        assert!(config.capture_unhandled_rejections);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_patch_only_touches_set_fields() {
        let mut config = DispatcherConfig::default();
        config.apply(&DispatcherConfigPatch::default().max_log_size(5));
        assert_eq!(config.max_log_size, 5);
        assert!(config.log_to_console);

        config.apply(&DispatcherConfigPatch::default().log_to_console(false));
        assert_eq!(config.max_log_size, 5);
        assert!(!config.log_to_console);
    }

    #[test]
    fn test_zero_log_size_rejected() {
        let config = DispatcherConfig {
            max_log_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
