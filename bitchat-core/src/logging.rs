//! Subscriber setup for `tracing`
//!
//! The dispatcher's console transport writes through `tracing`, so the
//! subscriber installed here decides where handled failures end up.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{BitChatError, BitChatResult};

/// Build the filter: `RUST_LOG` wins over the configured level
pub fn build_filter(config: &LoggingConfig) -> BitChatResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.level).map_err(|e| {
        BitChatError::configuration(
            "logging",
            format!("Invalid log directive '{}': {}", config.level, e),
        )
    })
}

/// Install the global subscriber
///
/// Returns `Ok(false)` when a subscriber was already installed, so calling
/// this more than once is harmless.
pub fn init(config: &LoggingConfig) -> BitChatResult<bool> {
    let filter = build_filter(config)?;

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .try_init()
            .is_ok()
    };

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        let first = init(&config).unwrap();
        let second = init(&config).unwrap();
        assert!(!second || !first);
    }

    #[test]
    fn test_bad_directive_is_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "bitchat_core=loud".to_string(),
            ..Default::default()
        };
        assert!(build_filter(&config).is_err());
    }
}
