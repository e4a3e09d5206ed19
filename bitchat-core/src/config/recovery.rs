//! Retry and circuit breaker settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults::*;
use super::{parse_duration_from_env, parse_env};
use crate::error::{BitChatError, BitChatResult, ErrorCategory, ErrorCode, TRANSIENT_CODES};

/// Serializable retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts including the first one
    pub max_attempts: u32,

    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    pub backoff_multiplier: f64,

    /// Symmetric jitter as a fraction of the delay, in [0, 1]
    pub jitter_factor: f64,

    /// Codes that are always retried
    pub retryable_codes: Vec<ErrorCode>,

    /// Categories that are retried when the code is not listed
    pub retryable_categories: Vec<ErrorCategory>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_delay: duration_ms(DEFAULT_RETRY_INITIAL_DELAY_MS),
            max_delay: duration_ms(DEFAULT_RETRY_MAX_DELAY_MS),
            backoff_multiplier: DEFAULT_RETRY_MULTIPLIER,
            jitter_factor: DEFAULT_RETRY_JITTER_FACTOR,
            retryable_codes: TRANSIENT_CODES.to_vec(),
            retryable_categories: vec![ErrorCategory::Network, ErrorCategory::Sync],
        }
    }
}

impl RetrySettings {
    /// Load retry settings from environment variables
    pub fn from_env() -> BitChatResult<Self> {
        let mut config = Self::default();

        if let Some(attempts) = parse_env("BITCHAT_RETRY_MAX_ATTEMPTS")? {
            config.max_attempts = attempts;
        }
        config.initial_delay =
            parse_duration_from_env("BITCHAT_RETRY_INITIAL_DELAY_MS", config.initial_delay);
        config.max_delay = parse_duration_from_env("BITCHAT_RETRY_MAX_DELAY_MS", config.max_delay);
        if let Some(multiplier) = parse_env("BITCHAT_RETRY_BACKOFF_MULTIPLIER")? {
            config.backoff_multiplier = multiplier;
        }
        if let Some(jitter) = parse_env("BITCHAT_RETRY_JITTER_FACTOR")? {
            config.jitter_factor = jitter;
        }

        Ok(config)
    }

    pub fn validate(&self) -> BitChatResult<()> {
        if self.max_attempts == 0 {
            return Err(BitChatError::configuration(
                "retry",
                "max_attempts must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(BitChatError::configuration(
                "retry",
                format!("jitter_factor must be within [0, 1], got {}", self.jitter_factor),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(BitChatError::configuration(
                "retry",
                format!(
                    "backoff_multiplier must be at least 1, got {}",
                    self.backoff_multiplier
                ),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(BitChatError::configuration(
                "retry",
                "max_delay must not be shorter than initial_delay",
            ));
        }
        Ok(())
    }
}

/// Serializable circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Failures inside `window` that open the circuit
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit
    pub success_threshold: u32,

    /// Time spent open before a probe is allowed
    #[serde(with = "humantime_serde")]
    pub recovery_timeout: Duration,

    /// Sliding window for counting failures
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CB_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_CB_SUCCESS_THRESHOLD,
            recovery_timeout: duration_ms(DEFAULT_CB_RECOVERY_TIMEOUT_MS),
            window: duration_ms(DEFAULT_CB_WINDOW_MS),
        }
    }
}

impl CircuitBreakerSettings {
    /// Load circuit breaker settings from environment variables
    pub fn from_env() -> BitChatResult<Self> {
        let mut config = Self::default();

        if let Some(threshold) = parse_env("BITCHAT_CB_FAILURE_THRESHOLD")? {
            config.failure_threshold = threshold;
        }
        if let Some(threshold) = parse_env("BITCHAT_CB_SUCCESS_THRESHOLD")? {
            config.success_threshold = threshold;
        }
        config.recovery_timeout =
            parse_duration_from_env("BITCHAT_CB_RECOVERY_TIMEOUT_MS", config.recovery_timeout);
        config.window = parse_duration_from_env("BITCHAT_CB_WINDOW_MS", config.window);

        Ok(config)
    }

    pub fn validate(&self) -> BitChatResult<()> {
        if self.failure_threshold == 0 {
            return Err(BitChatError::configuration(
                "circuit_breaker",
                "failure_threshold must be at least 1",
            ));
        }
        if self.success_threshold == 0 {
            return Err(BitChatError::configuration(
                "circuit_breaker",
                "success_threshold must be at least 1",
            ));
        }
        if self.window.is_zero() {
            return Err(BitChatError::configuration(
                "circuit_breaker",
                "window must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults_are_valid() {
        let settings = RetrySettings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.retryable_codes.contains(&ErrorCode::RateLimited));
        assert_eq!(
            settings.retryable_categories,
            vec![ErrorCategory::Network, ErrorCategory::Sync]
        );
    }

    #[test]
    fn test_retry_validation() {
        let mut settings = RetrySettings::default();
        settings.jitter_factor = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = RetrySettings::default();
        settings.backoff_multiplier = 0.5;
        assert!(settings.validate().is_err());

        let mut settings = RetrySettings::default();
        settings.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_circuit_breaker_validation() {
        assert!(CircuitBreakerSettings::default().validate().is_ok());

        let settings = CircuitBreakerSettings {
            failure_threshold: 0,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Configuration);
    }
}
