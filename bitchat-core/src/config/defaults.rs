//! Default configuration values
//!
//! All defaults live here so they are easy to find and change.

use std::time::Duration;

// Dispatcher defaults
pub const DEFAULT_MAX_LOG_SIZE: usize = 100;
pub const DEFAULT_LOG_TO_CONSOLE: bool = true;
pub const DEFAULT_CAPTURE_GLOBAL_ERRORS: bool = true;
pub const DEFAULT_CAPTURE_UNHANDLED_REJECTIONS: bool = true;
pub const DEFAULT_RECENT_ERRORS: usize = 10;
pub const STATS_RECENT_ERRORS: usize = 5;

// Retry defaults
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_JITTER_FACTOR: f64 = 0.1;

// Circuit breaker defaults
pub const DEFAULT_CB_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_CB_SUCCESS_THRESHOLD: u32 = 2;
pub const DEFAULT_CB_RECOVERY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CB_WINDOW_MS: u64 = 60_000;

// Backoff hints
pub const RATE_LIMIT_BACKOFF_MS: u64 = 30_000;
pub const TIMEOUT_BACKOFF_MS: u64 = 5_000;
pub const CONNECTION_BACKOFF_MS: u64 = 10_000;
pub const DEFAULT_BACKOFF_MS: u64 = 1_000;

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Words that mark a failure message as network related
pub const RETRYABLE_MESSAGE_PATTERNS: &[&str] = &[
    "network",
    "timeout",
    "connection",
    "econnrefused",
    "econnreset",
    "etimedout",
];

/// Helper to create Duration from milliseconds
pub const fn duration_ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
