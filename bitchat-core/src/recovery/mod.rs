//! Recovery from transient failures
//!
//! The pieces here are independent of the dispatcher and compose freely:
//!
//! - [`retry`] re-runs an operation with jittered exponential backoff
//! - [`CircuitBreaker`] stops calling a dependency that keeps failing
//! - [`with_fallback`] substitutes values when an operation fails
//! - [`is_transient_error`] and [`get_backoff_time`] classify failures for
//!   callers with their own policies
//! - [`create_error_debouncer`] and [`create_error_throttler`] rate limit
//!   error streams
//!
//! ```rust
//! use bitchat_core::recovery::{retry, CircuitBreakerBuilder, RetryConfig};
//! use bitchat_core::BitChatError;
//!
//! # async fn example() {
//! let breaker = CircuitBreakerBuilder::new("relay").build();
//! let config = RetryConfig::for_network_operations("relay connect");
//!
//! let result = retry(&config, || {
//!     breaker.execute(|| async { Err::<(), _>(BitChatError::offline()) })
//! })
//! .await;
//! assert!(!result.is_success());
//! # }
//! ```

pub mod circuit_breaker;
pub mod fallback;
pub mod rate;
pub mod registry;
pub mod retry;
pub mod transient;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig, CircuitState, CircuitStats,
    StateChangeCallback,
};
pub use fallback::{with_fallback, Fallback, FallbackCallback, FallbackConfig, FallbackLevel};
pub use rate::{create_error_debouncer, create_error_throttler, ErrorDebouncer, ErrorThrottler};
pub use registry::CircuitBreakerRegistry;
pub use retry::{
    retry, retry_with_cancel, with_retry, RetryCallback, RetryConfig, RetryPredicate, RetryResult,
};
pub use transient::{backoff_hint, get_backoff_time, is_transient_error, should_backoff};
