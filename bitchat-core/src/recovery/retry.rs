//! Retry with jittered exponential backoff
//!
//! An operation is attempted up to `max_attempts` times. Whether a failure is
//! retried is decided, in order, by the caller's predicate, the retryable
//! code list, the retryable category list and finally a keyword match on the
//! message. The delay before attempt `n + 1` is
//! `min(initial_delay * multiplier^(n - 1), max_delay)` with symmetric jitter.

use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::defaults::RETRYABLE_MESSAGE_PATTERNS;
use crate::config::RetrySettings;
use crate::error::{BitChatError, BitChatResult, ErrorCategory, ErrorCode};

/// Decides whether a failure on the given attempt should be retried
pub type RetryPredicate = Arc<dyn Fn(&BitChatError, u32) -> bool + Send + Sync>;

/// Called before sleeping with the failure, the attempt that failed and the delay
pub type RetryCallback = Arc<dyn Fn(&BitChatError, u32, Duration) + Send + Sync>;

/// Configuration for retry operations
#[derive(Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Symmetric jitter as a fraction of the delay
    pub jitter_factor: f64,
    pub retryable_codes: Vec<ErrorCode>,
    pub retryable_categories: Vec<ErrorCategory>,
    /// Overrides every other retry rule when set
    pub should_retry: Option<RetryPredicate>,
    pub on_retry: Option<RetryCallback>,
    /// Name used in logs and cancellation failures
    pub operation_name: Option<String>,
    pub enable_logging: bool,
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter_factor", &self.jitter_factor)
            .field("retryable_codes", &self.retryable_codes)
            .field("retryable_categories", &self.retryable_categories)
            .field("should_retry", &self.should_retry.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("operation_name", &self.operation_name)
            .finish()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self::from_settings(settings)
    }
}

impl RetryConfig {
    /// Build from loaded configuration
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay: settings.initial_delay,
            max_delay: settings.max_delay,
            backoff_multiplier: settings.backoff_multiplier,
            jitter_factor: settings.jitter_factor,
            retryable_codes: settings.retryable_codes.clone(),
            retryable_categories: settings.retryable_categories.clone(),
            should_retry: None,
            on_retry: None,
            operation_name: None,
            enable_logging: true,
        }
    }

    /// Fixed delay, no jitter
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
            ..Default::default()
        }
    }

    /// Relay and peer connections: quick first retries, capped at ten seconds
    pub fn for_network_operations(operation_name: &str) -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
            retryable_categories: vec![ErrorCategory::Network],
            operation_name: Some(operation_name.to_string()),
            ..Default::default()
        }
    }

    /// Sync rounds tolerate longer waits between attempts
    pub fn for_sync_operations(operation_name: &str) -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.5,
            jitter_factor: 0.3,
            retryable_categories: vec![ErrorCategory::Network, ErrorCategory::Sync],
            operation_name: Some(operation_name.to_string()),
            ..Default::default()
        }
    }

    /// Local storage contention clears fast; only lock and availability codes retry
    pub fn for_storage_operations(operation_name: &str) -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            retryable_codes: vec![ErrorCode::StorageLocked, ErrorCode::StorageUnavailable],
            retryable_categories: Vec::new(),
            operation_name: Some(operation_name.to_string()),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    pub fn with_retryable_codes(mut self, codes: impl IntoIterator<Item = ErrorCode>) -> Self {
        self.retryable_codes = codes.into_iter().collect();
        self
    }

    pub fn with_retryable_categories(
        mut self,
        categories: impl IntoIterator<Item = ErrorCategory>,
    ) -> Self {
        self.retryable_categories = categories.into_iter().collect();
        self
    }

    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BitChatError, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BitChatError, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    fn operation(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("operation")
    }

    /// Whether `error` raised on `attempt` may be retried
    pub fn is_retryable(&self, error: &BitChatError, attempt: u32) -> bool {
        if let Some(predicate) = &self.should_retry {
            return predicate(error, attempt);
        }
        if self.retryable_codes.contains(&error.code()) {
            return true;
        }
        if self.retryable_categories.contains(&error.category()) {
            return true;
        }

        let message = error.message().to_lowercase();
        RETRYABLE_MESSAGE_PATTERNS
            .iter()
            .any(|pattern| message.contains(pattern))
    }

    /// Delay after `attempt` failed, before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Delay after `attempt` failed, with jitter applied and rounded to the millisecond
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        let jitter = if self.jitter_factor > 0.0 {
            base * self.jitter_factor * rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        Duration::from_millis((base + jitter).round().max(0.0) as u64)
    }
}

/// Outcome of a retry loop
#[derive(Debug)]
pub struct RetryResult<T> {
    pub outcome: BitChatResult<T>,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Time spent sleeping between attempts
    pub total_delay: Duration,
}

impl<T> RetryResult<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&BitChatError> {
        self.outcome.as_ref().err()
    }

    pub fn into_result(self) -> BitChatResult<T> {
        self.outcome
    }
}

/// Retry an async operation with the given configuration
pub async fn retry<F, Fut, T>(config: &RetryConfig, operation: F) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BitChatResult<T>>,
{
    run(config, None, operation).await
}

/// Like [`retry`], abandoning the loop as soon as `token` fires
pub async fn retry_with_cancel<F, Fut, T>(
    config: &RetryConfig,
    token: &CancelToken,
    operation: F,
) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BitChatResult<T>>,
{
    run(config, Some(token), operation).await
}

/// Wrap `operation` so that every call is retried under `config`
///
/// The returned function takes the same argument as `operation` and resolves
/// to its value, or to the failure of the last attempt.
pub fn with_retry<A, T, F, Fut>(
    config: RetryConfig,
    operation: F,
) -> impl Fn(A) -> BoxFuture<'static, BitChatResult<T>>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BitChatResult<T>> + Send + 'static,
    A: Clone + Send + 'static,
    T: Send + 'static,
{
    let config = Arc::new(config);
    let operation = Arc::new(operation);
    move |args| {
        let config = config.clone();
        let operation = operation.clone();

        async move {
            retry(&config, move || operation(args.clone()))
                .await
                .into_result()
        }
        .boxed()
    }
}

async fn run<F, Fut, T>(
    config: &RetryConfig,
    token: Option<&CancelToken>,
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BitChatResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;
    let mut total_delay = Duration::ZERO;

    loop {
        attempts += 1;

        let outcome = match token {
            Some(token) => token.run(config.operation(), operation()).await,
            None => operation().await,
        };

        let error = match outcome {
            Ok(value) => {
                if attempts > 1 && config.enable_logging {
                    debug!("{} succeeded after {} attempts", config.operation(), attempts);
                }
                return RetryResult {
                    outcome: Ok(value),
                    attempts,
                    total_delay,
                };
            }
            Err(error) => error,
        };

        let cancelled = token.is_some_and(|t| t.is_cancelled());
        if cancelled || attempts >= max_attempts || !config.is_retryable(&error, attempts) {
            if config.enable_logging && !cancelled {
                if attempts >= max_attempts {
                    warn!(
                        "{} failed after {} attempts: {}",
                        config.operation(),
                        attempts,
                        error
                    );
                } else {
                    debug!("{} failed with non-retryable error: {}", config.operation(), error);
                }
            }
            return RetryResult {
                outcome: Err(error),
                attempts,
                total_delay,
            };
        }

        let delay = config.delay_for_attempt(attempts);
        if let Some(callback) = &config.on_retry {
            callback(&error, attempts, delay);
        }
        if config.enable_logging {
            warn!(
                "Retry attempt {}/{} for {} after error: {} (waiting {:?})",
                attempts,
                max_attempts,
                config.operation(),
                error,
                delay
            );
        }

        match token {
            Some(token) => {
                let slept = token
                    .run(config.operation(), async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await;
                if let Err(cancelled) = slept {
                    return RetryResult {
                        outcome: Err(cancelled),
                        attempts,
                        total_delay,
                    };
                }
            }
            None => tokio::time::sleep(delay).await,
        }
        total_delay += delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quiet(config: RetryConfig) -> RetryConfig {
        config.with_logging(false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_on_first_attempt() {
        let config = quiet(RetryConfig::fixed(3, Duration::from_millis(10)));
        let counter = Arc::new(AtomicU32::new(0));

        let result = retry(&config, || {
            let count = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(count) }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(result.value(), Some(&0));
        assert_eq!(result.attempts, 1);
        assert_eq!(result.total_delay, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_on_failure() {
        let config = quiet(RetryConfig::fixed(3, Duration::from_millis(10)));
        let counter = Arc::new(AtomicU32::new(0));

        let result = retry(&config, || {
            let count = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(BitChatError::offline())
                } else {
                    Ok(count)
                }
            }
        })
        .await;

        assert_eq!(result.attempts, 3);
        assert_eq!(result.total_delay, Duration::from_millis(20));
        assert_eq!(result.into_result().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_uses_every_attempt() {
        let config = quiet(RetryConfig::fixed(4, Duration::from_millis(5)));
        let counter = Arc::new(AtomicU32::new(0));

        let result = retry(&config, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(BitChatError::connection_failed("relay")) }
        })
        .await;

        assert!(!result.is_success());
        assert_eq!(result.attempts, 4);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(result.error().unwrap().code(), ErrorCode::ConnectionFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error() {
        let config = quiet(RetryConfig::fixed(3, Duration::from_millis(10)));
        let counter = Arc::new(AtomicU32::new(0));

        let result = retry(&config, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(BitChatError::invalid_signature()) }
        })
        .await;

        assert_eq!(result.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_decision_order() {
        let config = RetryConfig::default()
            .with_retryable_codes([ErrorCode::WriteFailed])
            .with_retryable_categories([ErrorCategory::Channel]);

        assert!(config.is_retryable(&BitChatError::write_failed("k"), 1));
        assert!(config.is_retryable(&BitChatError::channel_not_found("#x"), 1));
        assert!(!config.is_retryable(&BitChatError::invalid_signature(), 1));

        // Message keywords are the last resort
        let keyword = BitChatError::new(ErrorCode::Unknown, "ECONNRESET while reading");
        assert!(config.is_retryable(&keyword, 1));

        let vetoed = config.clone().should_retry(|_, _| false);
        assert!(!vetoed.is_retryable(&BitChatError::write_failed("k"), 1));

        let forced = config.should_retry(|_, attempt| attempt < 2);
        assert!(forced.is_retryable(&BitChatError::invalid_signature(), 1));
        assert!(!forced.is_retryable(&BitChatError::invalid_signature(), 2));
    }

    #[test]
    fn test_exponential_delays_are_capped() {
        let config = RetryConfig::default()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500))
            .with_backoff_multiplier(2.0)
            .with_jitter_factor(0.0);

        assert_eq!(config.base_delay(1), Duration::from_millis(100));
        assert_eq!(config.base_delay(2), Duration::from_millis(200));
        assert_eq!(config.base_delay(3), Duration::from_millis(400));
        assert_eq!(config.base_delay(4), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let config = RetryConfig::default()
            .with_initial_delay(Duration::from_millis(1000))
            .with_jitter_factor(0.25);

        for _ in 0..200 {
            let delay = config.delay_for_attempt(1).as_millis();
            assert!((750..=1250).contains(&delay), "delay {} out of bounds", delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_retry_sees_each_failure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let config = quiet(RetryConfig::fixed(3, Duration::from_millis(7)))
            .on_retry(move |error, attempt, delay| s.lock().push((error.code(), attempt, delay)));

        let _ = retry(&config, || async { Err::<(), _>(BitChatError::offline()) }).await;

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                (ErrorCode::NetworkOffline, 1, Duration::from_millis(7)),
                (ErrorCode::NetworkOffline, 2, Duration::from_millis(7)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_wraps_a_reusable_function() {
        let config = quiet(RetryConfig::fixed(3, Duration::from_millis(1)));
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let fetch_peer = with_retry(config, move |peer: String| {
            let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if peer == "offline-peer" || attempt == 1 {
                    Err(BitChatError::peer_unreachable(&peer))
                } else {
                    Ok(format!("{} after {}", peer, attempt))
                }
            }
        });

        assert_eq!(fetch_peer("alice".to_string()).await.unwrap(), "alice after 2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let err = fetch_peer("offline-peer".to_string()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PeerUnreachable);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_between_attempts() {
        let config = quiet(RetryConfig::fixed(10, Duration::from_secs(1)))
            .with_operation_name("sync round");
        let (handle, token) = cancel_pair();
        let counter = Arc::new(AtomicU32::new(0));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            handle.cancel();
        });

        let result = retry_with_cancel(&config, &token, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(BitChatError::offline()) }
        })
        .await;

        canceller.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(result.error().unwrap().code(), ErrorCode::Cancelled);
        assert_eq!(result.total_delay, Duration::from_secs(1));
    }
}
