//! Recovery primitives composed the way application code uses them

use bitchat_core::config::DispatcherConfig;
use bitchat_core::dispatcher::{Dispatcher, HandleOptions};
use bitchat_core::error::{BitChatError, ErrorCategory, ErrorCode};
use bitchat_core::recovery::{
    is_transient_error, retry, with_fallback, CircuitBreakerBuilder, CircuitState, Fallback,
    FallbackConfig, RetryConfig,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_retry_stops_once_the_circuit_opens() {
    let breaker = CircuitBreakerBuilder::new("relay")
        .failure_threshold(3)
        .recovery_timeout(Duration::from_secs(60))
        .enable_logging(false)
        .build();
    let config = RetryConfig::fixed(10, Duration::from_millis(100)).with_logging(false);
    let calls = Arc::new(AtomicU32::new(0));

    let result = retry(&config, || {
        let calls = calls.clone();
        let breaker = breaker.clone();
        async move {
            breaker
                .execute(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(BitChatError::relay_unavailable("wss://relay"))
                })
                .await
        }
    })
    .await;

    // Three real attempts open the circuit, the fourth is rejected and is not retried
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.attempts, 4);
    assert!(result.error().unwrap().is_circuit_open());
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_dispatcher_sees_final_failure_and_fallback_serves_cache() {
    let dispatcher = Dispatcher::new(DispatcherConfig {
        log_to_console: false,
        ..Default::default()
    });
    let network_failures = Arc::new(AtomicU32::new(0));
    let n = network_failures.clone();
    dispatcher.add_category_handler(ErrorCategory::Network, move |_| {
        n.fetch_add(1, Ordering::SeqCst);
    });

    let config = RetryConfig::for_network_operations("fetch history").with_logging(false);
    let report = dispatcher.clone();

    let history = with_fallback(
        || async move {
            let outcome = retry(&config, || async {
                Err::<Vec<String>, _>(BitChatError::network_timeout("fetch history"))
            })
            .await;
            assert_eq!(outcome.attempts, config.max_attempts);

            outcome.into_result().map_err(|failure| {
                assert!(is_transient_error(&failure.clone().into()));
                report.handle_error(failure, HandleOptions::silent())
            })
        },
        FallbackConfig::new(Fallback::value(vec!["cached".to_string()])),
    )
    .await
    .unwrap();

    assert_eq!(history, vec!["cached".to_string()]);
    assert_eq!(network_failures.load(Ordering::SeqCst), 1);

    let stats = dispatcher.stats();
    assert_eq!(stats.total_errors, 1);
    assert_eq!(stats.category_count(ErrorCategory::Network), 1);
    assert_eq!(
        stats.last_error.unwrap().error.code(),
        ErrorCode::ConnectionTimeout
    );
}
