//! Property-based tests for failure serialization and the dispatcher log bound

use bitchat_core::config::DispatcherConfig;
use bitchat_core::dispatcher::{Dispatcher, HandleOptions};
use bitchat_core::error::{BitChatError, ErrorCode, RawError};
use proptest::prelude::*;
use serde_json::json;
use std::io;

// Strategy for picking any known code
fn code_strategy() -> impl Strategy<Value = ErrorCode> {
    (0..ErrorCode::ALL.len()).prop_map(|i| ErrorCode::ALL[i])
}

// Builds a failure through one of the constructor families
fn build(family: usize, code: ErrorCode, message: String) -> BitChatError {
    match family {
        0 => BitChatError::new(code, message),
        1 => BitChatError::network(code, message),
        2 => BitChatError::crypto(code, message),
        3 => BitChatError::storage(code, message),
        4 => BitChatError::identity(code, message),
        5 => BitChatError::protocol(code, message),
        6 => BitChatError::sync(code, message),
        7 => BitChatError::channel(code, message),
        _ => BitChatError::platform(code, message),
    }
}

// Strategy for a single failure with optional context
fn failure_strategy() -> impl Strategy<Value = BitChatError> {
    (
        0usize..9,
        code_strategy(),
        "[a-zA-Z0-9][\\PC]{0,40}",
        prop::option::of("[a-z]{3,10}"),
        prop::option::of(0i64..10_000),
        prop::bool::ANY,
    )
        .prop_map(|(family, code, message, component, attempt, recoverable)| {
            let mut failure = build(family, code, message).with_recoverable(recoverable);
            if let Some(component) = component {
                failure = failure.with_component(component);
            }
            if let Some(attempt) = attempt {
                failure = failure.with_data("attempt", json!(attempt));
            }
            failure
        })
}

// Strategy for a failure with a chain of up to three causes, the innermost
// optionally caused by a non-taxonomy error
fn chain_strategy() -> impl Strategy<Value = BitChatError> {
    (
        prop::collection::vec(failure_strategy(), 1..5),
        prop::option::of("[\\PC]{1,40}"),
    )
        .prop_map(|(mut chain, foreign)| {
            let mut failure = chain.remove(0);
            if let Some(message) = foreign {
                failure = failure.with_foreign_cause(&io::Error::new(io::ErrorKind::Other, message));
            }
            for outer in chain {
                failure = outer.with_cause(failure);
            }
            failure
        })
}

proptest! {
    #[test]
    fn prop_json_round_trip_preserves_chain(failure in chain_strategy()) {
        let json = failure.to_json().unwrap();
        let back = BitChatError::from_json(&json).unwrap();

        prop_assert_eq!(back.to_serialized(), failure.to_serialized());
        prop_assert_eq!(back.kind(), failure.kind());
        prop_assert_eq!(back.root_cause().code(), failure.root_cause().code());
        prop_assert_eq!(back.root_cause().kind(), failure.root_cause().kind());
        prop_assert_eq!(
            back.root_cause().cause().map(|cause| cause.to_string()),
            failure.root_cause().cause().map(|cause| cause.to_string())
        );
    }

    #[test]
    fn prop_wrapping_is_idempotent(failure in failure_strategy()) {
        let once = BitChatError::from_raw(failure.clone());
        let twice = BitChatError::from_raw(RawError::from(once.clone()));

        prop_assert_eq!(once.to_serialized(), failure.to_serialized());
        prop_assert_eq!(twice.to_serialized(), once.to_serialized());
    }

    #[test]
    fn prop_log_never_exceeds_bound(max in 1usize..20, pushed in 0usize..60) {
        let dispatcher = Dispatcher::new(DispatcherConfig {
            max_log_size: max,
            log_to_console: false,
            ..Default::default()
        });

        for i in 0..pushed {
            dispatcher.handle_error(
                BitChatError::new(ErrorCode::Unknown, format!("e{}", i)),
                HandleOptions::silent(),
            );
        }

        let log = dispatcher.log();
        prop_assert_eq!(log.len(), pushed.min(max));
        prop_assert_eq!(dispatcher.stats().total_errors, pushed.min(max));
        if pushed > 0 {
            let newest = format!("e{}", pushed - 1);
            prop_assert_eq!(log.last().unwrap().error.message(), newest.as_str());
            prop_assert!(log.iter().all(|entry| entry.handled));
        }
    }
}
