//! Process-wide state: the default dispatcher, the panic hook and tracked tasks
//!
//! Every test here touches global state and runs serially.

use bitchat_core::config::DispatcherConfig;
use bitchat_core::dispatcher::{global, Dispatcher, HandleOptions};
use bitchat_core::error::{BitChatError, ErrorCode};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::panic;
use std::sync::mpsc;
use std::time::Duration;

fn quiet_dispatcher() -> Dispatcher {
    Dispatcher::new(DispatcherConfig {
        log_to_console: false,
        ..Default::default()
    })
}

#[test]
#[serial]
fn test_global_instance_is_shared_until_reset() {
    global::reset_for_testing();
    assert!(!global::is_initialized());

    let first = global::instance();
    let second = global::instance();
    assert_eq!(first.session_id(), second.session_id());

    global::handle_error(BitChatError::offline(), HandleOptions::silent());
    assert_eq!(first.stats().total_errors, 1);

    global::reset_for_testing();
    let fresh = global::instance();
    assert_ne!(fresh.session_id(), first.session_id());
    assert_eq!(fresh.stats().total_errors, 0);
    global::reset_for_testing();
}

#[test]
#[serial]
fn test_set_instance_replaces_default() {
    global::reset_for_testing();
    let custom = quiet_dispatcher();
    assert!(global::set_instance(custom.clone()).is_none());
    assert_eq!(global::instance().session_id(), custom.session_id());
    global::reset_for_testing();
}

#[test]
#[serial]
fn test_panic_hook_records_uncaught_panics() {
    let dispatcher = quiet_dispatcher();
    dispatcher.install();
    assert!(dispatcher.is_installed());

    let outcome = panic::catch_unwind(|| panic!("radio stack exploded"));
    assert!(outcome.is_err());

    let log = dispatcher.log();
    assert_eq!(log.len(), 1);
    let failure = &log[0].error;
    assert_eq!(failure.message(), "radio stack exploded");
    assert_eq!(failure.context().component.as_deref(), Some("global"));
    assert_eq!(failure.context().operation.as_deref(), Some("uncaught error"));
    assert!(failure.context().data_value("location").is_some());

    dispatcher.uninstall();
    assert!(!dispatcher.is_installed());

    let _ = panic::catch_unwind(|| panic!("after uninstall"));
    assert_eq!(dispatcher.log().len(), 1);
}

#[test]
#[serial]
fn test_second_dispatcher_does_not_steal_the_hook() {
    let owner = quiet_dispatcher();
    let other = quiet_dispatcher();
    owner.install();
    other.install();

    let _ = panic::catch_unwind(|| panic!("who gets this"));
    assert_eq!(owner.log().len(), 1);
    assert_eq!(other.log().len(), 0);

    other.uninstall();
    owner.uninstall();
}

#[test]
#[serial]
fn test_handler_panics_are_not_recorded_twice() {
    let dispatcher = quiet_dispatcher();
    dispatcher.install();
    dispatcher.add_listener(|_| panic!("listener exploded"));

    dispatcher.report(BitChatError::offline());
    assert_eq!(dispatcher.log().len(), 1);

    dispatcher.uninstall();
}

#[test]
#[serial]
fn test_panicking_listener_during_uncaught_panic_keeps_process_alive() {
    let dispatcher = quiet_dispatcher();
    dispatcher.install();
    dispatcher.add_listener(|_| panic!("listener exploded"));
    let (tx, rx) = mpsc::channel();
    dispatcher.add_listener(move |failure| {
        let _ = tx.send(failure.message().to_string());
    });

    let outcome = panic::catch_unwind(|| panic!("uncaught"));
    assert!(outcome.is_err());

    let seen = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(seen, "uncaught");
    assert_eq!(dispatcher.log().len(), 1);

    dispatcher.uninstall();
}

#[tokio::test]
#[serial]
async fn test_spawn_tracked_reports_rejections() {
    let dispatcher = quiet_dispatcher();
    dispatcher.install();

    let ok = dispatcher.spawn_tracked(async { Ok(7) });
    assert_eq!(ok.await.unwrap(), Some(7));

    let failed = dispatcher.spawn_tracked(async { Err::<(), _>(BitChatError::sync_timeout("pull")) });
    assert_eq!(failed.await.unwrap(), None);

    let panicked = dispatcher.spawn_tracked(async {
        if true {
            panic!("task exploded");
        }
        Ok(())
    });
    assert_eq!(panicked.await.unwrap(), None);

    let log = dispatcher.log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].error.code(), ErrorCode::SyncTimeout);
    assert_eq!(
        log[0].error.context().operation.as_deref(),
        Some("unhandled rejection")
    );
    assert_eq!(log[1].error.message(), "task exploded");

    dispatcher.uninstall();
}

#[tokio::test]
#[serial]
async fn test_rejections_without_install_are_only_logged() {
    let dispatcher = quiet_dispatcher();
    let handled = dispatcher.report_unhandled_rejection(BitChatError::offline());
    assert!(handled.is_none());
    assert!(dispatcher.log().is_empty());
}
