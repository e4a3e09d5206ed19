//! Process-level capture of panics and failed background tasks
//!
//! Panics are captured with a panic hook. Only one dispatcher can own the
//! hook at a time; the hook that was active before is restored on uninstall.
//! The hook records the panic itself, while handlers and listeners see it
//! shortly after from a separate thread.
//! Background work is captured through [`Dispatcher::spawn_tracked`].

use futures::FutureExt;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::json;
use std::cell::Cell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{Dispatcher, DispatcherInner, HandleOptions};
use crate::error::{BitChatError, BitChatResult, ErrorContext, RawError};

pub(crate) const GLOBAL_COMPONENT: &str = "global";
pub(crate) const UNCAUGHT_ERROR: &str = "uncaught error";
pub(crate) const UNHANDLED_REJECTION: &str = "unhandled rejection";

#[allow(deprecated)]
type PanicHook = dyn Fn(&std::panic::PanicInfo<'_>) + Sync + Send + 'static;

struct HookOwner {
    session_id: String,
    previous: Arc<PanicHook>,
}

static PANIC_HOOK_OWNER: Lazy<Mutex<Option<HookOwner>>> = Lazy::new(|| Mutex::new(None));

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

tokio::task_local! {
    static CAPTURED_TASK: ();
}

/// Marks the current thread as running dispatcher callbacks
///
/// Panics raised while the guard is alive are left to `catch_unwind` in the
/// dispatcher instead of being routed through the hook a second time.
pub(crate) struct DispatchGuard {
    previous: bool,
}

impl DispatchGuard {
    pub(crate) fn enter() -> Self {
        let previous = DISPATCHING.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(self.previous));
    }
}

fn is_dispatching() -> bool {
    DISPATCHING.with(|flag| flag.get())
}

fn in_captured_task() -> bool {
    CAPTURED_TASK.try_with(|_| ()).is_ok()
}

/// Run `future` with panics left to the caller's `catch_unwind`
pub(crate) async fn captured<F: Future>(future: F) -> F::Output {
    CAPTURED_TASK.scope((), future).await
}

/// Install the panic hook for `dispatcher`; false if another dispatcher owns it
pub(crate) fn install_panic_hook(dispatcher: &Dispatcher) -> bool {
    let mut owner = PANIC_HOOK_OWNER.lock();
    if let Some(current) = owner.as_ref() {
        if current.session_id != dispatcher.session_id() {
            warn!(
                owner = %current.session_id,
                "Panic hook is owned by another dispatcher, not capturing panics"
            );
            return false;
        }
        return true;
    }

    let previous: Arc<PanicHook> = Arc::from(std::panic::take_hook());
    let fallback = previous.clone();
    let weak: Weak<DispatcherInner> = Arc::downgrade(&dispatcher.inner);

    std::panic::set_hook(Box::new(move |info| {
        if is_dispatching() || in_captured_task() {
            return;
        }

        let Some(inner) = weak.upgrade() else {
            fallback(info);
            return;
        };

        let mut context = ErrorContext::for_operation(GLOBAL_COMPONENT, UNCAUGHT_ERROR);
        if let Some(location) = info.location() {
            context = context.with_data("location", json!(location.to_string()));
        }

        // Handlers and listeners run on their own thread: a panic raised
        // inside a panic hook cannot be caught and aborts the process.
        let dispatcher = Dispatcher { inner };
        let _guard = DispatchGuard::enter();
        let (failure, entry_id) = dispatcher.record(
            RawError::from_panic(info.payload()),
            HandleOptions::default().with_context(context),
        );
        let routed = std::thread::Builder::new()
            .name("bitchat-panic-route".to_string())
            .spawn(move || {
                let _guard = DispatchGuard::enter();
                dispatcher.route(&failure, &entry_id);
            });
        if let Err(err) = routed {
            error!(error = %err, "Failed to route uncaught panic to handlers");
        }
    }));

    *owner = Some(HookOwner {
        session_id: dispatcher.session_id().to_string(),
        previous,
    });
    debug!("Panic hook installed");
    true
}

/// Restore the previous panic hook if `session_id` owns the current one
pub(crate) fn uninstall_panic_hook(session_id: &str) {
    let previous = {
        let mut owner = PANIC_HOOK_OWNER.lock();
        match owner.as_ref() {
            Some(current) if current.session_id == session_id => owner.take(),
            _ => None,
        }
    };

    if let Some(HookOwner { previous, .. }) = previous {
        drop(std::panic::take_hook());
        std::panic::set_hook(Box::new(move |info| previous(info)));
        debug!("Panic hook restored");
    }
}

impl Dispatcher {
    /// Spawn a background task whose failure is reported as an unhandled rejection
    ///
    /// Resolves to `None` when the task failed or panicked.
    pub fn spawn_tracked<F, T>(&self, future: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = BitChatResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let dispatcher = self.clone();
        tokio::spawn(captured(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(value)) => Some(value),
                Ok(Err(failure)) => {
                    dispatcher.report_unhandled_rejection(failure);
                    None
                }
                Err(payload) => {
                    dispatcher.report_unhandled_rejection(RawError::from_panic(payload.as_ref()));
                    None
                }
            }
        }))
    }

    /// Route a failure nobody awaited
    ///
    /// Without rejection capture installed the failure is only logged and
    /// `None` is returned.
    pub fn report_unhandled_rejection(&self, raw: impl Into<RawError>) -> Option<BitChatError> {
        if !self.inner.hooks.lock().rejections {
            let failure = BitChatError::from_raw(raw);
            error!(failure = ?failure, "Unhandled rejection: {}", failure);
            return None;
        }

        let context = ErrorContext::for_operation(GLOBAL_COMPONENT, UNHANDLED_REJECTION);
        Some(self.handle_error(raw, HandleOptions::default().with_context(context)))
    }
}
