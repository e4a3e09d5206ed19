//! Error dispatcher: normalizes, records and routes failures
//!
//! A [`Dispatcher`] is a cheaply clonable handle. Every failure passed to
//! [`Dispatcher::handle_error`] is converted into a [`BitChatError`],
//! appended to a bounded log, written to the console transport and then
//! offered to the registered category handler, code handler and listeners.
//! A panicking handler or listener is caught and logged; it never stops the
//! callbacks after it and never escapes `handle_error`.
//!
//! ```
//! use bitchat_core::dispatcher::{Dispatcher, HandleOptions};
//! use bitchat_core::error::{BitChatError, ErrorCategory};
//!
//! let dispatcher = Dispatcher::default();
//! dispatcher.add_category_handler(ErrorCategory::Network, |failure| {
//!     println!("network trouble: {}", failure.user_message());
//! });
//!
//! let failure = dispatcher.handle_error(BitChatError::offline(), HandleOptions::silent());
//! assert_eq!(dispatcher.stats().total_errors, 1);
//! assert!(failure.context().session_id.is_some());
//! ```

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};
use uuid::Uuid;

pub mod global;
mod console;
mod hooks;
mod log;
mod safe;

pub use self::log::{ErrorStats, LogEntry};
pub use safe::{create_safe, create_safe_async, SafeOptions};

use crate::config::defaults::DEFAULT_RECENT_ERRORS;
use crate::config::{DispatcherConfig, DispatcherConfigPatch};
use crate::error::{
    BitChatError, BitChatResult, ErrorCategory, ErrorCode, ErrorContext, RawError,
};
use chrono::{DateTime, Utc};
use hooks::DispatchGuard;
use self::log::ErrorLog;
use serde::{Deserialize, Serialize};

/// Callback invoked with each handled failure
pub type ErrorCallback = Arc<dyn Fn(&BitChatError) + Send + Sync>;

/// Per-call options for [`Dispatcher::handle_error`]
#[derive(Debug, Clone, Default)]
pub struct HandleOptions {
    /// Skip the console transport
    pub silent: bool,
    /// Context merged into the failure
    pub context: Option<ErrorContext>,
}

impl HandleOptions {
    pub fn silent() -> Self {
        Self {
            silent: true,
            context: None,
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Document produced by [`Dispatcher::export_log`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogExport {
    pub session_id: String,
    pub exported_at: DateTime<Utc>,
    pub stats: ErrorStats,
    pub errors: Vec<LogEntry>,
}

#[derive(Debug, Default)]
struct HookState {
    global_errors: bool,
    rejections: bool,
}

pub(crate) struct DispatcherInner {
    session_id: String,
    config: RwLock<DispatcherConfig>,
    log: Mutex<ErrorLog>,
    category_handlers: RwLock<HashMap<ErrorCategory, ErrorCallback>>,
    code_handlers: RwLock<HashMap<ErrorCode, ErrorCallback>>,
    listeners: RwLock<Vec<(u64, ErrorCallback)>>,
    next_listener_id: AtomicU64,
    hooks: Mutex<HookState>,
}

/// Handle to a dispatcher; clones share the same state
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("session_id", &self.inner.session_id)
            .field("config", &*self.inner.config.read())
            .field("log_len", &self.inner.log.lock().len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

/// Removes a listener registered with [`Dispatcher::add_listener`]
///
/// Dropping the subscription keeps the listener registered.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    dispatcher: Weak<DispatcherInner>,
}

impl Subscription {
    /// Remove the listener; returns false if it was already removed
    pub fn unsubscribe(self) -> bool {
        match self.dispatcher.upgrade() {
            Some(inner) => {
                let mut listeners = inner.listeners.write();
                let before = listeners.len();
                listeners.retain(|(id, _)| *id != self.id);
                listeners.len() != before
            }
            None => false,
        }
    }
}

impl Dispatcher {
    /// Create a dispatcher with its own session id
    pub fn new(config: DispatcherConfig) -> Self {
        let session_id = format!("session_{}", Uuid::new_v4().simple());
        debug!(session_id = %session_id, "Creating error dispatcher");

        Self {
            inner: Arc::new(DispatcherInner {
                session_id,
                log: Mutex::new(ErrorLog::new(config.max_log_size)),
                config: RwLock::new(config),
                category_handlers: RwLock::new(HashMap::new()),
                code_handlers: RwLock::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                hooks: Mutex::new(HookState::default()),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Current configuration
    pub fn config(&self) -> DispatcherConfig {
        self.inner.config.read().clone()
    }

    /// Apply a partial configuration update
    ///
    /// Shrinking `max_log_size` trims the log right away. Capture flags take
    /// effect on the next `install`.
    pub fn configure(&self, patch: DispatcherConfigPatch) -> BitChatResult<()> {
        let mut updated = self.config();
        updated.apply(&patch);
        updated.validate()?;

        self.inner.log.lock().set_max_size(updated.max_log_size);
        *self.inner.config.write() = updated;
        Ok(())
    }

    /// Start capturing panics and unhandled rejections; idempotent
    pub fn install(&self) {
        let config = self.config();
        let mut state = self.inner.hooks.lock();

        if config.capture_global_errors && !state.global_errors {
            state.global_errors = hooks::install_panic_hook(self);
        }
        if config.capture_unhandled_rejections && !state.rejections {
            state.rejections = true;
        }

        debug!(
            global_errors = state.global_errors,
            rejections = state.rejections,
            "Error dispatcher installed"
        );
    }

    /// Stop capturing; safe to call when never installed
    pub fn uninstall(&self) {
        let mut state = self.inner.hooks.lock();
        if state.global_errors {
            hooks::uninstall_panic_hook(&self.inner.session_id);
        }
        *state = HookState::default();
    }

    pub fn is_installed(&self) -> bool {
        let state = self.inner.hooks.lock();
        state.global_errors || state.rejections
    }

    /// Normalize, record and route a failure; never panics
    pub fn handle_error(&self, raw: impl Into<RawError>, options: HandleOptions) -> BitChatError {
        let _guard = DispatchGuard::enter();
        let (failure, entry_id) = self.record(raw, options);
        self.route(&failure, &entry_id);
        failure
    }

    /// Normalize, append to the log and write to the console
    fn record(&self, raw: impl Into<RawError>, options: HandleOptions) -> (BitChatError, String) {
        let mut failure = BitChatError::from_raw(raw);
        if let Some(context) = options.context {
            failure.enrich_context(context);
        }
        if failure.context().session_id.is_none() {
            failure.context_mut().session_id = Some(self.inner.session_id.clone());
        }

        let entry = LogEntry::new(failure.clone());
        let entry_id = entry.id.clone();
        self.inner.log.lock().push(entry);

        if !options.silent && self.inner.config.read().log_to_console {
            console::report(&failure);
        }

        (failure, entry_id)
    }

    /// Offer a recorded failure to the handlers and listeners, then mark it handled
    fn route(&self, failure: &BitChatError, entry_id: &str) {
        let category_handler = self
            .inner
            .category_handlers
            .read()
            .get(&failure.category())
            .cloned();
        if let Some(handler) = category_handler {
            invoke_isolated("category handler", &handler, failure);
        }

        let code_handler = self.inner.code_handlers.read().get(&failure.code()).cloned();
        if let Some(handler) = code_handler {
            invoke_isolated("code handler", &handler, failure);
        }

        let listeners: Vec<ErrorCallback> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in &listeners {
            invoke_isolated("listener", listener, failure);
        }

        self.inner.log.lock().mark_handled(entry_id);
    }

    /// [`Dispatcher::handle_error`] with default options
    pub fn report(&self, raw: impl Into<RawError>) -> BitChatError {
        self.handle_error(raw, HandleOptions::default())
    }

    /// Register the handler for `category`, replacing any previous one
    pub fn add_category_handler<F>(&self, category: ErrorCategory, handler: F)
    where
        F: Fn(&BitChatError) + Send + Sync + 'static,
    {
        self.inner
            .category_handlers
            .write()
            .insert(category, Arc::new(handler));
    }

    pub fn remove_category_handler(&self, category: ErrorCategory) -> bool {
        self.inner.category_handlers.write().remove(&category).is_some()
    }

    /// Register the handler for `code`, replacing any previous one
    pub fn add_code_handler<F>(&self, code: ErrorCode, handler: F)
    where
        F: Fn(&BitChatError) + Send + Sync + 'static,
    {
        self.inner.code_handlers.write().insert(code, Arc::new(handler));
    }

    pub fn remove_code_handler(&self, code: ErrorCode) -> bool {
        self.inner.code_handlers.write().remove(&code).is_some()
    }

    /// Register a listener; listeners run in registration order
    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&BitChatError) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, Arc::new(listener)));
        Subscription {
            id,
            dispatcher: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Copy of the whole log, oldest first
    pub fn log(&self) -> Vec<LogEntry> {
        self.inner.log.lock().snapshot()
    }

    /// The `count` most recent entries, most recent first
    pub fn recent_errors(&self, count: usize) -> Vec<LogEntry> {
        self.inner.log.lock().recent(count)
    }

    /// The ten most recent entries
    pub fn latest_errors(&self) -> Vec<LogEntry> {
        self.recent_errors(DEFAULT_RECENT_ERRORS)
    }

    pub fn error_by_id(&self, id: &str) -> Option<LogEntry> {
        self.inner.log.lock().find(id)
    }

    pub fn clear_log(&self) {
        self.inner.log.lock().clear();
    }

    pub fn stats(&self) -> ErrorStats {
        self.inner.log.lock().stats()
    }

    /// Snapshot of the session, statistics and full log
    pub fn export(&self) -> ErrorLogExport {
        let log = self.inner.log.lock();
        ErrorLogExport {
            session_id: self.inner.session_id.clone(),
            exported_at: Utc::now(),
            stats: log.stats(),
            errors: log.snapshot(),
        }
    }

    /// [`Dispatcher::export`] rendered as pretty JSON
    pub fn export_log(&self) -> BitChatResult<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }
}

fn invoke_isolated(kind: &str, callback: &ErrorCallback, failure: &BitChatError) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(failure))) {
        let panic = RawError::from_panic(payload.as_ref());
        error!(
            code = failure.code().as_u16(),
            "Error {} panicked: {:?}",
            kind,
            panic
        );
    }
}
