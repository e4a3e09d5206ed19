//! Process-wide default dispatcher
//!
//! Prefer constructing a [`Dispatcher`] and passing it where it is needed.
//! This module only offers a lazily created default for code that has no
//! better place to get one from.

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::{Dispatcher, HandleOptions};
use crate::config::DispatcherConfig;
use crate::error::{BitChatError, RawError};

static INSTANCE: Lazy<RwLock<Option<Dispatcher>>> = Lazy::new(|| RwLock::new(None));

/// The default dispatcher, created with default settings on first use
pub fn instance() -> Dispatcher {
    if let Some(dispatcher) = INSTANCE.read().as_ref() {
        return dispatcher.clone();
    }

    INSTANCE
        .write()
        .get_or_insert_with(|| Dispatcher::new(DispatcherConfig::default()))
        .clone()
}

/// Replace the default dispatcher, returning the previous one
///
/// The previous dispatcher is not uninstalled.
pub fn set_instance(dispatcher: Dispatcher) -> Option<Dispatcher> {
    INSTANCE.write().replace(dispatcher)
}

/// Whether a default dispatcher exists yet
pub fn is_initialized() -> bool {
    INSTANCE.read().is_some()
}

/// Uninstall and discard the default dispatcher
///
/// Only meant for tests that need a clean slate.
pub fn reset_for_testing() {
    let previous = INSTANCE.write().take();
    if let Some(dispatcher) = previous {
        dispatcher.uninstall();
    }
}

/// Route a failure through the default dispatcher
pub fn handle_error(raw: impl Into<RawError>, options: HandleOptions) -> BitChatError {
    instance().handle_error(raw, options)
}
