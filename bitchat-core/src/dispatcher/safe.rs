//! Wrappers that route a function's failures through a dispatcher

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

use super::hooks::{self, DispatchGuard};
use super::{Dispatcher, ErrorCallback, HandleOptions};
use crate::error::{BitChatError, BitChatResult, ErrorContext, RawError};

/// What a safe wrapper does with a failure
pub struct SafeOptions<T> {
    /// Returned instead of the failure when set
    pub fallback: Option<T>,
    /// Called with the handled failure before the fallback is returned
    pub on_error: Option<ErrorCallback>,
    /// Merged into every handled failure
    pub context: Option<ErrorContext>,
    /// Skip the console transport
    pub silent: bool,
}

impl<T> Default for SafeOptions<T> {
    fn default() -> Self {
        Self {
            fallback: None,
            on_error: None,
            context: None,
            silent: false,
        }
    }
}

impl<T> SafeOptions<T> {
    pub fn with_fallback(mut self, value: T) -> Self {
        self.fallback = Some(value);
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BitChatError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

impl<T: Clone> SafeOptions<T> {
    fn resolve(&self, dispatcher: &Dispatcher, raw: RawError) -> BitChatResult<T> {
        let failure = dispatcher.handle_error(
            raw,
            HandleOptions {
                silent: self.silent,
                context: self.context.clone(),
            },
        );

        if let Some(callback) = &self.on_error {
            let _guard = DispatchGuard::enter();
            if catch_unwind(AssertUnwindSafe(|| callback(&failure))).is_err() {
                error!(code = failure.code().as_u16(), "on_error callback panicked");
            }
        }

        match &self.fallback {
            Some(value) => Ok(value.clone()),
            None => Err(failure),
        }
    }
}

/// Wrap `f` so that failures and panics are handled by `dispatcher`
///
/// The wrapper returns the fallback when one is configured, otherwise the
/// handled failure.
pub fn create_safe<A, T, F>(
    dispatcher: &Dispatcher,
    f: F,
    options: SafeOptions<T>,
) -> impl Fn(A) -> BitChatResult<T>
where
    F: Fn(A) -> BitChatResult<T>,
    T: Clone,
{
    let dispatcher = dispatcher.clone();
    move |args| {
        let outcome = {
            let _guard = DispatchGuard::enter();
            catch_unwind(AssertUnwindSafe(|| f(args)))
        };

        let raw = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(failure)) => RawError::from(failure),
            Err(payload) => RawError::from_panic(payload.as_ref()),
        };
        options.resolve(&dispatcher, raw)
    }
}

/// Async counterpart of [`create_safe`]
pub fn create_safe_async<A, T, F, Fut>(
    dispatcher: &Dispatcher,
    f: F,
    options: SafeOptions<T>,
) -> impl Fn(A) -> BoxFuture<'static, BitChatResult<T>>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BitChatResult<T>> + Send + 'static,
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    let dispatcher = dispatcher.clone();
    let options = Arc::new(options);
    move |args| {
        let dispatcher = dispatcher.clone();
        let options = options.clone();
        let future = f(args);

        async move {
            let outcome = hooks::captured(AssertUnwindSafe(future).catch_unwind()).await;
            let raw = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(failure)) => RawError::from(failure),
                Err(payload) => RawError::from_panic(payload.as_ref()),
            };
            options.resolve(&dispatcher, raw)
        }
        .boxed()
    }
}
