//! Fallback chains
//!
//! When the protected operation fails, the primary tier is tried, then the
//! secondary tier, then the final value. If every configured tier fails the
//! operation's own failure is returned, never a tier's.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{BitChatError, BitChatResult, RawError};

/// Which tier of the chain is being used
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FallbackLevel {
    Primary = 1,
    Secondary = 2,
    Final = 3,
}

impl FallbackLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One tier of a fallback chain
pub enum Fallback<T> {
    /// A ready value
    Value(T),
    /// Computed on demand
    Sync(Arc<dyn Fn() -> BitChatResult<T> + Send + Sync>),
    /// Awaited on demand
    Async(Arc<dyn Fn() -> BoxFuture<'static, BitChatResult<T>> + Send + Sync>),
}

impl<T> std::fmt::Debug for Fallback<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fallback::Value(_) => f.write_str("Fallback::Value"),
            Fallback::Sync(_) => f.write_str("Fallback::Sync(<closure>)"),
            Fallback::Async(_) => f.write_str("Fallback::Async(<closure>)"),
        }
    }
}

impl<T> Fallback<T> {
    pub fn value(value: T) -> Self {
        Fallback::Value(value)
    }

    pub fn sync<F>(f: F) -> Self
    where
        F: Fn() -> BitChatResult<T> + Send + Sync + 'static,
    {
        Fallback::Sync(Arc::new(f))
    }

    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BitChatResult<T>> + Send + 'static,
    {
        Fallback::Async(Arc::new(move || f().boxed()))
    }

    /// Produce the tier's value; panics count as failures
    async fn resolve(self) -> BitChatResult<T> {
        match self {
            Fallback::Value(value) => Ok(value),
            Fallback::Sync(f) => match catch_unwind(AssertUnwindSafe(|| f())) {
                Ok(outcome) => outcome,
                Err(payload) => Err(BitChatError::from_raw(RawError::from_panic(payload.as_ref()))),
            },
            Fallback::Async(f) => match AssertUnwindSafe(f()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Err(BitChatError::from_raw(RawError::from_panic(payload.as_ref()))),
            },
        }
    }
}

/// Called with the failure that triggered a tier, before the tier is used
pub type FallbackCallback = Arc<dyn Fn(&BitChatError, FallbackLevel) + Send + Sync>;

/// The tiers tried after the protected operation fails
pub struct FallbackConfig<T> {
    pub primary: Fallback<T>,
    pub secondary: Option<Fallback<T>>,
    pub final_value: Option<T>,
    pub on_fallback: Option<FallbackCallback>,
}

impl<T> std::fmt::Debug for FallbackConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackConfig")
            .field("primary", &self.primary)
            .field("secondary", &self.secondary)
            .field("final_value", &self.final_value.as_ref().map(|_| "<value>"))
            .field("on_fallback", &self.on_fallback.as_ref().map(|_| "<closure>"))
            .finish()
    }
}

impl<T> FallbackConfig<T> {
    pub fn new(primary: Fallback<T>) -> Self {
        Self {
            primary,
            secondary: None,
            final_value: None,
            on_fallback: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Fallback<T>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_final(mut self, value: T) -> Self {
        self.final_value = Some(value);
        self
    }

    pub fn on_fallback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BitChatError, FallbackLevel) + Send + Sync + 'static,
    {
        self.on_fallback = Some(Arc::new(callback));
        self
    }
}

fn notify(callback: Option<&FallbackCallback>, error: &BitChatError, level: FallbackLevel) {
    let Some(callback) = callback else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| callback(error, level))).is_err() {
        error!("Fallback callback panicked at level {}", level.as_u8());
    }
}

/// Run `operation`, falling back through `config` on failure
pub async fn with_fallback<F, Fut, T>(operation: F, config: FallbackConfig<T>) -> BitChatResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = BitChatResult<T>>,
{
    let original = match operation().await {
        Ok(value) => return Ok(value),
        Err(error) => error,
    };

    let FallbackConfig {
        primary,
        secondary,
        final_value,
        on_fallback,
    } = config;
    let callback = on_fallback.as_ref();

    notify(callback, &original, FallbackLevel::Primary);
    let mut last = match primary.resolve().await {
        Ok(value) => return Ok(value),
        Err(error) => {
            debug!("Primary fallback failed: {}", error);
            error
        }
    };

    if let Some(secondary) = secondary {
        notify(callback, &last, FallbackLevel::Secondary);
        match secondary.resolve().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                debug!("Secondary fallback failed: {}", error);
                last = error;
            }
        }
    }

    if let Some(value) = final_value {
        notify(callback, &last, FallbackLevel::Final);
        return Ok(value);
    }

    Err(original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use parking_lot::Mutex;

    async fn failing() -> BitChatResult<&'static str> {
        Err(BitChatError::relay_unavailable("wss://primary"))
    }

    #[tokio::test]
    async fn test_success_skips_fallbacks() {
        let config = FallbackConfig::new(Fallback::sync(|| -> BitChatResult<&'static str> {
            panic!("must not run")
        }));
        let value = with_fallback(|| async { Ok("live") }, config).await.unwrap();
        assert_eq!(value, "live");
    }

    #[tokio::test]
    async fn test_primary_value() {
        let value = with_fallback(failing, FallbackConfig::new(Fallback::value("cached")))
            .await
            .unwrap();
        assert_eq!(value, "cached");
    }

    #[tokio::test]
    async fn test_secondary_after_primary_fails() {
        let levels = Arc::new(Mutex::new(Vec::new()));
        let l = levels.clone();

        let config = FallbackConfig::new(Fallback::future(|| async {
            Err(BitChatError::read_failed("cache"))
        }))
        .with_secondary(Fallback::sync(|| Ok("default")))
        .on_fallback(move |error, level| l.lock().push((error.code(), level)));

        assert_eq!(with_fallback(failing, config).await.unwrap(), "default");
        assert_eq!(
            *levels.lock(),
            vec![
                (ErrorCode::RelayUnavailable, FallbackLevel::Primary),
                (ErrorCode::ReadFailed, FallbackLevel::Secondary),
            ]
        );
    }

    #[tokio::test]
    async fn test_final_value_after_panicking_tiers() {
        let config = FallbackConfig::new(Fallback::sync(|| -> BitChatResult<&'static str> {
            panic!("tier exploded")
        }))
        .with_secondary(Fallback::future(|| async {
            Err(BitChatError::storage_unavailable("db"))
        }))
        .with_final("offline mode");

        assert_eq!(with_fallback(failing, config).await.unwrap(), "offline mode");
    }

    #[tokio::test]
    async fn test_exhausted_chain_returns_original_error() {
        let config = FallbackConfig::new(Fallback::sync(|| {
            Err::<&'static str, _>(BitChatError::read_failed("cache"))
        }))
        .with_secondary(Fallback::sync(|| {
            Err(BitChatError::read_failed("disk"))
        }));

        let err = with_fallback(failing, config).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RelayUnavailable);
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_escape() {
        let config = FallbackConfig::new(Fallback::value(1))
            .on_fallback(|_, _| panic!("bad callback"));
        let value = with_fallback(|| async { Err(BitChatError::offline()) }, config)
            .await
            .unwrap();
        assert_eq!(value, 1);
        assert_eq!(FallbackLevel::Final.as_u8(), 3);
    }
}
