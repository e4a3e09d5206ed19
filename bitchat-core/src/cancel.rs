//! Cooperative cancellation for recovery operations
//!
//! A [`CancelHandle`] owns the signal; any number of [`CancelToken`]s observe
//! it. Retry loops and circuit-protected calls race the protected future
//! against the token and return a `Cancelled` failure when it fires.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{BitChatError, BitChatResult};

/// Fires the cancellation signal
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// Observes the cancellation signal; cheap to clone
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// A token observing this handle
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Signal every token; calling this more than once is harmless
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that never fires
    pub fn never() -> Self {
        CancelHandle::new().token()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the handle is cancelled
    ///
    /// If every handle is dropped without cancelling, this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `future` unless the token fires first
    pub async fn run<T, F>(&self, operation: &str, future: F) -> BitChatResult<T>
    where
        F: Future<Output = BitChatResult<T>>,
    {
        if self.is_cancelled() {
            return Err(BitChatError::cancelled(operation));
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(BitChatError::cancelled(operation)),
            result = future => result,
        }
    }
}

/// Create a connected handle and token
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let handle = CancelHandle::new();
    let token = handle.token();
    (handle, token)
}
