//! Rate limiting for error streams
//!
//! [`ErrorDebouncer`] batches bursts: the first error of a burst arms a timer
//! and everything collected until it fires is delivered at once. The timer is
//! not pushed back by later errors, so a continuous stream is flushed every
//! `delay`.
//!
//! [`ErrorThrottler`] delivers at most one error per `limit`. Errors arriving
//! inside the window replace each other and the latest one is delivered when
//! the window closes.
//!
//! Both need a tokio runtime for their timers. Without one, errors are
//! delivered immediately.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::error::BitChatError;

pub type BatchHandler = Arc<dyn Fn(Vec<BitChatError>) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(BitChatError) + Send + Sync>;

fn no_runtime() -> bool {
    if Handle::try_current().is_ok() {
        return false;
    }
    warn!("No tokio runtime available, delivering errors without delay");
    true
}

/// Batches errors arriving within `delay` of the first one
#[derive(Clone)]
pub struct ErrorDebouncer {
    handler: BatchHandler,
    delay: Duration,
    buffer: Arc<Mutex<Burst>>,
}

#[derive(Default)]
struct Burst {
    errors: Vec<BitChatError>,
    // Bumped when a burst starts; a timer only flushes the burst that armed it
    generation: u64,
}

impl std::fmt::Debug for ErrorDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorDebouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending())
            .finish()
    }
}

impl ErrorDebouncer {
    pub fn new<F>(handler: F, delay: Duration) -> Self
    where
        F: Fn(Vec<BitChatError>) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            delay,
            buffer: Arc::new(Mutex::new(Burst::default())),
        }
    }

    pub fn push(&self, error: BitChatError) {
        let generation = {
            let mut burst = self.buffer.lock();
            let starts_burst = burst.errors.is_empty();
            burst.errors.push(error);
            if !starts_burst {
                return;
            }
            burst.generation = burst.generation.wrapping_add(1);
            burst.generation
        };

        if no_runtime() {
            self.flush();
            return;
        }

        let debouncer = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(debouncer.delay).await;
            debouncer.flush_burst(generation);
        });
    }

    /// Deliver whatever is buffered now
    ///
    /// A timer armed by the flushed burst will not fire for the next one.
    pub fn flush(&self) {
        let batch = std::mem::take(&mut self.buffer.lock().errors);
        self.deliver(batch);
    }

    fn flush_burst(&self, generation: u64) {
        let batch = {
            let mut burst = self.buffer.lock();
            if burst.generation != generation {
                return;
            }
            std::mem::take(&mut burst.errors)
        };
        self.deliver(batch);
    }

    fn deliver(&self, batch: Vec<BitChatError>) {
        if batch.is_empty() {
            return;
        }
        let handler = &self.handler;
        if catch_unwind(AssertUnwindSafe(|| handler(batch))).is_err() {
            error!("Error debouncer handler panicked");
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().errors.len()
    }
}

/// Batch errors; `handler` receives each burst once, `delay` after its first error
pub fn create_error_debouncer<F>(handler: F, delay: Duration) -> ErrorDebouncer
where
    F: Fn(Vec<BitChatError>) + Send + Sync + 'static,
{
    ErrorDebouncer::new(handler, delay)
}

#[derive(Default)]
struct ThrottleState {
    last_delivered: Option<Instant>,
    pending: Option<BitChatError>,
    timer_armed: bool,
}

/// Delivers at most one error per `limit`, keeping the latest superseded one
#[derive(Clone)]
pub struct ErrorThrottler {
    handler: ErrorHandler,
    limit: Duration,
    state: Arc<Mutex<ThrottleState>>,
}

impl std::fmt::Debug for ErrorThrottler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorThrottler")
            .field("limit", &self.limit)
            .field("has_pending", &self.has_pending())
            .finish()
    }
}

impl ErrorThrottler {
    pub fn new<F>(handler: F, limit: Duration) -> Self
    where
        F: Fn(BitChatError) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            limit,
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    pub fn push(&self, error: BitChatError) {
        let remaining = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let elapsed = state.last_delivered.map(|last| now.duration_since(last));

            match elapsed {
                _ if state.timer_armed => {
                    state.pending = Some(error);
                    return;
                }
                Some(elapsed) if elapsed < self.limit => {
                    state.pending = Some(error);
                    state.timer_armed = true;
                    self.limit - elapsed
                }
                _ => {
                    state.last_delivered = Some(now);
                    drop(state);
                    self.deliver(error);
                    return;
                }
            }
        };

        if no_runtime() {
            self.fire_trailing();
            return;
        }

        let throttler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            throttler.fire_trailing();
        });
    }

    fn fire_trailing(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.timer_armed = false;
            let pending = state.pending.take();
            if pending.is_some() {
                state.last_delivered = Some(Instant::now());
            }
            pending
        };
        if let Some(error) = pending {
            self.deliver(error);
        }
    }

    fn deliver(&self, error: BitChatError) {
        let handler = &self.handler;
        if catch_unwind(AssertUnwindSafe(|| handler(error))).is_err() {
            error!("Error throttler handler panicked");
        }
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

/// Deliver at most one error per `limit`; the latest error in a window wins
pub fn create_error_throttler<F>(handler: F, limit: Duration) -> ErrorThrottler
where
    F: Fn(BitChatError) + Send + Sync + 'static,
{
    ErrorThrottler::new(handler, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tokio::time::sleep;

    fn tagged(tag: &str) -> BitChatError {
        BitChatError::new(ErrorCode::SyncFailed, tag)
    }

    fn messages(batch: &[BitChatError]) -> Vec<String> {
        batch.iter().map(|e| e.message().to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_flushes_from_first_item() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let b = batches.clone();
        let debouncer = create_error_debouncer(
            move |batch| b.lock().push(messages(&batch)),
            Duration::from_millis(100),
        );

        debouncer.push(tagged("a"));
        sleep(Duration::from_millis(60)).await;
        debouncer.push(tagged("b"));
        assert_eq!(debouncer.pending(), 2);

        // 100ms after "a", not 100ms after "b"
        sleep(Duration::from_millis(50)).await;
        assert_eq!(*batches.lock(), vec![vec!["a".to_string(), "b".to_string()]]);
        assert_eq!(debouncer.pending(), 0);

        debouncer.push(tagged("c"));
        sleep(Duration::from_millis(101)).await;
        assert_eq!(batches.lock().len(), 2);
        assert_eq!(batches.lock()[1], vec!["c".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_flush_does_not_shorten_next_burst() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let b = batches.clone();
        let debouncer = create_error_debouncer(
            move |batch| b.lock().push(messages(&batch)),
            Duration::from_millis(100),
        );

        debouncer.push(tagged("a"));
        debouncer.flush();
        assert_eq!(batches.lock().len(), 1);

        sleep(Duration::from_millis(90)).await;
        debouncer.push(tagged("b"));

        // The timer armed by "a" fires here and must leave "b" alone
        sleep(Duration::from_millis(20)).await;
        assert_eq!(batches.lock().len(), 1);
        assert_eq!(debouncer.pending(), 1);

        sleep(Duration::from_millis(81)).await;
        assert_eq!(
            *batches.lock(),
            vec![vec!["a".to_string()], vec!["b".to_string()]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_continuous_stream_flushes_periodically() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let b = batches.clone();
        let debouncer = create_error_debouncer(
            move |batch| b.lock().push(batch.len()),
            Duration::from_millis(100),
        );

        for _ in 0..10 {
            debouncer.push(tagged("tick"));
            sleep(Duration::from_millis(30)).await;
        }
        sleep(Duration::from_millis(200)).await;

        let batches = batches.lock();
        assert!(batches.len() >= 3, "expected periodic flushes, got {:?}", *batches);
        assert_eq!(batches.iter().sum::<usize>(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttler_leading_and_trailing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let throttler = create_error_throttler(
            move |error| s.lock().push(error.message().to_string()),
            Duration::from_millis(100),
        );

        throttler.push(tagged("first"));
        assert_eq!(*seen.lock(), vec!["first"]);

        sleep(Duration::from_millis(20)).await;
        throttler.push(tagged("second"));
        sleep(Duration::from_millis(20)).await;
        throttler.push(tagged("third"));
        assert!(throttler.has_pending());
        assert_eq!(seen.lock().len(), 1);

        sleep(Duration::from_millis(70)).await;
        assert_eq!(*seen.lock(), vec!["first", "third"]);
        assert!(!throttler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttler_passes_spaced_errors() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let throttler = create_error_throttler(
            move |error| s.lock().push(error.message().to_string()),
            Duration::from_millis(50),
        );

        for tag in ["a", "b", "c"] {
            throttler.push(tagged(tag));
            sleep(Duration::from_millis(60)).await;
        }
        assert_eq!(*seen.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_without_runtime_delivers_immediately() {
        let batches = Arc::new(Mutex::new(0));
        let b = batches.clone();
        let debouncer =
            create_error_debouncer(move |batch| *b.lock() += batch.len(), Duration::from_secs(1));
        debouncer.push(tagged("x"));
        assert_eq!(*batches.lock(), 1);
    }
}
