//! Circuit breaker with a sliding failure window
//!
//! The breaker has three states:
//! - **Closed**: calls pass through and failures are counted inside `window`
//! - **Open**: calls are rejected with a `CircuitOpen` failure without running
//! - **Half-open**: probe calls pass through; `success_threshold` consecutive
//!   successes close the circuit, a single failure reopens it
//!
//! Open becomes half-open lazily, at the start of the first `execute` call
//! made after `recovery_timeout` has elapsed.
//!
//! ```rust
//! use bitchat_core::recovery::{CircuitBreakerBuilder, CircuitState};
//! use bitchat_core::BitChatError;
//!
//! # async fn example() {
//! let breaker = CircuitBreakerBuilder::new("relay").failure_threshold(1).build();
//!
//! let _ = breaker
//!     .execute(|| async { Err::<(), _>(BitChatError::relay_unavailable("wss://relay")) })
//!     .await;
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let rejected = breaker.execute(|| async { Ok(()) }).await.unwrap_err();
//! assert!(rejected.is_circuit_open());
//! # }
//! ```

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::config::CircuitBreakerSettings;
use crate::error::{BitChatError, BitChatResult, ErrorCode, ErrorSeverity};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStats {
    pub state: CircuitState,
    /// Failures inside the sliding window
    pub failures: u32,
    /// Consecutive successes while half-open
    pub successes: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    /// Every `execute` call, rejections included
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_successes: u64,
}

/// Called once per transition with the new state and a stats snapshot
pub type StateChangeCallback = Arc<dyn Fn(CircuitState, &CircuitStats) + Send + Sync>;

/// Configuration for circuit breaker behavior
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout: Duration,
    pub window: Duration,
    pub on_state_change: Option<StateChangeCallback>,
    /// Log state transitions
    pub enable_logging: bool,
}

impl std::fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("failure_threshold", &self.failure_threshold)
            .field("success_threshold", &self.success_threshold)
            .field("recovery_timeout", &self.recovery_timeout)
            .field("window", &self.window)
            .field("on_state_change", &self.on_state_change.is_some())
            .field("enable_logging", &self.enable_logging)
            .finish()
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&CircuitBreakerSettings::default())
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            success_threshold: settings.success_threshold,
            recovery_timeout: settings.recovery_timeout,
            window: settings.window,
            on_state_change: None,
            enable_logging: true,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    failures: VecDeque<Instant>,
    consecutive_successes: u32,
    last_state_change: Instant,
    last_failure: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    total_calls: u64,
    total_failures: u64,
    total_successes: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            consecutive_successes: 0,
            last_state_change: Instant::now(),
            last_failure: None,
            last_success: None,
            total_calls: 0,
            total_failures: 0,
            total_successes: 0,
        }
    }

    fn prune(&mut self, window: Duration) {
        let now = Instant::now();
        while let Some(oldest) = self.failures.front() {
            if now.duration_since(*oldest) >= window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn snapshot(&mut self, window: Duration) -> CircuitStats {
        self.prune(window);
        CircuitStats {
            state: self.state,
            failures: self.failures.len() as u32,
            successes: self.consecutive_successes,
            last_failure: self.last_failure,
            last_success: self.last_success,
            total_calls: self.total_calls,
            total_failures: self.total_failures,
            total_successes: self.total_successes,
        }
    }
}

type Transition = (CircuitState, CircuitStats);

/// Guards calls to a failing dependency
///
/// Clones share state.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            config,
            state: Arc::new(Mutex::new(BreakerState::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state; does not advance open to half-open
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    pub fn stats(&self) -> CircuitStats {
        self.state.lock().snapshot(self.config.window)
    }

    /// Failures currently inside the sliding window
    pub fn failure_count(&self) -> u32 {
        let mut state = self.state.lock();
        state.prune(self.config.window);
        state.failures.len() as u32
    }

    /// Run `operation` through the breaker
    ///
    /// While open the operation is not invoked and a `CircuitOpen` failure is
    /// returned. Otherwise the operation's own result is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> BitChatResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BitChatResult<T>>,
    {
        self.admit()?;
        let outcome = operation().await;
        self.record(outcome.as_ref().err());
        outcome
    }

    /// Like [`execute`](Self::execute), abandoning the call when `token` fires
    ///
    /// An abandoned call is counted as a call but neither as a success nor as
    /// a failure.
    pub async fn execute_with_cancel<F, Fut, T>(
        &self,
        token: &CancelToken,
        operation: F,
    ) -> BitChatResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BitChatResult<T>>,
    {
        self.admit()?;

        if token.is_cancelled() {
            return Err(BitChatError::cancelled(&*self.name));
        }

        let mut operation = std::pin::pin!(operation());
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Circuit breaker '{}': call cancelled", self.name);
                Err(BitChatError::cancelled(&*self.name))
            }
            outcome = &mut operation => {
                self.record(outcome.as_ref().err());
                outcome
            }
        }
    }

    /// Count the call and reject it if the circuit is open
    fn admit(&self) -> BitChatResult<()> {
        let mut transition = None;
        let rejected = {
            let mut state = self.state.lock();
            state.total_calls += 1;

            if state.state == CircuitState::Open
                && state.last_state_change.elapsed() >= self.config.recovery_timeout
            {
                transition = self.transition(&mut state, CircuitState::HalfOpen);
            }

            (state.state == CircuitState::Open).then(|| state.snapshot(self.config.window))
        };

        self.notify(transition);
        match rejected {
            Some(stats) => Err(BitChatError::circuit_open(&self.name, &stats)),
            None => Ok(()),
        }
    }

    fn record(&self, failure: Option<&BitChatError>) {
        let transition = {
            let mut state = self.state.lock();
            match failure {
                None => {
                    state.total_successes += 1;
                    state.last_success = Some(Utc::now());
                    if state.state == CircuitState::HalfOpen {
                        state.consecutive_successes += 1;
                        if state.consecutive_successes >= self.config.success_threshold {
                            self.transition(&mut state, CircuitState::Closed)
                        } else {
                            None
                        }
                    } else {
                        None
                    }
                }
                Some(failure) => {
                    state.total_failures += 1;
                    state.last_failure = Some(Utc::now());
                    state.failures.push_back(Instant::now());
                    state.prune(self.config.window);

                    match state.state {
                        CircuitState::HalfOpen => {
                            if self.config.enable_logging {
                                warn!(
                                    "Circuit breaker '{}' reopening after failure in half-open state: {}",
                                    self.name, failure
                                );
                            }
                            self.transition(&mut state, CircuitState::Open)
                        }
                        CircuitState::Closed
                            if state.failures.len() as u32 >= self.config.failure_threshold =>
                        {
                            if self.config.enable_logging {
                                warn!(
                                    "Circuit breaker '{}' opening after {} failures within {:?}",
                                    self.name,
                                    state.failures.len(),
                                    self.config.window
                                );
                            }
                            self.transition(&mut state, CircuitState::Open)
                        }
                        _ => None,
                    }
                }
            }
        };
        self.notify(transition);
    }

    /// Apply a state change; `None` when already in `to`
    fn transition(&self, state: &mut BreakerState, to: CircuitState) -> Option<Transition> {
        if state.state == to {
            return None;
        }

        let from = state.state;
        state.state = to;
        state.last_state_change = Instant::now();
        state.consecutive_successes = 0;
        if to == CircuitState::Closed {
            state.failures.clear();
        }

        if self.config.enable_logging {
            info!("Circuit breaker '{}' {} -> {}", self.name, from, to);
        }
        Some((to, state.snapshot(self.config.window)))
    }

    fn notify(&self, transition: Option<Transition>) {
        let (Some((to, stats)), Some(callback)) = (transition, &self.config.on_state_change)
        else {
            return;
        };

        if catch_unwind(AssertUnwindSafe(|| callback(to, &stats))).is_err() {
            error!("Circuit breaker '{}': state change callback panicked", self.name);
        }
    }

    /// Close the circuit and clear the window and every counter
    pub fn reset(&self) {
        let transition = {
            let mut state = self.state.lock();
            let transition = self.transition(&mut state, CircuitState::Closed);
            *state = BreakerState::new();
            transition.map(|(to, _)| (to, state.snapshot(self.config.window)))
        };
        if self.config.enable_logging {
            info!("Circuit breaker '{}' reset", self.name);
        }
        self.notify(transition);
    }

    /// Open the circuit by hand; it still probes after `recovery_timeout`
    pub fn force_open(&self) {
        let transition = {
            let mut state = self.state.lock();
            let transition = self.transition(&mut state, CircuitState::Open);
            state.last_state_change = Instant::now();
            transition
        };
        if self.config.enable_logging {
            warn!("Circuit breaker '{}' forcibly opened", self.name);
        }
        self.notify(transition);
    }
}

/// Circuit breaker builder for easier configuration
pub struct CircuitBreakerBuilder {
    name: String,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig::default(),
        }
    }

    /// Start from loaded configuration
    pub fn from_settings(name: impl Into<String>, settings: &CircuitBreakerSettings) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig::from(settings),
        }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn on_state_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(CircuitState, &CircuitStats) + Send + Sync + 'static,
    {
        self.config.on_state_change = Some(Arc::new(callback));
        self
    }

    /// Enable or disable logging
    pub fn enable_logging(mut self, enable: bool) -> Self {
        self.config.enable_logging = enable;
        self
    }

    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(self.name, self.config)
    }
}

const CIRCUIT_KEY: &str = "circuit";
const STATS_KEY: &str = "stats";

impl BitChatError {
    /// Rejection returned while a circuit is open
    pub fn circuit_open(name: &str, stats: &CircuitStats) -> Self {
        let stats = serde_json::to_value(stats).unwrap_or(serde_json::Value::Null);
        BitChatError::new(
            ErrorCode::CircuitOpen,
            format!("Circuit breaker '{}' is open", name),
        )
        .with_severity(ErrorSeverity::Warning)
        .with_recoverable(true)
        .with_component("circuit breaker")
        .with_data(CIRCUIT_KEY, json!(name))
        .with_data(STATS_KEY, stats)
    }

    pub fn is_circuit_open(&self) -> bool {
        self.code() == ErrorCode::CircuitOpen
    }

    /// Breaker stats captured when the call was rejected
    pub fn circuit_stats(&self) -> Option<CircuitStats> {
        if !self.is_circuit_open() {
            return None;
        }
        let value = self.context().data_value(STATS_KEY)?;
        serde_json::from_value(value.clone()).ok()
    }
}
