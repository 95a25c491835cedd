//! Circuit Breaker Pattern Implementation
//!
//! One breaker guards one backing dependency. It tracks the outcome of the last
//! `window_size` calls and opens once the failure ratio over that window reaches
//! `failure_ratio`, failing every call fast until `reset_timeout` has elapsed.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐
//! │ Closed  │ ◄──────────────────┐
//! │ (Normal)│                    │
//! └────┬────┘                    │
//!      │ failure ratio           │ trial_successes
//!      │ over the window         │ consecutive successes
//!      ▼                         │
//! ┌─────────┐ reset_timeout ┌────┴──────┐
//! │  Open   │───────────────► HalfOpen  │
//! │(Failing)│                │ (Testing) │
//! └─────────┘◄───────────────└───────────┘
//!                any failure
//! ```
//!
//! The breaker never inspects errors itself. Callers decide which errors count
//! against it through [`CircuitBreaker::call_classified`]; a call that exceeds the
//! configured timeout, or whose future is dropped before completing, is always
//! counted as a failure.
//!
//! # Example
//!
//! ```rust
//! use wallet_ledger::resilience::{CircuitBreaker, CircuitBreakerConfig};
//!
//! # async fn example() {
//! let cb = CircuitBreaker::with_config("event-channel", CircuitBreakerConfig::default());
//!
//! let result = cb.call(async { Ok::<_, std::io::Error>("ack") }).await;
//! assert!(result.is_ok());
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Serialize;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation, allowing all requests through
    Closed,
    /// Failing state, rejecting all requests until the reset timeout expires
    Open,
    /// Testing state, allowing a limited number of trial requests
    HalfOpen,
}

impl CircuitState {
    fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// When false every call passes straight through without accounting
    pub enabled: bool,
    /// Number of most recent calls kept in the rolling window
    pub window_size: usize,
    /// Calls required in the window before the ratio is evaluated
    pub minimum_calls: usize,
    /// Failure ratio that opens the circuit
    pub failure_ratio: f64,
    /// Time spent Open before trial calls are allowed
    pub reset_timeout: Duration,
    /// Consecutive trial successes needed to close from HalfOpen
    pub trial_successes: u32,
    /// Upper bound for a single call
    pub call_timeout: Option<Duration>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_size: 10,
            minimum_calls: 5,
            failure_ratio: 0.5,
            reset_timeout: Duration::from_secs(30),
            trial_successes: 2,
            call_timeout: Some(Duration::from_secs(2)),
        }
    }
}

/// Circuit breaker error
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the call was not attempted
    #[error("Circuit breaker is open for {name}")]
    Open { name: String },
    /// The call did not complete within the configured timeout
    #[error("Call through {name} timed out after {after:?}")]
    Timeout { name: String, after: Duration },
    /// The underlying operation failed
    #[error("Operation failed: {0}")]
    Inner(#[source] E),
}

impl<E> CircuitBreakerError<E> {
    /// True when the breaker itself refused or abandoned the call
    pub fn is_breaker_failure(&self) -> bool {
        !matches!(self, CircuitBreakerError::Inner(_))
    }
}

/// Point-in-time view of a breaker, used by health endpoints
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub calls_in_window: usize,
    pub failures_in_window: usize,
    pub opened_for_ms: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,
    pub rejected_calls: u64,
}

/// A state change, handed to the registered observer
#[derive(Debug, Clone)]
pub struct BreakerTransition {
    pub name: String,
    pub from: CircuitState,
    pub to: CircuitState,
    pub reason: String,
}

/// Receives every transition of the breakers it is registered on
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, transition: &BreakerTransition);
}

/// Thread-safe lifetime counters
#[derive(Debug, Default)]
struct CircuitBreakerStats {
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    rejected_calls: AtomicU64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// `true` marks a failed call
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trials_in_flight: u32,
    trial_streak: u32,
}

impl BreakerInner {
    fn failures(&self) -> usize {
        self.window.iter().filter(|failed| **failed).count()
    }
}

/// Rolling-window circuit breaker
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    inner: Arc<Mutex<BreakerInner>>,
    stats: Arc<CircuitBreakerStats>,
    config: CircuitBreakerConfig,
    observer: Option<Arc<dyn TransitionObserver>>,
}

/// Admission ticket for one call. Dropping it without completing counts as a failure.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    done: bool,
}

impl Permit<'_> {
    fn complete(mut self, success: bool) {
        self.done = true;
        self.breaker.on_result(self.trial, success, "call failed");
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.breaker.on_result(self.trial, false, "call cancelled");
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name: String = name.into();
        gauge!("circuit_breaker_state", "dependency" => name.clone()).set(CircuitState::Closed.gauge_value());
        Self {
            name: Arc::from(name),
            inner: Arc::new(Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(config.window_size),
                opened_at: None,
                trials_in_flight: 0,
                trial_streak: 0,
            })),
            stats: Arc::new(CircuitBreakerStats::default()),
            config,
            observer: None,
        }
    }

    /// Report every transition to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Get the circuit breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get total number of calls that reached the operation
    pub fn total_calls(&self) -> u64 {
        self.stats.total_calls.load(Ordering::Relaxed)
    }

    /// Get total number of failures
    pub fn total_failures(&self) -> u64 {
        self.stats.total_failures.load(Ordering::Relaxed)
    }

    /// Get number of calls rejected without being attempted
    pub fn rejected_calls(&self) -> u64 {
        self.stats.rejected_calls.load(Ordering::Relaxed)
    }

    /// Failure ratio over the current window (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        let inner = self.inner.lock();
        if inner.window.is_empty() {
            return 0.0;
        }
        inner.failures() as f64 / inner.window.len() as f64
    }

    pub fn snapshot(&self) -> BreakerStatus {
        let inner = self.inner.lock();
        BreakerStatus {
            name: self.name.to_string(),
            state: inner.state,
            calls_in_window: inner.window.len(),
            failures_in_window: inner.failures(),
            opened_for_ms: inner
                .opened_at
                .filter(|_| inner.state != CircuitState::Closed)
                .map(|at| at.elapsed().as_millis() as u64),
            total_calls: self.total_calls(),
            total_failures: self.total_failures(),
            rejected_calls: self.rejected_calls(),
        }
    }

    /// Execute an operation, counting every error against the breaker
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.call_classified(f, |_| true).await
    }

    /// Execute an operation, counting only errors for which `counts` returns true
    ///
    /// Errors the classifier rejects are returned as [`CircuitBreakerError::Inner`]
    /// but recorded as successful calls, since the dependency itself answered.
    pub async fn call_classified<F, T, E, C>(&self, f: F, counts: C) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        if !self.config.enabled {
            return self.run(f).await;
        }

        let permit = self.acquire()?;
        match self.run(f).await {
            Ok(value) => {
                permit.complete(true);
                Ok(value)
            }
            Err(CircuitBreakerError::Inner(err)) => {
                permit.complete(!counts(&err));
                Err(CircuitBreakerError::Inner(err))
            }
            Err(err) => {
                permit.complete(false);
                Err(err)
            }
        }
    }

    async fn run<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        match self.config.call_timeout {
            Some(after) => match tokio::time::timeout(after, f).await {
                Ok(result) => result.map_err(CircuitBreakerError::Inner),
                Err(_) => Err(CircuitBreakerError::Timeout {
                    name: self.name.to_string(),
                    after,
                }),
            },
            None => f.await.map_err(CircuitBreakerError::Inner),
        }
    }

    fn acquire<E>(&self) -> Result<Permit<'_>, CircuitBreakerError<E>> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
            if elapsed >= self.config.reset_timeout {
                self.transition(&mut inner, CircuitState::HalfOpen, "reset timeout elapsed");
            }
        }

        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(Permit {
                breaker: self,
                trial: false,
                done: false,
            }),
            CircuitState::HalfOpen if inner.trials_in_flight < self.config.trial_successes => {
                inner.trials_in_flight += 1;
                Ok(Permit {
                    breaker: self,
                    trial: true,
                    done: false,
                })
            }
            _ => {
                drop(inner);
                self.stats.rejected_calls.fetch_add(1, Ordering::Relaxed);
                counter!("circuit_breaker_rejections_total", "dependency" => self.name.to_string()).increment(1);
                Err(CircuitBreakerError::Open {
                    name: self.name.to_string(),
                })
            }
        }
    }

    fn on_result(&self, trial: bool, success: bool, reason: &str) {
        self.stats.total_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.stats.total_failures.fetch_add(1, Ordering::Relaxed);
        }

        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            CircuitState::Closed => {
                inner.window.push_back(!success);
                while inner.window.len() > self.config.window_size {
                    inner.window.pop_front();
                }
                if !success && inner.window.len() >= self.config.minimum_calls {
                    let ratio = inner.failures() as f64 / inner.window.len() as f64;
                    if ratio >= self.config.failure_ratio {
                        let reason = format!("failure ratio {:.2} over last {} calls", ratio, inner.window.len());
                        self.transition(&mut inner, CircuitState::Open, &reason);
                    }
                }
            }
            CircuitState::HalfOpen if trial => {
                inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
                if !success {
                    self.transition(&mut inner, CircuitState::Open, &format!("trial {reason}"));
                } else {
                    inner.trial_streak += 1;
                    if inner.trial_streak >= self.config.trial_successes {
                        self.transition(&mut inner, CircuitState::Closed, "trial calls succeeded");
                    }
                }
            }
            // Outcomes of calls admitted before the last transition
            _ => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, reason: &str) {
        let from = inner.state;
        if from == to {
            return;
        }

        inner.state = to;
        inner.trials_in_flight = 0;
        inner.trial_streak = 0;
        match to {
            CircuitState::Open => inner.opened_at = Some(Instant::now()),
            CircuitState::Closed => {
                inner.window.clear();
                inner.opened_at = None;
            }
            CircuitState::HalfOpen => {}
        }

        if to == CircuitState::Open {
            tracing::warn!(
                circuit_breaker = %self.name,
                state = %format!("{from} -> {to}"),
                reason,
                "Circuit breaker opened"
            );
        } else {
            tracing::info!(
                circuit_breaker = %self.name,
                state = %format!("{from} -> {to}"),
                reason,
                "Circuit breaker state changed"
            );
        }

        counter!(
            "circuit_breaker_transitions_total",
            "dependency" => self.name.to_string(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
        gauge!("circuit_breaker_state", "dependency" => self.name.to_string()).set(to.gauge_value());

        if let Some(observer) = &self.observer {
            observer.on_transition(&BreakerTransition {
                name: self.name.to_string(),
                from,
                to,
                reason: reason.to_string(),
            });
        }
    }

    /// Open the circuit immediately, regardless of the window
    pub fn force_open(&self, reason: &str) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open {
            inner.opened_at = Some(Instant::now());
            return;
        }
        self.transition(&mut inner, CircuitState::Open, reason);
    }

    /// Move an open circuit to HalfOpen without waiting for the reset timeout
    ///
    /// Used when an out-of-band health check has already seen the dependency recover.
    pub fn allow_trial(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open {
            self.transition(&mut inner, CircuitState::HalfOpen, "health check succeeded");
        }
    }

    /// Manually reset the circuit breaker to Closed state with an empty window
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Closed {
            inner.window.clear();
            return;
        }
        self.transition(&mut inner, CircuitState::Closed, "manual reset");
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("calls_in_window", &inner.window.len())
            .field("failures_in_window", &inner.failures())
            .field("total_calls", &self.total_calls())
            .field("total_failures", &self.total_failures())
            .field("config", &self.config)
            .finish()
    }
}
