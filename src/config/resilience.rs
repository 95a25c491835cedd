use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate, WithDefaults};
use crate::resilience::CircuitBreakerConfig;

/// Resilience configuration
///
/// Each backing dependency gets its own breaker so that a failing cache never
/// opens the store breaker and vice versa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Primary (write) store breaker
    #[serde(default)]
    pub store_primary: CircuitBreakerSettings,
    /// Replica (read) store breaker
    #[serde(default)]
    pub store_replica: CircuitBreakerSettings,
    /// Wallet cache breaker
    #[serde(default = "default_cache_breaker")]
    pub cache: CircuitBreakerSettings,
    /// Event channel breaker
    #[serde(default)]
    pub event_channel: CircuitBreakerSettings,
    /// Optimistic concurrency retry configuration
    #[serde(default = "RetryConfig::default")]
    pub retry: RetryConfig,
    /// Version conflicts on one wallet that raise the contention flag
    #[serde(default = "default_contention_window")]
    pub contention: FailureWindowConfig,
    /// Technical store failures that raise the transient-failure flag
    #[serde(default = "default_transient_window")]
    pub transient: FailureWindowConfig,
    /// Health monitor check interval in milliseconds
    #[serde(default = "default_check_interval")]
    pub check_interval_ms: u64,
}

/// Circuit breaker configuration for one dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Enable circuit breaker
    #[serde(default = "default_circuit_breaker_enabled")]
    pub enabled: bool,
    /// Number of most recent calls the failure ratio is computed over
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Calls required in the window before the ratio is evaluated
    #[serde(default = "default_minimum_calls")]
    pub minimum_calls: usize,
    /// Failure ratio (0.0, 1.0] that opens the circuit
    #[serde(default = "default_failure_ratio")]
    pub failure_ratio: f64,
    /// Milliseconds the circuit stays open before allowing trial calls
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_ms: u64,
    /// Consecutive trial successes that close the circuit (1-3)
    #[serde(default = "default_trial_successes")]
    pub trial_successes: u32,
    /// Per-call timeout in milliseconds; an elapsed call counts as a failure
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Enable retry
    #[serde(default = "default_retry_enabled")]
    pub enabled: bool,
    /// Maximum number of attempts, including the first
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    /// Backoff strategy
    #[serde(default = "default_retry_backoff")]
    pub backoff: RetryBackoff,
    /// Initial delay in milliseconds
    #[serde(default = "default_retry_initial_delay")]
    pub initial_delay: u64,
    /// Maximum delay in milliseconds
    #[serde(default = "default_retry_max_delay")]
    pub max_delay: u64,
    /// Multiplier for exponential backoff
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: f64,
    /// Randomization factor applied to each delay, 0.0 to 1.0
    #[serde(default = "default_retry_jitter")]
    pub jitter: f64,
}

/// Retry backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryBackoff {
    /// Exponential backoff (delay *= multiplier)
    Exponential,
    /// Linear backoff (delay += initial_delay)
    Linear,
    /// Constant backoff (delay = initial_delay)
    Constant,
}

/// Sliding time window with an activation threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureWindowConfig {
    pub window_ms: u64,
    pub threshold: usize,
}

// Default functions for CircuitBreakerSettings
fn default_circuit_breaker_enabled() -> bool {
    true
}

fn default_window_size() -> usize {
    10
}

fn default_minimum_calls() -> usize {
    5
}

fn default_failure_ratio() -> f64 {
    0.5
}

fn default_reset_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_trial_successes() -> u32 {
    2
}

fn default_call_timeout() -> u64 {
    2_000
}

fn default_cache_breaker() -> CircuitBreakerSettings {
    CircuitBreakerSettings {
        call_timeout_ms: 250,
        ..CircuitBreakerSettings::default()
    }
}

// Default functions for RetryConfig
fn default_retry_enabled() -> bool {
    true
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_backoff() -> RetryBackoff {
    RetryBackoff::Exponential
}

fn default_retry_initial_delay() -> u64 {
    10 // milliseconds
}

fn default_retry_max_delay() -> u64 {
    200 // milliseconds
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_retry_jitter() -> f64 {
    0.5
}

// Default functions for ResilienceConfig
fn default_contention_window() -> FailureWindowConfig {
    FailureWindowConfig {
        window_ms: 10_000,
        threshold: 3,
    }
}

fn default_transient_window() -> FailureWindowConfig {
    FailureWindowConfig {
        window_ms: 30_000,
        threshold: 5,
    }
}

fn default_check_interval() -> u64 {
    5_000
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: default_circuit_breaker_enabled(),
            window_size: default_window_size(),
            minimum_calls: default_minimum_calls(),
            failure_ratio: default_failure_ratio(),
            reset_timeout_ms: default_reset_timeout(),
            trial_successes: default_trial_successes(),
            call_timeout_ms: default_call_timeout(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Convert to the runtime breaker configuration
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: self.enabled,
            window_size: self.window_size,
            minimum_calls: self.minimum_calls,
            failure_ratio: self.failure_ratio,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            trial_successes: self.trial_successes,
            call_timeout: (self.call_timeout_ms > 0)
                .then(|| Duration::from_millis(self.call_timeout_ms)),
        }
    }

    fn validate_named(&self, name: &str) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.window_size == 0 {
            return Err(ConfigError::ValidationError(format!("resilience.{name}.window_size must be > 0")));
        }
        if self.minimum_calls == 0 || self.minimum_calls > self.window_size {
            return Err(ConfigError::ValidationError(format!("resilience.{name}.minimum_calls must be between 1 and window_size")));
        }
        if !(self.failure_ratio > 0.0 && self.failure_ratio <= 1.0) {
            return Err(ConfigError::ValidationError(format!("resilience.{name}.failure_ratio must be in (0.0, 1.0]")));
        }
        if self.reset_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(format!("resilience.{name}.reset_timeout_ms must be > 0")));
        }
        if !(1..=3).contains(&self.trial_successes) {
            return Err(ConfigError::ValidationError(format!("resilience.{name}.trial_successes must be between 1 and 3")));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_retry_enabled(),
            max_attempts: default_retry_max_attempts(),
            backoff: default_retry_backoff(),
            initial_delay: default_retry_initial_delay(),
            max_delay: default_retry_max_delay(),
            multiplier: default_retry_multiplier(),
            jitter: default_retry_jitter(),
        }
    }
}

impl FailureWindowConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn validate_named(&self, name: &str) -> Result<(), ConfigError> {
        if self.window_ms == 0 {
            return Err(ConfigError::ValidationError(format!("resilience.{name}.window_ms must be > 0")));
        }
        if self.threshold == 0 {
            return Err(ConfigError::ValidationError(format!("resilience.{name}.threshold must be > 0")));
        }
        Ok(())
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            store_primary: CircuitBreakerSettings::default(),
            store_replica: CircuitBreakerSettings::default(),
            cache: default_cache_breaker(),
            event_channel: CircuitBreakerSettings::default(),
            retry: RetryConfig::default(),
            contention: default_contention_window(),
            transient: default_transient_window(),
            check_interval_ms: default_check_interval(),
        }
    }
}

impl ResilienceConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl Validate for ResilienceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.store_primary.validate_named("store_primary")?;
        self.store_replica.validate_named("store_replica")?;
        self.cache.validate_named("cache")?;
        self.event_channel.validate_named("event_channel")?;
        self.retry.validate()?;
        self.contention.validate_named("contention")?;
        self.transient.validate_named("transient")?;
        if self.check_interval_ms == 0 {
            return Err(ConfigError::ValidationError("resilience.check_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Validate for RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.max_attempts == 0 {
            return Err(ConfigError::ValidationError("resilience.retry.max_attempts must be > 0 when retry is enabled".to_string()));
        }
        if self.enabled && self.initial_delay == 0 {
            return Err(ConfigError::ValidationError("resilience.retry.initial_delay must be > 0 when retry is enabled".to_string()));
        }
        if self.enabled && self.max_delay == 0 {
            return Err(ConfigError::ValidationError("resilience.retry.max_delay must be > 0 when retry is enabled".to_string()));
        }
        if self.enabled && self.initial_delay > self.max_delay {
            return Err(ConfigError::ValidationError("resilience.retry.initial_delay must be <= max_delay".to_string()));
        }
        if self.enabled && self.multiplier <= 0.0 {
            return Err(ConfigError::ValidationError("resilience.retry.multiplier must be > 0.0 when retry is enabled".to_string()));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::ValidationError("resilience.retry.jitter must be between 0.0 and 1.0".to_string()));
        }
        Ok(())
    }
}

impl WithDefaults for ResilienceConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}

impl WithDefaults for CircuitBreakerSettings {
    fn with_defaults() -> Self {
        Self::default()
    }
}

impl WithDefaults for RetryConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}
