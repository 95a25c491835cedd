//! Process-wide degradation state
//!
//! [`DegradationCoordinator`] holds five independent flags. Each flag is a single
//! atomic activation timestamp (zero while inactive), so activation and
//! deactivation are compare-and-set operations: the first `enter` wins and the
//! duration is recorded once, by the `exit` that swaps the timestamp back to zero.
//!
//! The coordinator is created once and shared through `Arc`. Only
//! [`DegradationCoordinator::validate_write_operation`] ever rejects work; every
//! other flag is advisory.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use metrics::{gauge, histogram};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::resilience::{BreakerTransition, CircuitState, TransitionObserver};

/// A degraded operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegradedMode {
    ReadOnly,
    CacheBypass,
    EventDegraded,
    LockContentionHigh,
    TransientFailurePattern,
}

impl DegradedMode {
    pub const ALL: [DegradedMode; 5] = [
        DegradedMode::ReadOnly,
        DegradedMode::CacheBypass,
        DegradedMode::EventDegraded,
        DegradedMode::LockContentionHigh,
        DegradedMode::TransientFailurePattern,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DegradedMode::ReadOnly => "read_only",
            DegradedMode::CacheBypass => "cache_bypass",
            DegradedMode::EventDegraded => "event_degraded",
            DegradedMode::LockContentionHigh => "lock_contention_high",
            DegradedMode::TransientFailurePattern => "transient_failure_pattern",
        }
    }

    /// Health score deduction while this mode is active
    pub fn penalty(&self) -> u8 {
        match self {
            DegradedMode::ReadOnly => 40,
            DegradedMode::CacheBypass => 20,
            DegradedMode::EventDegraded
            | DegradedMode::LockContentionHigh
            | DegradedMode::TransientFailurePattern => 10,
        }
    }

    fn index(&self) -> usize {
        match self {
            DegradedMode::ReadOnly => 0,
            DegradedMode::CacheBypass => 1,
            DegradedMode::EventDegraded => 2,
            DegradedMode::LockContentionHigh => 3,
            DegradedMode::TransientFailurePattern => 4,
        }
    }
}

impl fmt::Display for DegradedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DegradedMode::ReadOnly => "READ_ONLY",
            DegradedMode::CacheBypass => "CACHE_BYPASS",
            DegradedMode::EventDegraded => "EVENT_DEGRADED",
            DegradedMode::LockContentionHigh => "LOCK_CONTENTION_HIGH",
            DegradedMode::TransientFailurePattern => "TRANSIENT_FAILURE_PATTERN",
        };
        f.write_str(name)
    }
}

/// Health classification derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Critical,
}

impl HealthLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => HealthLevel::Healthy,
            50..=89 => HealthLevel::Degraded,
            _ => HealthLevel::Critical,
        }
    }
}

/// One flag inside a [`DegradationSnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeState {
    pub active: bool,
    pub since: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl ModeState {
    /// How long the mode has been active, measured at `now`
    pub fn duration_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.since.and_then(|since| (now - since).to_std().ok())
    }
}

/// A consistent read of every flag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationSnapshot {
    pub read_only: ModeState,
    pub cache_bypass: ModeState,
    pub event_degraded: ModeState,
    pub lock_contention_high: ModeState,
    pub transient_failure_pattern: ModeState,
    pub taken_at: DateTime<Utc>,
}

impl DegradationSnapshot {
    pub fn mode(&self, mode: DegradedMode) -> &ModeState {
        match mode {
            DegradedMode::ReadOnly => &self.read_only,
            DegradedMode::CacheBypass => &self.cache_bypass,
            DegradedMode::EventDegraded => &self.event_degraded,
            DegradedMode::LockContentionHigh => &self.lock_contention_high,
            DegradedMode::TransientFailurePattern => &self.transient_failure_pattern,
        }
    }

    pub fn active_modes(&self) -> Vec<DegradedMode> {
        DegradedMode::ALL
            .into_iter()
            .filter(|mode| self.mode(*mode).active)
            .collect()
    }

    pub fn health_score(&self) -> u8 {
        let penalty: u32 = self.active_modes().iter().map(|mode| mode.penalty() as u32).sum();
        100u32.saturating_sub(penalty) as u8
    }

    pub fn health_level(&self) -> HealthLevel {
        HealthLevel::from_score(self.health_score())
    }
}

#[derive(Debug, Default)]
struct ModeFlag {
    /// Activation time in microseconds since the epoch, zero while inactive
    since_micros: AtomicI64,
    reason: Mutex<Option<String>>,
}

/// Owner of the degradation flags
#[derive(Debug, Default)]
pub struct DegradationCoordinator {
    flags: [ModeFlag; 5],
    generation: AtomicU64,
    breakers: DashMap<String, CircuitState>,
}

impl DegradationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `mode`; returns false when it was already active
    pub fn enter(&self, mode: DegradedMode, reason: &str) -> bool {
        let flag = &self.flags[mode.index()];
        let now = Utc::now().timestamp_micros().max(1);
        {
            // Flag and reason only change together, under the reason lock
            let mut current = flag.reason.lock();
            if flag
                .since_micros
                .compare_exchange(0, now, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                tracing::debug!(mode = %mode, reason, "Degraded mode already active, duplicate entry suppressed");
                return false;
            }
            *current = Some(reason.to_string());
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::warn!(mode = %mode, reason, "Entering degraded mode");
        gauge!("degradation_mode_active", "mode" => mode.as_str()).set(1.0);
        self.publish_score();
        true
    }

    /// Deactivate `mode`; returns how long it was active, or `None` when it was not
    pub fn exit(&self, mode: DegradedMode) -> Option<Duration> {
        let flag = &self.flags[mode.index()];
        let since = {
            let mut current = flag.reason.lock();
            let since = flag.since_micros.swap(0, Ordering::AcqRel);
            current.take();
            since
        };
        if since == 0 {
            return None;
        }

        self.generation.fetch_add(1, Ordering::AcqRel);
        let elapsed_micros = Utc::now().timestamp_micros().saturating_sub(since).max(0) as u64;
        let duration = Duration::from_micros(elapsed_micros);
        tracing::info!(mode = %mode, duration_ms = duration.as_millis() as u64, "Leaving degraded mode");
        gauge!("degradation_mode_active", "mode" => mode.as_str()).set(0.0);
        histogram!("degradation_mode_duration_seconds", "mode" => mode.as_str()).record(duration.as_secs_f64());
        self.publish_score();
        Some(duration)
    }

    pub fn is_active(&self, mode: DegradedMode) -> bool {
        self.flags[mode.index()].since_micros.load(Ordering::Acquire) != 0
    }

    pub fn enter_read_only_mode(&self, reason: &str) -> bool {
        self.enter(DegradedMode::ReadOnly, reason)
    }

    pub fn exit_read_only_mode(&self) -> Option<Duration> {
        self.exit(DegradedMode::ReadOnly)
    }

    pub fn enter_cache_bypass_mode(&self, reason: &str) -> bool {
        self.enter(DegradedMode::CacheBypass, reason)
    }

    pub fn exit_cache_bypass_mode(&self) -> Option<Duration> {
        self.exit(DegradedMode::CacheBypass)
    }

    pub fn set_event_processing_degraded(&self, reason: &str) -> bool {
        self.enter(DegradedMode::EventDegraded, reason)
    }

    pub fn clear_event_processing_degraded(&self) -> Option<Duration> {
        self.exit(DegradedMode::EventDegraded)
    }

    pub fn record_optimistic_lock_contention(&self, reason: &str) -> bool {
        self.enter(DegradedMode::LockContentionHigh, reason)
    }

    pub fn clear_lock_contention(&self) -> Option<Duration> {
        self.exit(DegradedMode::LockContentionHigh)
    }

    pub fn enter_transient_failure_pattern(&self, reason: &str) -> bool {
        self.enter(DegradedMode::TransientFailurePattern, reason)
    }

    pub fn exit_transient_failure_pattern(&self) -> Option<Duration> {
        self.exit(DegradedMode::TransientFailurePattern)
    }

    /// Reject writes while read-only mode is active
    pub fn validate_write_operation(&self) -> Result<(), LedgerError> {
        if self.is_active(DegradedMode::ReadOnly) {
            return Err(LedgerError::ServiceDegraded(DegradedMode::ReadOnly));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> DegradationSnapshot {
        // Retry while a transition lands between the first and last flag read
        let mut snapshot = self.read_flags();
        for _ in 0..3 {
            let before = self.generation.load(Ordering::Acquire);
            snapshot = self.read_flags();
            if self.generation.load(Ordering::Acquire) == before {
                break;
            }
        }
        snapshot
    }

    fn read_flags(&self) -> DegradationSnapshot {
        let read = |mode: DegradedMode| {
            let flag = &self.flags[mode.index()];
            let reason = flag.reason.lock();
            let since = flag.since_micros.load(Ordering::Acquire);
            if since == 0 {
                return ModeState {
                    active: false,
                    since: None,
                    reason: None,
                };
            }
            ModeState {
                active: true,
                since: Utc.timestamp_micros(since).single(),
                reason: reason.clone(),
            }
        };

        DegradationSnapshot {
            read_only: read(DegradedMode::ReadOnly),
            cache_bypass: read(DegradedMode::CacheBypass),
            event_degraded: read(DegradedMode::EventDegraded),
            lock_contention_high: read(DegradedMode::LockContentionHigh),
            transient_failure_pattern: read(DegradedMode::TransientFailurePattern),
            taken_at: Utc::now(),
        }
    }

    pub fn health_score(&self) -> u8 {
        self.snapshot().health_score()
    }

    /// Last reported state of every breaker that has transitioned at least once
    pub fn breaker_states(&self) -> Vec<(String, CircuitState)> {
        let mut states: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    fn publish_score(&self) {
        gauge!("health_score").set(self.health_score() as f64);
    }
}

impl TransitionObserver for DegradationCoordinator {
    fn on_transition(&self, transition: &BreakerTransition) {
        tracing::debug!(
            dependency = %transition.name,
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            "Breaker transition recorded"
        );
        self.breakers.insert(transition.name.clone(), transition.to);
    }
}
