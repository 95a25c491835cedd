//! Background recovery checks
//!
//! Degraded modes are entered by the adapters on the request path and left
//! here, once a check shows the dependency is back.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::adapters::{CacheAdapter, LedgerStoreAdapter};
use crate::cache::Cache;
use crate::resilience::{CircuitState, DegradationCoordinator, DegradedMode, FailurePatterns};

/// Modes a check round left
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub exited: Vec<DegradedMode>,
}

pub struct HealthMonitor<C: Cache> {
    store: Arc<LedgerStoreAdapter>,
    cache: Arc<CacheAdapter<C>>,
    coordinator: Arc<DegradationCoordinator>,
    patterns: Arc<FailurePatterns>,
    interval: Duration,
}

impl<C: Cache + 'static> HealthMonitor<C> {
    pub fn new(
        store: Arc<LedgerStoreAdapter>,
        cache: Arc<CacheAdapter<C>>,
        coordinator: Arc<DegradationCoordinator>,
        patterns: Arc<FailurePatterns>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            coordinator,
            patterns,
            interval,
        }
    }

    /// One check round
    pub async fn run_once(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        if self.coordinator.is_active(DegradedMode::ReadOnly)
            && self.store.check_primary().await
            && self.store.primary_breaker().state() == CircuitState::Closed
            && self.coordinator.exit_read_only_mode().is_some()
        {
            report.exited.push(DegradedMode::ReadOnly);
        }

        if self.coordinator.is_active(DegradedMode::CacheBypass) && self.cache.recover().await {
            report.exited.push(DegradedMode::CacheBypass);
        }

        if self.coordinator.is_active(DegradedMode::TransientFailurePattern)
            && self.patterns.transient.is_quiet()
            && self.coordinator.exit_transient_failure_pattern().is_some()
        {
            report.exited.push(DegradedMode::TransientFailurePattern);
        }

        if self.coordinator.is_active(DegradedMode::LockContentionHigh)
            && self.patterns.contention.is_quiet()
            && self.coordinator.clear_lock_contention().is_some()
        {
            report.exited.push(DegradedMode::LockContentionHigh);
        }

        if !report.exited.is_empty() {
            tracing::info!(exited = ?report.exited, "Degraded modes recovered");
        }
        report
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                }
            }
            tracing::info!("Health monitor stopped");
        })
    }
}
