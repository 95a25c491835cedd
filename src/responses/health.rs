use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resilience::{BreakerStatus, CircuitState, DegradationSnapshot, DegradedMode, HealthLevel};

/// Liveness response; no dependency is checked
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Readiness response; not ready while writes are refused
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub health_score: u8,
    pub active_modes: Vec<DegradedMode>,
}

/// Full degradation report for operators
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradationStatus {
    pub snapshot: DegradationSnapshot,
    pub active_modes: Vec<DegradedMode>,
    pub health_score: u8,
    pub health_level: HealthLevel,
    pub breakers: Vec<BreakerStatus>,
    /// Names of dependencies whose breaker is not closed
    pub open_dependencies: Vec<String>,
}

impl DegradationStatus {
    pub fn new(snapshot: DegradationSnapshot, breakers: Vec<BreakerStatus>) -> Self {
        let open_dependencies = breakers
            .iter()
            .filter(|status| status.state != CircuitState::Closed)
            .map(|status| status.name.clone())
            .collect();

        Self {
            active_modes: snapshot.active_modes(),
            health_score: snapshot.health_score(),
            health_level: snapshot.health_level(),
            snapshot,
            breakers,
            open_dependencies,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.snapshot.read_only.active
    }
}
