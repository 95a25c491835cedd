//! Health check endpoints
//!
//! Liveness never checks dependencies. Readiness and the degradation report
//! read the [`HealthReporter`] registered as app data.

use actix_web::web::{Data, Json};
use actix_web::{HttpResponse, Responder};
use chrono::Utc;

use crate::responses::{LivenessResponse, ReadinessResponse};
use crate::services::HealthReporter;

/// Liveness check endpoint
///
/// Always 200 while the process is serving requests.
#[get("/health")]
pub async fn health() -> impl Responder {
    ::tracing::debug!("Liveness check: healthy");
    Json(LivenessResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

/// Readiness check
///
/// 503 while the service refuses writes. Other degraded modes keep the
/// instance ready because reads and writes are still served.
#[get("/ready")]
pub async fn ready(reporter: Data<dyn HealthReporter>) -> impl Responder {
    let status = reporter.degradation_status();
    let is_ready = !status.is_read_only();

    let response = ReadinessResponse {
        status: if is_ready { "ready" } else { "not_ready" }.to_string(),
        timestamp: Utc::now(),
        health_score: status.health_score,
        active_modes: status.active_modes,
    };

    ::tracing::debug!(
        status = %response.status,
        health_score = response.health_score,
        "Readiness check performed"
    );

    if is_ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

#[get("/health/degradation")]
pub async fn degradation(reporter: Data<dyn HealthReporter>) -> impl Responder {
    HttpResponse::Ok().json(reporter.degradation_status())
}
