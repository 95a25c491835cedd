use std::time::Instant;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::Error;

use crate::metrics::AppMetrics;

/// Records request count, latency and in-flight gauge per matched route
///
/// Register with `actix_web::middleware::from_fn(track_http)`; the
/// [`AppMetrics`] handle is read from app data and requests pass through
/// untracked when it is missing.
pub async fn track_http(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let Some(metrics) = req.app_data::<Data<AppMetrics>>().cloned() else {
        return next.call(req).await;
    };

    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .match_pattern()
        .unwrap_or_else(|| req.path().to_string());

    metrics.http_request_start();
    let result = next.call(req).await;
    metrics.http_request_end();

    let status = match &result {
        Ok(response) => response.status().as_u16(),
        Err(e) => e.as_response_error().status_code().as_u16(),
    };
    metrics.record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    result
}
