use actix_web::{HttpResponse, Responder, web};

use crate::metrics::AppMetrics;

/// Prometheus text exposition
#[get("/metrics")]
pub async fn metrics(metrics: web::Data<AppMetrics>) -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics.render())
}
