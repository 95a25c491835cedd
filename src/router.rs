use actix_web::web::ServiceConfig;

use crate::controllers;

/// Register the operational endpoints
///
/// The caller provides `Data<dyn HealthReporter>` and `Data<AppMetrics>`.
pub fn route(app: &mut ServiceConfig) {
    // Health check endpoints
    app.service(controllers::health::health);
    app.service(controllers::health::ready);
    app.service(controllers::health::degradation);

    // Metrics endpoint
    app.service(controllers::metrics::metrics);
}
