pub mod middleware;

pub use middleware::track_http;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::{Arc, OnceLock};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

/// Process-wide Prometheus recorder
///
/// Components record through the `metrics` macros directly; this type owns the
/// recorder installation and renders the scrape output.
#[derive(Clone)]
pub struct AppMetrics {
    prometheus_handle: Arc<PrometheusHandle>,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self::with_config(None)
    }

    pub fn with_config(config: Option<&crate::config::AppConfig>) -> Self {
        let handle = PROMETHEUS_HANDLE.get_or_init(|| {
            let builder = PrometheusBuilder::new();

            let builder = if let Some(cfg) = config {
                builder
                    .add_global_label("service", cfg.app.name.clone())
                    .add_global_label("version", cfg.app.version.clone())
                    .add_global_label("environment", cfg.app.environment.clone())
                    .add_global_label("instance", cfg.observability.service_instance_id.clone())
            } else {
                builder
            };

            let builder = [
                "http_requests_duration_seconds",
                "ledger_operation_duration_seconds",
                "degradation_mode_duration_seconds",
            ]
            .into_iter()
            .fold(builder, |builder, name| {
                match builder.set_buckets_for_metric(Matcher::Full(name.to_string()), LATENCY_BUCKETS) {
                    Ok(builder) => builder,
                    Err(e) => {
                        ::tracing::warn!(metric = name, error = %e, "Invalid histogram buckets");
                        PrometheusBuilder::new()
                    }
                }
            });

            Self::describe_metrics();

            match builder.install_recorder() {
                Ok(handle) => handle,
                Err(e) => {
                    // Another recorder owns the process; render an empty registry.
                    ::tracing::warn!(error = %e, "Prometheus recorder not installed");
                    PrometheusBuilder::new().build_recorder().handle()
                }
            }
        });

        Self {
            prometheus_handle: Arc::new(handle.clone()),
        }
    }

    fn describe_metrics() {
        // HTTP metrics
        describe_counter!("http_requests_total", "Total number of HTTP requests");
        describe_histogram!(
            "http_requests_duration_seconds",
            "HTTP request duration in seconds"
        );
        describe_gauge!(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed"
        );

        // Ledger operations
        describe_counter!(
            "ledger_operations_total",
            "Ledger façade calls by operation and outcome"
        );
        describe_histogram!(
            "ledger_operation_duration_seconds",
            "Ledger façade call duration in seconds"
        );
        describe_counter!(
            "ledger_version_conflicts_total",
            "Optimistic version conflicts observed on wallet writes"
        );

        // Circuit breakers
        describe_gauge!(
            "circuit_breaker_state",
            "Breaker state per dependency (0 closed, 1 half-open, 2 open)"
        );
        describe_counter!(
            "circuit_breaker_transitions_total",
            "Breaker state transitions per dependency"
        );
        describe_counter!(
            "circuit_breaker_rejections_total",
            "Calls rejected by an open breaker"
        );

        // Degradation
        describe_gauge!("degradation_mode_active", "1 while a degraded mode is active");
        describe_histogram!(
            "degradation_mode_duration_seconds",
            "Time spent in a degraded mode before it exited"
        );
        describe_gauge!("health_score", "Health score from 0 to 100");

        // Store and cache
        describe_counter!(
            "store_replica_fallback_total",
            "Replica reads served by the primary instead"
        );
        describe_counter!("cache_hits_total", "Total number of cache hits");
        describe_counter!("cache_misses_total", "Total number of cache misses");
        describe_counter!("cache_failures_total", "Cache operations that failed");

        // Outbox
        describe_gauge!("outbox_pending", "Outbox records waiting for the relay");
        describe_counter!("outbox_published_total", "Outbox records published");
        describe_counter!(
            "outbox_publish_failures_total",
            "Failed outbox publish attempts"
        );
        describe_counter!(
            "outbox_alerts_total",
            "Outbox records that reached the attempt alert threshold"
        );
    }

    // HTTP metrics
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        counter!(
            "http_requests_total",
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            "http_requests_duration_seconds",
            "method" => method.to_string(),
            "path" => path.to_string()
        )
        .record(duration_secs);
    }

    pub fn http_request_start(&self) {
        gauge!("http_requests_in_flight").increment(1.0);
    }

    pub fn http_request_end(&self) {
        gauge!("http_requests_in_flight").decrement(1.0);
    }

    // Prometheus export
    pub fn render(&self) -> String {
        self.prometheus_handle.render()
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}
