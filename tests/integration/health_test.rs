//! Health, readiness and degradation endpoints

use actix_web::web::Data;
use actix_web::{App, http::StatusCode, test};
use serde_json::Value;
use std::sync::Arc;
use wallet_ledger::testing::TestStack;
use wallet_ledger::{AppMetrics, HealthReporter, router};

macro_rules! app {
    ($stack:expr) => {{
        let reporter: Arc<dyn HealthReporter> = $stack.ledger.clone();
        test::init_service(
            App::new()
                .app_data(Data::from(reporter))
                .app_data(Data::new(AppMetrics::new()))
                .configure(router::route),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_liveness_is_always_healthy() {
    let stack = TestStack::new();
    stack.coordinator.enter_read_only_mode("primary offline");
    let app = app!(stack);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_readiness_follows_read_only_mode() {
    let stack = TestStack::new();
    let app = app!(stack);

    let req = test::TestRequest::get().uri("/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["healthScore"], 100);

    stack.coordinator.enter_read_only_mode("primary offline");

    let req = test::TestRequest::get().uri("/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["activeModes"], serde_json::json!(["READ_ONLY"]));
}

#[actix_web::test]
async fn test_advisory_modes_keep_instance_ready() {
    let stack = TestStack::new();
    stack.coordinator.enter_cache_bypass_mode("cache timeout");
    stack.coordinator.set_event_processing_degraded("broker down");
    let app = app!(stack);

    let req = test::TestRequest::get().uri("/ready").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["healthScore"].as_u64().unwrap() < 100);
}

#[actix_web::test]
async fn test_degradation_report_lists_modes_and_breakers() {
    let stack = TestStack::new();
    stack.fail_primary("primary offline");
    stack.coordinator.enter_read_only_mode("primary offline");
    let app = app!(stack);

    let req = test::TestRequest::get().uri("/health/degradation").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["activeModes"], serde_json::json!(["READ_ONLY"]));
    assert_eq!(body["openDependencies"], serde_json::json!(["store_primary"]));
    assert_eq!(body["breakers"].as_array().map(Vec::len), Some(4));
    assert_eq!(body["snapshot"]["read_only"]["active"], true);
}
