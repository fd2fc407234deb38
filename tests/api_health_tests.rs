//! 健康检查 API 集成测试

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

mod common;
use common::create_test_app_state;

#[tokio::test]
async fn test_health_endpoint() {
    let state = create_test_app_state();
    let app = mentoring_access::routes::create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // 读取响应体
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["uptime_secs"].is_number());
}

#[tokio::test]
async fn test_health_endpoint_needs_no_actor() {
    let state = create_test_app_state();
    let app = mentoring_access::routes::create_router(state);

    // 未知用户头不影响公开端点
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-actor-id", "ghost")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let state = create_test_app_state();
    let app = mentoring_access::routes::create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["ready"], false);
    let checks = json["checks"].as_array().unwrap();
    let database = checks.iter().find(|c| c["name"] == "database").unwrap();
    assert_eq!(database["status"], "unhealthy");
    let geography = checks.iter().find(|c| c["name"] == "geography").unwrap();
    assert_eq!(geography["status"], "healthy");
    assert_eq!(geography["message"], "12 entities");
}

#[tokio::test]
async fn test_trace_id_is_echoed() {
    let state = create_test_app_state();
    let app = mentoring_access::routes::create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-trace-id", "trace-abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-trace-id").unwrap(), "trace-abc");
}
