//! 健康检查 API 集成测试

use axum::http::StatusCode;

mod common;
use common::{create_test_app, TestRequest};

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let res = TestRequest::get("/health").send(&app).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["status"], "ok");
    assert!(res.json["version"].is_string());
    assert!(res.json["uptime_secs"].is_number());
}

#[tokio::test]
async fn test_readiness_endpoint() {
    let app = create_test_app();

    let res = TestRequest::get("/ready").send(&app).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["ready"], true);
    assert_eq!(res.json["checks"][0]["name"], "database");
}

#[tokio::test]
async fn test_trace_headers_present() {
    let app = create_test_app();

    let res = TestRequest::get("/health").send(&app).await;

    assert!(res.headers.contains_key("x-trace-id"));
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = create_test_app();

    let res = TestRequest::get("/api/nothing-here").send(&app).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
