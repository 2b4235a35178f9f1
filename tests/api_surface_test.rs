mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{response_json, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None).await;
    let header = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert!(header.is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn error_envelope_echoes_request_id() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/orders/{}", Uuid::new_v4()))
        .header("x-request-id", "trace-me-42")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-request-id"], "trace-me-42");
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["request_id"], "trace-me-42");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/payments/verify")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["success"], false);
}

#[tokio::test]
async fn verify_requires_every_field() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/payments/verify",
            Some(json!({
                "orderId": Uuid::new_v4(),
                "razorpayPaymentId": "",
                "razorpayOrderId": "order_x",
                "razorpaySignature": "abc"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc = response_json(response).await;
    let paths = doc["paths"].as_object().expect("paths object");
    for path in [
        "/payments/create-order",
        "/payments/verify",
        "/payments/webhook",
        "/admin/verify-payments",
        "/orders",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}
