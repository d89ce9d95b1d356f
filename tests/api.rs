//! Router tests that never reach the database: every request here is
//! refused by validation or by the session extractor first, so the pool is
//! connected lazily and never used.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use pharmora::{create_app, AppState};

const ORIGIN: &str = "http://localhost:3000";

fn app() -> Router {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://postgres@localhost:5432/pharmora_test")
        .expect("lazy pool");
    create_app(AppState::new(pool), &[ORIGIN.to_string()], "public/images")
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn checkout_with_blank_address_is_rejected() {
    let (status, body) = send(json_request(
        Method::POST,
        "/api/orders",
        json!({ "user_id": 1, "delivery_address": "   " }),
    ))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("address"));
    assert!(body["error_id"].as_str().is_some());
}

#[tokio::test]
async fn stock_request_for_zero_units_is_rejected() {
    let (status, body) = send(json_request(
        Method::POST,
        "/api/stock-requests",
        json!({
            "pharmacist_id": 3,
            "supplier_id": 1,
            "medicine_id": 1,
            "quantity_requested": 0
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Requested quantity must be at least 1");
}

#[tokio::test]
async fn card_payment_needs_four_digits() {
    let (status, body) = send(json_request(
        Method::POST,
        "/api/payments",
        json!({
            "order_id": 1,
            "user_id": 5,
            "amount": 200,
            "method": "card",
            "card_last_four": "12a4"
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
}

#[tokio::test]
async fn unknown_payment_method_is_rejected() {
    let (status, _) = send(json_request(
        Method::POST,
        "/api/payments",
        json!({ "order_id": 1, "user_id": 5, "amount": 200, "method": "cheque" }),
    ))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cart_quantity_must_be_positive() {
    let (status, body) = send(json_request(
        Method::PUT,
        "/api/cart/7",
        json!({ "quantity": 0 }),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Quantity must be at least 1");

    let (status, _) = send(json_request(
        Method::POST,
        "/api/cart",
        json!({ "user_id": 5, "medicine_id": 1, "quantity": -2 }),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(json_request(
        Method::POST,
        "/api/cart",
        json!({ "user_id": 5, "medicine_id": 1, "quantity": i32::MAX }),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Quantity cannot be more than 1000");
}

#[tokio::test]
async fn signup_with_short_password_is_rejected() {
    let (status, body) = send(json_request(
        Method::POST,
        "/api/signup",
        json!({
            "name": "Anita",
            "email": "anita@example.com",
            "password": "abc",
            "role": "Patient"
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters long");
}

#[tokio::test]
async fn admin_endpoints_need_a_session() {
    for uri in ["/api/admin/stats", "/api/admin/users", "/api/admin/reports?type=users"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error_type"], "unauthorized");
    }

    let request = Request::builder()
        .uri("/api/admin/stats")
        .header("x-user-id", "not-a-number")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn doctors_cannot_set_a_prescription_back_to_pending() {
    for uri in [
        "/api/prescriptions/4/verify",
        "/api/doctor/verify-prescription/4",
    ] {
        let (status, body) = send(json_request(
            Method::PUT,
            uri,
            json!({ "doctor_id": 2, "status": "Pending" }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error_type"], "validation_error");
    }

    let (status, _) = send(json_request(
        Method::PUT,
        "/api/prescriptions/4/verify",
        json!({ "doctor_id": 2, "status": "Maybe" }),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let request = Request::builder()
        .uri("/api/does-not-exist")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preflight_allows_the_dev_origin_and_session_header() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/login")
        .header(header::ORIGIN, ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,x-user-id")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ORIGIN
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}
