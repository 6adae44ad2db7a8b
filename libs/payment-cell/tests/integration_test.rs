use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::router::card_routes;
use payment_cell::services::StripeClient;
use payment_cell::PaymentError;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

fn create_test_app(mock_server: &MockServer) -> Router {
    card_routes(TestConfig::with_mock_server(&mock_server.uri()).to_arc())
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", token));
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn token_for(user: &TestUser) -> String {
    JwtTestUtils::create_test_token(user, TEST_JWT_SECRET, None)
}

fn card_body(number: &str) -> Value {
    json!({
        "cardholder_name": "Jane Doe",
        "card_number": number,
        "card_type": "visa",
        "city": "Atlanta",
        "state": "GA",
        "zip_code": "30301",
        "card_expiry_date": "12/2030",
        "cvc": "123",
        "billing_address": "12 Main Street"
    })
}

fn card_row(user_id: &str) -> Value {
    json!({
        "id": "card-1",
        "user_id": user_id,
        "cardholder_name": "Jane Doe",
        "last4_digit": "4242",
        "exp_month": 12,
        "exp_year": 2030,
        "card_type": "visa",
        "city": "Atlanta",
        "state": "GA",
        "zip_code": "30301",
        "billing_address": "12 Main Street",
        "setup_id": "seti_123",
        "payment_method_id": "pm_123",
        "created_at": "2026-02-01T08:00:00Z"
    })
}

async fn mount_existing_customer(mock_server: &MockServer, user: &TestUser) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/customers/{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": user.id,
            "object": "customer",
            "email": user.email
        })))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_save_card_creates_customer_and_stores_token_only() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("jane@example.com");

    Mock::given(method("GET"))
        .and(path(format!("/v1/customers/{}", patient.id)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "code": "resource_missing",
                "message": "No such customer"
            }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", patient.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(&patient, "hash")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .and(header("Authorization", "Bearer sk_test_123"))
        .and(body_string_contains(format!("id={}", patient.id)))
        .and(body_string_contains("name=Jane+Doe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": patient.id,
            "email": patient.email,
            "name": "Jane Doe"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_methods"))
        .and(body_string_contains("4242424242424242"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pm_123",
            "customer": null,
            "card": { "brand": "visa", "last4": "4242", "exp_month": 12, "exp_year": 2030 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/setup_intents"))
        .and(body_string_contains("payment_method=pm_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "seti_123",
            "status": "requires_confirmation",
            "customer": patient.id,
            "payment_method": "pm_123"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/user_cards"))
        .and(body_partial_json(json!({
            "user_id": patient.id,
            "last4_digit": "4242",
            "exp_month": 12,
            "exp_year": 2030,
            "setup_id": "seti_123",
            "payment_method_id": "pm_123"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([card_row(&patient.id)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({ "qualified": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(request("POST", "/", &token_for(&patient), Some(card_body("4242 4242 4242 4242"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["card"]["last4_digit"], "4242");
    assert!(body["card"].get("card_number").is_none());
}

#[tokio::test]
async fn test_save_card_rejects_luhn_failure_before_stripe() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("jane@example.com");

    Mock::given(method("POST"))
        .and(path("/v1/payment_methods"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(request("POST", "/", &token_for(&patient), Some(card_body("4242424242424241"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Invalid card: card_number is not valid");
}

#[tokio::test]
async fn test_save_card_surfaces_decline() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("jane@example.com");

    mount_existing_customer(&mock_server, &patient).await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_methods"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "message": "Your card was declined."
            }
        })))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(request("POST", "/", &token_for(&patient), Some(card_body("4000000000000002"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "CardError-Your card was declined.");
}

#[tokio::test]
async fn test_provider_cannot_save_card() {
    let mock_server = MockServer::start().await;
    let provider = TestUser::provider("house@example.com");

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(request("POST", "/", &token_for(&provider), Some(card_body("4242424242424242"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_cards() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("jane@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/user_cards"))
        .and(query_param("user_id", format!("eq.{}", patient.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([card_row(&patient.id)])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(request("GET", "/", &token_for(&patient), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["cards"][0]["payment_method_id"], "pm_123");
}

#[tokio::test]
async fn test_delete_card_detaches_payment_method() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("jane@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/user_cards"))
        .and(query_param("id", "eq.card-1"))
        .and(query_param("user_id", format!("eq.{}", patient.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([card_row(&patient.id)])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/customers/{}/payment_methods", patient.id)))
        .and(query_param("type", "card"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "id": "pm_123", "customer": patient.id, "card": null }]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_methods/pm_123/detach"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pm_123",
            "customer": null,
            "card": null
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/user_cards"))
        .and(query_param("id", "eq.card-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(request("DELETE", "/card-1", &token_for(&patient), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_unknown_card() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("jane@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/user_cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(request("DELETE", "/card-9", &token_for(&patient), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_retrieve_setup_intent() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/v1/setup_intents/seti_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "seti_123",
            "status": "succeeded",
            "customer": "cus_1",
            "payment_method": "pm_123"
        })))
        .mount(&mock_server)
        .await;

    let client = StripeClient::new(&config).unwrap();
    let intent = client.retrieve_setup_intent("seti_123").await.unwrap();

    assert_eq!(intent.status, "succeeded");
    assert_eq!(intent.payment_method.as_deref(), Some("pm_123"));
}

#[tokio::test]
async fn test_rate_limit_maps_to_error_family() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/v1/setup_intents/seti_busy"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "type": "invalid_request_error", "message": "Too many requests" }
        })))
        .mount(&mock_server)
        .await;

    let client = StripeClient::new(&config).unwrap();
    let result = client.retrieve_setup_intent("seti_busy").await;

    assert_matches!(result, Err(PaymentError::RateLimit(msg)) if msg == "Too many requests");
}
