use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::router::auth_routes;
use auth_cell::services::PasswordService;
use shared_utils::jwt::validate_token;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

const PASSWORD: &str = "Blue-Harbor-42";

fn create_test_app(mock_server: &MockServer) -> Router {
    auth_routes(TestConfig::with_mock_server(&mock_server.uri()).to_arc())
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn registration_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "confirm_password": PASSWORD,
        "first_name": "jane",
        "last_name": "DOE",
        "phone_number": "+14045551234",
        "date_of_birth": "17-05-1990",
        "gender": "Female",
        "address": "12 Main Street",
        "city": "atlanta",
        "state": "ga",
        "country": "us",
        "residential_zipcode": "30301",
        "preferred_communication": "email",
        "languages_spoken": ["English"]
    })
}

async fn mount_user_by_email(mock_server: &MockServer, email: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", format!("eq.{}", email)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

async fn mount_user_by_id(mock_server: &MockServer, user_id: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_register_patient_success() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");

    mount_user_by_email(&mock_server, "jane@example.com", json!([])).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("select", "username"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "username": "jane" }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({
            "email": "jane@example.com",
            "username": "jane1",
            "user_type": "patient",
            "state": "Ga",
            "gender": "female",
            "date_of_birth": "1990-05-17"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::user_row(&user, "hash")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request("POST", "/patients/register", None, registration_body("Jane@Example.com")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["user"]["first_name"], "Jane");
    assert_eq!(body["user"]["user_type"], "patient");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let mock_server = MockServer::start().await;
    let existing = TestUser::patient("jane@example.com");

    mount_user_by_email(
        &mock_server,
        "jane@example.com",
        json!([MockSupabaseResponses::user_row(&existing, "hash")]),
    )
    .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request("POST", "/patients/register", None, registration_body("jane@example.com")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_rejects_mismatched_passwords() {
    let mock_server = MockServer::start().await;
    let mut body = registration_body("jane@example.com");
    body["confirm_password"] = json!("Something-Else-9");

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request("POST", "/patients/register", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Password and confirm password does not match");
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let mock_server = MockServer::start().await;
    let mut body = registration_body("jane@example.com");
    body["password"] = json!("12345");
    body["confirm_password"] = json!("12345");

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request("POST", "/patients/register", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patient_login_issues_token() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");
    let hash = PasswordService::hash_password(PASSWORD).unwrap();

    mount_user_by_email(&mock_server, "jane@example.com", json!([MockSupabaseResponses::user_row(&user, &hash)])).await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request(
            "POST",
            "/patients/login",
            None,
            json!({ "email": "JANE@example.com", "password": PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let token = body["token"].as_str().unwrap();

    let claims = validate_token(token, TEST_JWT_SECRET).unwrap();
    assert_eq!(claims.id, user.id);
    assert!(claims.is_patient());
    assert_eq!(body["user"]["last_name"], "Doe");
}

#[tokio::test]
async fn test_provider_cannot_use_patient_login() {
    let mock_server = MockServer::start().await;
    let provider = TestUser::provider("dr.smith@example.com");
    let hash = PasswordService::hash_password(PASSWORD).unwrap();

    mount_user_by_email(&mock_server, "dr.smith@example.com", json!([MockSupabaseResponses::user_row(&provider, &hash)])).await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request(
            "POST",
            "/patients/login",
            None,
            json!({ "email": "dr.smith@example.com", "password": PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["error"], "User not authorized to login");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");
    let hash = PasswordService::hash_password(PASSWORD).unwrap();

    mount_user_by_email(&mock_server, "jane@example.com", json!([MockSupabaseResponses::user_row(&user, &hash)])).await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request(
            "POST",
            "/patients/login",
            None,
            json!({ "email": "jane@example.com", "password": "not-the-password" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_unknown_email() {
    let mock_server = MockServer::start().await;
    mount_user_by_email(&mock_server, "ghost@example.com", json!([])).await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request(
            "POST",
            "/providers/login",
            None,
            json!({ "email": "ghost@example.com", "password": PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_requires_token() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(&mock_server);

    let request = Request::builder().method("GET").uri("/me").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_profile_decrypts_fields() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));

    mount_user_by_id(&mock_server, &user.id, json!([MockSupabaseResponses::user_row(&user, "hash")])).await;

    let app = create_test_app(&mock_server);
    let request = Request::builder()
        .method("GET")
        .uri("/me")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["city"], "Atlanta");
    assert_eq!(body["address"], "12 main street");
}

#[tokio::test]
async fn test_change_password_to_same_value_is_rejected() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));
    let hash = PasswordService::hash_password(PASSWORD).unwrap();

    mount_user_by_id(&mock_server, &user.id, json!([MockSupabaseResponses::user_row(&user, &hash)])).await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request(
            "POST",
            "/password/change",
            Some(&token),
            json!({
                "existing_password": PASSWORD,
                "new_password": PASSWORD,
                "confirm_password": PASSWORD
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["error"],
        "New password is the same with existing password"
    );
}

#[tokio::test]
async fn test_forgot_password_unknown_email() {
    let mock_server = MockServer::start().await;
    mount_user_by_email(&mock_server, "ghost@example.com", json!([])).await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request("POST", "/password/forgot", None, json!({ "email": "ghost@example.com" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forgot_password_issues_code_and_emails_it() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");

    mount_user_by_email(&mock_server, "jane@example.com", json!([MockSupabaseResponses::user_row(&user, "hash")])).await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/password_resets"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/password_resets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/password_resets"))
        .and(body_partial_json(json!({ "user_id": user.id })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request("POST", "/password/forgot", None, json!({ "email": "jane@example.com" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn test_reset_password_with_expired_code() {
    let mock_server = MockServer::start().await;
    let issued = Utc::now() - Duration::hours(5);

    Mock::given(method("GET"))
        .and(path("/rest/v1/password_resets"))
        .and(query_param("token", "eq.482913"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "reset-1",
            "user_id": "user-1",
            "token": "482913",
            "created_at": issued
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/password_resets"))
        .and(query_param("id", "eq.reset-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request(
            "POST",
            "/password/reset",
            None,
            json!({ "token": "482913", "password": PASSWORD, "confirm_password": PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_password_stores_new_hash() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/password_resets"))
        .and(query_param("token", "eq.482913"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "reset-1",
            "user_id": user.id,
            "token": "482913",
            "created_at": Utc::now() - Duration::hours(1)
        }])))
        .mount(&mock_server)
        .await;

    mount_user_by_id(&mock_server, &user.id, json!([MockSupabaseResponses::user_row(&user, "old-hash")])).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/password_resets"))
        .and(query_param("id", "eq.reset-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request(
            "POST",
            "/password/reset",
            None,
            json!({ "token": "482913", "password": PASSWORD, "confirm_password": PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let requests = mock_server.received_requests().await.unwrap();
    let update = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH" && r.url.path() == "/rest/v1/users")
        .unwrap();
    let body: Value = serde_json::from_slice(&update.body).unwrap();
    let stored = body["password_hash"].as_str().unwrap();
    assert!(PasswordService::verify_password(PASSWORD, stored));
}

#[tokio::test]
async fn test_reset_password_unknown_code() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/password_resets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request(
            "POST",
            "/password/reset",
            None,
            json!({ "token": "000000", "password": PASSWORD, "confirm_password": PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "Invalid Token entered");
}

#[tokio::test]
async fn test_confirm_email_marks_user_verified() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/email_verifications"))
        .and(query_param("token", "eq.735201"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "ev-1",
            "user_id": user.id,
            "token": "735201",
            "sent": true,
            "is_verified": false,
            "created_at": Utc::now() - Duration::minutes(2)
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/email_verifications"))
        .and(body_partial_json(json!({ "is_verified": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut verified_row = MockSupabaseResponses::user_row(&user, "hash");
    verified_row["email_verified"] = json!(true);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({ "email_verified": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([verified_row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request("POST", "/email/confirm", Some(&token), json!({ "token": "735201" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_confirm_email_with_stale_code() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/email_verifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "ev-1",
            "user_id": user.id,
            "token": "735201",
            "sent": true,
            "is_verified": false,
            "created_at": Utc::now() - Duration::minutes(30)
        }])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request("POST", "/email/confirm", Some(&token), json!({ "token": "735201" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "Token has expired, request a new one");
}

#[tokio::test]
async fn test_send_phone_code_texts_new_number() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));

    mount_user_by_id(&mock_server, &user.id, json!([MockSupabaseResponses::user_row(&user, "hash")])).await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/phone_verifications"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/phone_verifications"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/phone_verifications"))
        .and(body_partial_json(json!({
            "user_id": user.id,
            "phone_number": "+14045559876",
            "sent": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": "pv-1",
            "user_id": user.id,
            "phone_number": "+14045559876",
            "token": "318274",
            "sent": false,
            "is_verified": false,
            "created_at": Utc::now()
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC-test/Messages.json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sid": "SM-1", "status": "queued" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/phone_verifications"))
        .and(query_param("id", "eq.pv-1"))
        .and(body_partial_json(json!({ "sent": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request(
            "POST",
            "/phone/send-otp",
            Some(&token),
            json!({ "phone_number": "+14045559876" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["message"], "Verification code sent to your phone");
}

#[tokio::test]
async fn test_confirm_phone_stores_verified_number() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/phone_verifications"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .and(query_param("token", "eq.318274"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "pv-1",
            "user_id": user.id,
            "phone_number": "+14045559876",
            "token": "318274",
            "sent": true,
            "is_verified": false,
            "created_at": Utc::now() - Duration::minutes(3)
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/phone_verifications"))
        .and(body_partial_json(json!({ "is_verified": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut verified_row = MockSupabaseResponses::user_row(&user, "hash");
    verified_row["phone_verified"] = json!(true);
    verified_row["phone_number"] = json!("+14045559876");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({ "phone_verified": true, "phone_number": "+14045559876" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([verified_row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(json_request("POST", "/phone/confirm", Some(&token), json!({ "token": "318274" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["message"], "Phone number verified");
}

#[tokio::test]
async fn test_validate_route_without_header_is_rejected() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(&mock_server);

    let request = Request::builder().method("POST").uri("/validate").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
