use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::{EmailClient, EmailMessage, NotificationError, Notifier, SmsClient};
use shared_utils::test_utils::TestConfig;

#[tokio::test]
async fn email_is_posted_to_sendgrid() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("Authorization", "Bearer test-sendgrid-key"))
        .and(body_partial_json(json!({
            "personalizations": [{
                "to": [{ "email": "patient@example.com" }],
                "bcc": [{ "email": "provider@example.com" }]
            }],
            "from": { "email": "noreply@example.com" },
            "subject": "Booking accepted",
            "content": [{ "type": "text/plain", "value": "See you soon" }]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = EmailClient::new(&config).unwrap();
    let message = EmailMessage::new("patient@example.com", "Booking accepted", "See you soon")
        .with_bcc("provider@example.com");

    client.send(&message).await.unwrap();
}

#[tokio::test]
async fn sendgrid_rejection_is_an_error() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{ "message": "The provided authorization grant is invalid" }]
        })))
        .mount(&mock_server)
        .await;

    let client = EmailClient::new(&config).unwrap();
    let result = client
        .send(&EmailMessage::new("a@example.com", "Hello", "Body"))
        .await;

    assert_matches!(result, Err(NotificationError::Email(_)));
}

#[tokio::test]
async fn sms_is_posted_to_twilio() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC-test/Messages.json"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("To=%2B14045551234"))
        .and(body_string_contains("Body=Your+code+is+123456"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sid": "SM123",
            "status": "queued"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SmsClient::new(&config).unwrap();
    let message = client.send_sms("+14045551234", "Your code is 123456").await.unwrap();

    assert_eq!(message.sid, "SM123");
}

#[tokio::test]
async fn unconfigured_channel_is_reported() {
    let mut config = TestConfig::default().to_app_config();
    config.sendgrid_api_key.clear();

    assert_matches!(EmailClient::new(&config), Err(NotificationError::NotConfigured("email")));
}

#[tokio::test]
async fn notifier_swallows_delivery_failures() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let notifier = Notifier::new(&config);
    let delivered = notifier
        .email(EmailMessage::new("a@example.com", "Hello", "Body"))
        .await;

    assert!(!delivered);
}
