use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, ROLE_HEALTH_PROVIDER, ROLE_PATIENT, TOKEN_USE_ACCESS};

use crate::crypto::FieldCipher;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub external_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            external_base_url: "http://localhost:54322".to_string(),
        }
    }
}

impl TestConfig {
    /// Points PostgREST and every third-party API at one mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            external_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn field_encryption_key() -> String {
        general_purpose::STANDARD.encode([7u8; 32])
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            port: 3000,
            public_base_url: "http://localhost:3000".to_string(),
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            access_token_lifetime_hours: 48,
            field_encryption_key: Self::field_encryption_key(),
            otp_expiry_minutes: 10,
            password_reset_expiry_hours: 4,
            slot_minutes: 30,
            sendgrid_api_key: "test-sendgrid-key".to_string(),
            sendgrid_base_url: self.external_base_url.clone(),
            default_from_email: "noreply@example.com".to_string(),
            twilio_account_sid: "AC-test".to_string(),
            twilio_auth_token: "twilio-token".to_string(),
            twilio_number: "+15550000000".to_string(),
            twilio_base_url: self.external_base_url.clone(),
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_base_url: self.external_base_url.clone(),
            pverify_client_id: "pverify-client".to_string(),
            pverify_client_secret: "pverify-secret".to_string(),
            pverify_base_url: format!("{}/", self.external_base_url.trim_end_matches('/')),
            zip_code_api_key: "zip-key".to_string(),
            zip_code_api_base_url: format!("{}/", self.external_base_url.trim_end_matches('/')),
            zip_code_radius_miles: 15,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn provider(email: &str) -> Self {
        Self::new(email, ROLE_HEALTH_PROVIDER)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, ROLE_PATIENT)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "token_use": TOKEN_USE_ACCESS,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row fixtures shaped like the PostgREST tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn cipher() -> FieldCipher {
        FieldCipher::new(&TestConfig::field_encryption_key()).expect("test key is valid")
    }

    pub fn user_row(user: &TestUser, password_hash: &str) -> Value {
        let cipher = Self::cipher();
        let username = user.email.split('@').next().unwrap_or_default();

        json!({
            "id": user.id,
            "email": user.email,
            "username": username,
            "password_hash": password_hash,
            "first_name": cipher.encrypt("Jane").unwrap(),
            "last_name": cipher.encrypt("Doe").unwrap(),
            "address": cipher.encrypt("12 main street").unwrap(),
            "city": cipher.encrypt("Atlanta").unwrap(),
            "phone_number": "+14045551234",
            "date_of_birth": "1990-05-17",
            "gender": "female",
            "state": "GA",
            "country": "US",
            "residential_zipcode": "30301",
            "preferred_communication": "email",
            "languages_spoken": ["English"],
            "user_type": user.role,
            "qualified": false,
            "email_verified": false,
            "phone_verified": false,
            "social_security_number": null,
            "photo_url": null,
            "date_joined": "2026-01-05T10:00:00Z"
        })
    }

    pub fn criteria_row(provider_id: &str, minimum_age: i32, maximum_age: i32, zip_codes: &[&str]) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "user_id": provider_id,
            "practice_name": "Peachtree Family Practice",
            "max_distance": 15,
            "preferred_zip_codes": zip_codes,
            "available_days": [],
            "age_range": "Adult",
            "minimum_age": minimum_age,
            "maximum_age": maximum_age,
            "price_per_consultation": 150.0
        })
    }

    pub fn booking_row(booking_id: &str, patient_id: &str, practitioner_id: Option<&str>, status: &str) -> Value {
        json!({
            "id": booking_id,
            "patient_id": patient_id,
            "practitioner_id": practitioner_id,
            "symptom": "Persistent cough",
            "date_care_is_needed": "2030-03-04",
            "age_of_patient": 34,
            "zipcode": "30301",
            "status": status,
            "date_time_of_care": if practitioner_id.is_some() { json!("2030-03-04T09:00:00Z") } else { Value::Null },
            "reason": null,
            "eta": null,
            "created_at": "2026-02-01T08:00:00Z",
            "updated_at": "2026-02-01T08:00:00Z"
        })
    }
}
