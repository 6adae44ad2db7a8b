use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use auth_cell::models::AccountError;
use shared_models::error::AppError;

// ==============================================================================
// ROWS AND REQUESTS
// ==============================================================================

/// A tokenized card. Only display fields and Stripe ids are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCard {
    pub id: String,
    pub user_id: String,
    pub cardholder_name: String,
    pub last4_digit: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub card_type: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub billing_address: String,
    pub setup_id: String,
    pub payment_method_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveCardRequest {
    pub cardholder_name: String,
    pub card_number: String,
    pub card_type: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    /// `MM/YYYY`
    pub card_expiry_date: String,
    pub cvc: String,
    pub billing_address: String,
}

// ==============================================================================
// STRIPE WIRE TYPES
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCard {
    pub brand: Option<String>,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentMethod {
    pub id: String,
    pub customer: Option<String>,
    pub card: Option<StripeCard>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSetupIntent {
    pub id: String,
    pub status: String,
    pub customer: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid card: {0}")]
    InvalidCard(String),

    #[error("Card not found")]
    CardNotFound,

    #[error("CardError-{0}")]
    CardError(String),

    #[error("InvalidRequestError-{0}")]
    InvalidRequest(String),

    #[error("AuthenticationError-{0}")]
    Authentication(String),

    #[error("RateLimitError-{0}")]
    RateLimit(String),

    #[error("StripeError-{0}")]
    Api(String),

    #[error("APIConnectionError-{0}")]
    Connection(String),

    #[error("Payments are not configured")]
    NotConfigured,

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Database error: {0}")]
    Database(String),
}

impl PaymentError {
    /// Maps a failed Stripe response onto the error family Stripe reports.
    pub fn from_stripe(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<StripeErrorBody>(body).ok().map(|b| b.error);
        let message = detail
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| format!("HTTP {}", status));
        let kind = detail.as_ref().and_then(|d| d.kind.as_deref());

        match (kind, status.as_u16()) {
            (Some("card_error"), _) | (_, 402) => PaymentError::CardError(message),
            (_, 401) => PaymentError::Authentication(message),
            (_, 429) => PaymentError::RateLimit(message),
            (Some("invalid_request_error"), _) | (_, 400) | (_, 404) => PaymentError::InvalidRequest(message),
            _ => PaymentError::Api(message),
        }
    }
}

impl From<anyhow::Error> for PaymentError {
    fn from(err: anyhow::Error) -> Self {
        PaymentError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Connection(err.to_string())
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidCard(_) => AppError::ValidationError(err.to_string()),
            PaymentError::CardNotFound => AppError::NotFound(err.to_string()),
            PaymentError::CardError(_) | PaymentError::InvalidRequest(_) => AppError::BadRequest(err.to_string()),
            PaymentError::Authentication(_)
            | PaymentError::RateLimit(_)
            | PaymentError::Api(_)
            | PaymentError::Connection(_) => AppError::ExternalService(err.to_string()),
            PaymentError::NotConfigured => AppError::Internal(err.to_string()),
            PaymentError::Account(inner) => inner.into(),
            PaymentError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_errors_keep_stripe_message() {
        let body = r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#;
        let err = PaymentError::from_stripe(StatusCode::PAYMENT_REQUIRED, body);

        assert!(matches!(err, PaymentError::CardError(ref m) if m == "Your card was declined."));
        assert_eq!(AppError::from(err).status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn status_decides_without_body() {
        assert!(matches!(
            PaymentError::from_stripe(StatusCode::UNAUTHORIZED, "nope"),
            PaymentError::Authentication(_)
        ));
        assert!(matches!(
            PaymentError::from_stripe(StatusCode::TOO_MANY_REQUESTS, ""),
            PaymentError::RateLimit(_)
        ));
        assert!(matches!(
            PaymentError::from_stripe(StatusCode::BAD_GATEWAY, ""),
            PaymentError::Api(_)
        ));
    }
}
