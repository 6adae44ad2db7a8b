use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use auth_cell::models::{AccountError, RegistrationRequest, UpdateProfileRequest};
use shared_models::error::AppError;
use shared_utils::crypto::CryptoError;

// ==============================================================================
// PRACTICE CRITERIA
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AgeRange {
    Pediatrics,
    Adult,
    Both,
}

impl AgeRange {
    /// Case-insensitive parse of the three accepted choices.
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        match raw.trim().to_lowercase().as_str() {
            "pediatrics" => Ok(AgeRange::Pediatrics),
            "adult" => Ok(AgeRange::Adult),
            "both" => Ok(AgeRange::Both),
            _ => Err(ProviderError::InvalidAgeRange(raw.trim().to_string())),
        }
    }

    /// Inclusive `(minimum_age, maximum_age)` served.
    pub fn bounds(&self) -> (i32, i32) {
        match self {
            AgeRange::Pediatrics => (0, 18),
            AgeRange::Adult => (18, 100),
            AgeRange::Both => (0, 100),
        }
    }
}

impl fmt::Display for AgeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeRange::Pediatrics => write!(f, "Pediatrics"),
            AgeRange::Adult => write!(f, "Adult"),
            AgeRange::Both => write!(f, "Both"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderQualification {
    pub id: String,
    pub user_id: String,
    pub practitioner_type: String,
    pub credential_title: String,
    pub npi: String,
    pub caqh: Option<String>,
    #[serde(default)]
    pub licensed_states: Vec<String>,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PracticeCriteria {
    pub id: String,
    pub user_id: String,
    pub practice_name: Option<String>,
    pub max_distance: Option<i32>,
    #[serde(default)]
    pub preferred_zip_codes: Vec<String>,
    #[serde(default)]
    pub available_days: Vec<String>,
    pub age_range: AgeRange,
    pub minimum_age: i32,
    pub maximum_age: i32,
    pub price_per_consultation: Option<f64>,
}

impl PracticeCriteria {
    pub fn serves_age(&self, age: i32) -> bool {
        self.minimum_age <= age && age <= self.maximum_age
    }

    pub fn serves_any_zip(&self, zip_codes: &[String]) -> bool {
        self.preferred_zip_codes.iter().any(|zip| zip_codes.contains(zip))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableSlot {
    pub id: String,
    pub criteria_id: String,
    pub provider_id: String,
    pub available_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountDetails {
    pub id: String,
    pub user_id: String,
    pub bank_name: String,
    pub account_number: String,
    pub routing_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    #[serde(rename = "type")]
    pub referral_type: String,
    pub reference_code: String,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardProviderRequest {
    #[serde(flatten)]
    pub account: RegistrationRequest,
    pub social_security_number: Option<String>,
    pub practitioner_type: String,
    pub credential_title: String,
    pub npi: String,
    pub caqh: Option<String>,
    #[serde(default)]
    pub licensed_states: Vec<String>,
    pub practice_name: Option<String>,
    pub max_distance: Option<i32>,
    #[serde(default)]
    pub preferred_zip_codes: Vec<String>,
    /// Single instants or `start/end` windows.
    #[serde(default)]
    pub available_days: Vec<String>,
    pub age_range: String,
    pub price_per_consultation: Option<f64>,
    pub referral_code: Option<String>,
    /// Base64 data URL, e.g. `data:image/png;base64,...`
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailabilityRequest {
    pub available_days: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EditProviderRequest {
    #[serde(flatten)]
    pub profile: UpdateProfileRequest,
    pub practice_name: Option<String>,
    pub max_distance: Option<i32>,
    pub preferred_zip_codes: Option<Vec<String>>,
    pub age_range: Option<String>,
    pub price_per_consultation: Option<f64>,
    pub practitioner_type: Option<String>,
    pub credential_title: Option<String>,
    pub npi: Option<String>,
    pub caqh: Option<String>,
    pub licensed_states: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAccountDetailsRequest {
    pub bank_name: String,
    pub account_number: String,
    pub routing_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDetailsQuery {
    pub email: String,
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSummary {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    pub languages_spoken: Vec<String>,
    pub practitioner_type: Option<String>,
    pub credential_title: Option<String>,
    pub licensed_states: Vec<String>,
    pub practice_name: Option<String>,
    pub age_range: Option<AgeRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDetails {
    #[serde(flatten)]
    pub summary: ProviderSummary,
    pub phone_number: Option<String>,
    pub state: Option<String>,
    pub criteria: Option<PracticeCriteria>,
    pub qualification: Option<ProviderQualification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDetailsResponse {
    pub id: String,
    pub bank_name: String,
    /// Only the last four digits.
    pub account_number: String,
    pub routing_number: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Health provider not found")]
    NotFound,

    #[error("you entered {0}, age range choices are Pediatrics, Adult and Both")]
    InvalidAgeRange(String),

    #[error("Invalid referral code")]
    InvalidReferralCode,

    #[error("Invalid availability entry '{0}'")]
    InvalidAvailability(String),

    #[error("Invalid photo: {0}")]
    InvalidPhoto(String),

    #[error("{0} not found, reach out to support")]
    MissingProfile(&'static str),

    #[error("Only health providers can perform this action")]
    NotAProvider,

    #[error("Account details already exist")]
    AccountDetailsExist,

    #[error("{0}")]
    Validation(String),

    #[error("Zip code lookup failed: {0}")]
    Proximity(String),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        ProviderError::Database(err.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound => AppError::NotFound(err.to_string()),
            ProviderError::InvalidAgeRange(_)
            | ProviderError::InvalidReferralCode
            | ProviderError::InvalidAvailability(_)
            | ProviderError::InvalidPhoto(_)
            | ProviderError::MissingProfile(_) => AppError::BadRequest(err.to_string()),
            ProviderError::NotAProvider => AppError::Forbidden(err.to_string()),
            ProviderError::AccountDetailsExist => AppError::Conflict(err.to_string()),
            ProviderError::Validation(msg) => AppError::ValidationError(msg),
            ProviderError::Proximity(msg) => AppError::ExternalService(msg),
            ProviderError::Account(inner) => inner.into(),
            ProviderError::Crypto(_) => AppError::Internal(err.to_string()),
            ProviderError::Database(msg) => AppError::Database(msg),
        }
    }
}
