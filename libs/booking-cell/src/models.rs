use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use auth_cell::models::AccountError;
use provider_cell::models::ProviderError;
use shared_models::error::AppError;
use shared_utils::crypto::CryptoError;

// ==============================================================================
// BOOKING STATUS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    Pending,
    Accepted,
    Rejected,
    Failed,
    Succeeded,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Requested,
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Rejected,
        BookingStatus::Failed,
        BookingStatus::Succeeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Failed => "failed",
            BookingStatus::Succeeded => "succeeded",
        }
    }

    pub fn choices() -> String {
        Self::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| BookingError::InvalidStatusFilter(raw.trim().to_string()))
    }
}

// ==============================================================================
// ROWS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub patient_id: String,
    pub practitioner_id: Option<String>,
    pub symptom: Option<String>,
    pub date_care_is_needed: Option<NaiveDate>,
    pub age_of_patient: Option<i32>,
    pub zipcode: Option<String>,
    pub status: BookingStatus,
    pub date_time_of_care: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub eta: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Slots held out of the provider's pool while a booking is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingTimeframe {
    pub id: String,
    pub booking_id: String,
    pub criteria_id: String,
    #[serde(default)]
    pub booking_timeframe: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralBookingDetails {
    pub price_per_consultation: f64,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub symptom: String,
    pub date_care_is_needed: NaiveDate,
    pub age_of_patient: i32,
    pub zipcode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeBookingRequest {
    pub practitioner_email: String,
    pub date_time_of_care: DateTime<Utc>,
    pub booking_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingIdRequest {
    pub booking_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionTokenQuery {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingRequest {
    pub booking_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleTimesRequest {
    pub booking_id: String,
    pub day_care_is_needed: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleBookingRequest {
    pub booking_id: String,
    pub date_time_care_is_needed: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

// ==============================================================================
// RESPONSES
// ==============================================================================

/// Decrypted contact card of a booking participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub photo_url: Option<String>,
}

impl Participant {
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub patient: Option<Participant>,
    pub practitioner: Option<Participant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAvailability {
    pub provider_email: String,
    pub available_date_time: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Earnings {
    pub total_booking_count: usize,
    pub total_earnings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyEarnings {
    pub year: i32,
    /// January first.
    pub monthly_earnings: Vec<f64>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("No booking found with id {0}")]
    NotFound(String),

    #[error("The booking with id {0} is not yours")]
    NotYours(String),

    #[error("You are not authorized to book a health provider")]
    ProviderCannotBook,

    #[error("Only patients can perform this action")]
    NotAPatient,

    #[error("Only health providers can perform this action")]
    NotAProvider,

    #[error("you can not pick a date less than today")]
    DateInPast,

    #[error("The booking is {from} and cannot become {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("No provider found with email {0}")]
    ProviderNotFound(String),

    #[error("The date {0} is not available")]
    SlotUnavailable(String),

    #[error("No provider assigned to booking {0}")]
    NoPractitioner(String),

    #[error("No available date time found with provider on date entered")]
    NoAvailableTimes,

    #[error("Invalid status {0}, status choices are {choices}", choices = BookingStatus::choices())]
    InvalidStatusFilter(String),

    #[error("Invalid booking link: {0}")]
    InvalidActionToken(String),

    #[error("General booking details have not been configured")]
    PricingUnavailable,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for BookingError {
    fn from(err: anyhow::Error) -> Self {
        BookingError::Database(err.to_string())
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound(_) | BookingError::ProviderNotFound(_) => AppError::NotFound(err.to_string()),
            BookingError::NotYours(_)
            | BookingError::ProviderCannotBook
            | BookingError::NotAPatient
            | BookingError::NotAProvider => AppError::Forbidden(err.to_string()),
            BookingError::DateInPast
            | BookingError::InvalidTransition { .. }
            | BookingError::SlotUnavailable(_)
            | BookingError::NoPractitioner(_)
            | BookingError::NoAvailableTimes
            | BookingError::InvalidStatusFilter(_) => AppError::BadRequest(err.to_string()),
            BookingError::InvalidActionToken(_) => AppError::Auth(err.to_string()),
            BookingError::Validation(msg) => AppError::ValidationError(msg),
            BookingError::Provider(inner) => inner.into(),
            BookingError::Account(inner) => inner.into(),
            BookingError::PricingUnavailable | BookingError::Crypto(_) => AppError::Internal(err.to_string()),
            BookingError::Database(msg) => AppError::Database(msg),
        }
    }
}
