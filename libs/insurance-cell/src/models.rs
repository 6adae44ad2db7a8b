use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use auth_cell::models::AccountError;
use booking_cell::models::BookingError;
use shared_models::error::AppError;

// ==============================================================================
// ROWS AND REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsuranceDetails {
    pub id: String,
    pub user_id: String,
    pub insurance_company_name: String,
    pub insurance_phone_number: String,
    pub insurance_policy_number: String,
    pub insurance_group_number: String,
    pub insured_date_of_birth: NaiveDate,
    pub patient_relationship: String,
    pub self_pay: f64,
    pub insurance_coverage: f64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceDetailsRequest {
    pub insurance_company_name: String,
    pub insurance_phone_number: String,
    pub insurance_policy_number: String,
    pub insurance_group_number: String,
    pub insured_date_of_birth: NaiveDate,
    pub patient_relationship: String,
}

impl InsuranceDetailsRequest {
    pub fn is_subscriber_patient(&self) -> bool {
        self.patient_relationship.trim().eq_ignore_ascii_case("self")
    }
}

// ==============================================================================
// PVERIFY WIRE TYPES
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct PverifyToken {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct RequestingProvider {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "middleName")]
    pub middle_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub npi: String,
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct Subscriber {
    #[serde(rename = "firstName")]
    pub first_name: String,
    pub dob: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "memberID")]
    pub member_id: String,
}

/// Body of `api/EligibilitySummary`.
#[derive(Debug, Serialize)]
pub struct EligibilityRequest {
    #[serde(rename = "payerCode")]
    pub payer_code: String,
    #[serde(rename = "payerName")]
    pub payer_name: String,
    pub provider: RequestingProvider,
    pub subscriber: Subscriber,
    pub dependent: Option<serde_json::Value>,
    #[serde(rename = "isSubscriberPatient")]
    pub is_subscriber_patient: String,
    #[serde(rename = "doS_StartDate")]
    pub dos_start_date: String,
    #[serde(rename = "doS_EndDate")]
    pub dos_end_date: String,
    #[serde(rename = "PracticeTypeCode")]
    pub practice_type_code: String,
    #[serde(rename = "referenceId")]
    pub reference_id: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "IncludeTextResponse")]
    pub include_text_response: String,
    #[serde(rename = "InternalId")]
    pub internal_id: String,
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MoneyField {
    #[serde(rename = "Value")]
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeductibleOopSummary {
    #[serde(rename = "IndividualDeductibleRemainingInNet")]
    pub individual_deductible_remaining: Option<MoneyField>,
    #[serde(rename = "IndividualOOPRemainingInNet")]
    pub individual_oop_remaining: Option<MoneyField>,
}

#[derive(Debug, Deserialize)]
pub struct EligibilityResponse {
    #[serde(rename = "APIResponseCode")]
    pub api_response_code: Option<String>,
    #[serde(rename = "ErrorDescription")]
    pub error_description: Option<String>,
    #[serde(rename = "HBPC_Deductible_OOP_Summary")]
    pub deductible_oop_summary: Option<DeductibleOopSummary>,
}

/// Remaining in-network amounts the patient still owes this plan year.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EligibilitySummary {
    pub deductible_remaining: Option<f64>,
    pub oop_remaining: Option<f64>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum InsuranceError {
    #[error("Insurance details not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Insurance verification failed: {0}")]
    Ineligible(String),

    #[error("Insurance provider error: {0}")]
    Provider(String),

    #[error("Insurance verification is not configured")]
    NotConfigured,

    #[error(transparent)]
    Pricing(#[from] BookingError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for InsuranceError {
    fn from(err: anyhow::Error) -> Self {
        InsuranceError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for InsuranceError {
    fn from(err: reqwest::Error) -> Self {
        InsuranceError::Provider(err.to_string())
    }
}

impl From<InsuranceError> for AppError {
    fn from(err: InsuranceError) -> Self {
        match err {
            InsuranceError::NotFound => AppError::NotFound(err.to_string()),
            InsuranceError::Validation(msg) => AppError::ValidationError(msg),
            InsuranceError::Ineligible(_) => AppError::BadRequest(err.to_string()),
            InsuranceError::Provider(msg) => AppError::ExternalService(msg),
            InsuranceError::NotConfigured => AppError::Internal(err.to_string()),
            InsuranceError::Pricing(inner) => inner.into(),
            InsuranceError::Account(inner) => inner.into(),
            InsuranceError::Database(msg) => AppError::Database(msg),
        }
    }
}
