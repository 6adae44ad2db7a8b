use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::{ROLE_HEALTH_PROVIDER, ROLE_PATIENT};
use shared_models::error::AppError;
use shared_utils::crypto::CryptoError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Patient,
    HealthProvider,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Patient => ROLE_PATIENT,
            UserType::HealthProvider => ROLE_HEALTH_PROVIDER,
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of the `users` table. Name, address and city columns hold ciphertext.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub residential_zipcode: Option<String>,
    pub preferred_communication: Option<String>,
    #[serde(default)]
    pub languages_spoken: Vec<String>,
    pub user_type: UserType,
    #[serde(default)]
    pub qualified: bool,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub phone_verified: bool,
    pub social_security_number: Option<String>,
    pub photo_url: Option<String>,
    pub date_joined: Option<DateTime<Utc>>,
}

/// Decrypted, client-facing view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub residential_zipcode: Option<String>,
    pub preferred_communication: Option<String>,
    pub languages_spoken: Vec<String>,
    pub user_type: UserType,
    pub qualified: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub photo_url: Option<String>,
    pub date_joined: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Fields shared by patient registration and provider onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    /// `DD-MM-YYYY`
    pub date_of_birth: String,
    pub gender: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub residential_zipcode: Option<String>,
    pub preferred_communication: Option<String>,
    #[serde(default)]
    pub languages_spoken: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub residential_zipcode: Option<String>,
    pub preferred_communication: Option<String>,
    pub languages_spoken: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub existing_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmCodeRequest {
    pub token: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PhoneCodeRequest {
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailVerificationRecord {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub sent: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneVerificationRecord {
    pub id: String,
    pub user_id: String,
    pub phone_number: String,
    pub token: String,
    pub sent: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRecord {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("User with this email does not exist")]
    UserNotFound,

    #[error("A user with this email already exists")]
    EmailTaken,

    #[error("User not authorized to login")]
    WrongUserType,

    #[error("Invalid password")]
    InvalidCredentials,

    #[error("Invalid password entered")]
    WrongExistingPassword,

    #[error("Password and confirm password does not match")]
    PasswordMismatch,

    #[error("New password is the same with existing password")]
    PasswordUnchanged,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Invalid Token entered")]
    InvalidCode,

    #[error("Token has expired, request a new one")]
    CodeExpired,

    #[error("{0} has already been verified")]
    AlreadyVerified(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        AccountError::Database(err.to_string())
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::UserNotFound => AppError::NotFound(err.to_string()),
            AccountError::EmailTaken => AppError::Conflict(err.to_string()),
            AccountError::WrongUserType => AppError::Forbidden(err.to_string()),
            AccountError::InvalidCredentials => AppError::Auth(err.to_string()),
            AccountError::WrongExistingPassword
            | AccountError::PasswordMismatch
            | AccountError::PasswordUnchanged
            | AccountError::InvalidCode
            | AccountError::CodeExpired
            | AccountError::AlreadyVerified(_) => AppError::BadRequest(err.to_string()),
            AccountError::WeakPassword(msg) | AccountError::Validation(msg) => AppError::ValidationError(msg),
            AccountError::Crypto(_) | AccountError::Token(_) => AppError::Internal(err.to_string()),
            AccountError::Database(msg) => AppError::Database(msg),
        }
    }
}
