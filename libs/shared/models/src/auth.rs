use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ROLE_PATIENT: &str = "patient";
pub const ROLE_HEALTH_PROVIDER: &str = "health_provider";

pub const TOKEN_USE_ACCESS: &str = "access";
pub const TOKEN_USE_ACTION: &str = "action";

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub token_use: String,
    pub exp: u64,
    pub email: Option<String>,
    pub role: Option<String>,
    pub iat: Option<u64>,
}

/// Claims carried by the signed links in booking emails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionClaims {
    pub sub: String,
    pub token_use: String,
    pub action: String,
    pub booking_id: String,
    pub exp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_patient(&self) -> bool {
        self.role.as_deref() == Some(ROLE_PATIENT)
    }

    pub fn is_health_provider(&self) -> bool {
        self.role.as_deref() == Some(ROLE_HEALTH_PROVIDER)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}
