use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::crypto::FieldCipher;

use crate::models::{AccountError, UserProfile, UserRecord, UserType};

const USERS: &str = "/rest/v1/users";

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?1?\d{9,15}$").expect("valid phone pattern"))
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email pattern")
    })
}

pub fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    if !email_regex().is_match(&email) {
        return Err(AccountError::Validation("Enter a valid email address.".to_string()));
    }
    Ok(email)
}

pub fn validate_phone(phone_number: &str) -> Result<String, AccountError> {
    let phone_number = phone_number.trim();
    if !phone_regex().is_match(phone_number) {
        return Err(AccountError::Validation(
            "Phone number must be entered in the format: '+999999999'. Up to 15 digits allowed.".to_string(),
        ));
    }
    Ok(phone_number.to_string())
}

pub fn parse_date_of_birth(raw: &str) -> Result<NaiveDate, AccountError> {
    NaiveDate::parse_from_str(raw.trim(), "%d-%m-%Y").map_err(|_| {
        AccountError::Validation(format!(
            "date_of_birth '{}' does not match format DD-MM-YYYY",
            raw
        ))
    })
}

/// First letter upper-cased, the rest lower-cased.
pub fn capitalize(value: &str) -> String {
    let value = value.trim();
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Picks `base`, or `base` followed by the smallest counter not already taken.
pub fn next_username(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|name| name == base) {
        return base.to_string();
    }

    (1..)
        .map(|counter| format!("{}{}", base, counter))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

pub(crate) fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Access to the `users` table plus decryption of PII columns.
pub struct UserDirectory {
    supabase: SupabaseClient,
    cipher: FieldCipher,
}

impl UserDirectory {
    pub fn new(config: &AppConfig) -> Result<Self, AccountError> {
        Ok(Self {
            supabase: SupabaseClient::new(config),
            cipher: FieldCipher::new(&config.field_encryption_key)?,
        })
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    async fn find_one(&self, filter: &str) -> Result<Option<UserRecord>, AccountError> {
        let path = format!("{}?{}&limit=1", USERS, filter);
        let mut rows: Vec<UserRecord> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.pop())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AccountError> {
        self.find_one(&format!("email=eq.{}", encode(&email.to_lowercase()))).await
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, AccountError> {
        self.find_one(&format!("id=eq.{}", encode(user_id))).await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AccountError> {
        self.find_one(&format!("username=eq.{}", encode(username))).await
    }

    pub async fn get(&self, user_id: &str) -> Result<UserRecord, AccountError> {
        self.find_by_id(user_id).await?.ok_or(AccountError::UserNotFound)
    }

    pub async fn find_many(&self, user_ids: &[String]) -> Result<Vec<UserRecord>, AccountError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = user_ids.iter().map(|id| encode(id)).collect::<Vec<_>>().join(",");
        let path = format!("{}?id=in.({})", USERS, ids);
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    pub async fn list_by_type(&self, user_type: UserType) -> Result<Vec<UserRecord>, AccountError> {
        let path = format!("{}?user_type=eq.{}&order=date_joined.desc", USERS, user_type);
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    pub async fn unique_username(&self, email: &str) -> Result<String, AccountError> {
        let base: String = email
            .split('@')
            .next()
            .unwrap_or(email)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();

        let path = format!("{}?select=username&username=like.{}*", USERS, encode(&base));
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        let taken: Vec<String> = rows
            .iter()
            .filter_map(|row| row["username"].as_str().map(str::to_string))
            .collect();

        let username = next_username(&base, &taken);
        debug!("Derived username {} for new account", username);
        Ok(username)
    }

    pub async fn insert(&self, row: Value) -> Result<UserRecord, AccountError> {
        let mut rows: Vec<UserRecord> = self.supabase.write_returning(Method::POST, USERS, row).await?;
        rows.pop()
            .ok_or_else(|| AccountError::Database("Insert returned no user".to_string()))
    }

    pub async fn update(&self, user_id: &str, changes: Map<String, Value>) -> Result<UserRecord, AccountError> {
        let path = format!("{}?id=eq.{}", USERS, encode(user_id));
        let mut rows: Vec<UserRecord> = self
            .supabase
            .write_returning(Method::PATCH, &path, Value::Object(changes))
            .await?;
        rows.pop().ok_or(AccountError::UserNotFound)
    }

    pub async fn set_password_hash(&self, user_id: &str, password_hash: &str) -> Result<(), AccountError> {
        let path = format!("{}?id=eq.{}", USERS, encode(user_id));
        self.supabase
            .execute(Method::PATCH, &path, Some(json!({ "password_hash": password_hash })))
            .await?;
        Ok(())
    }

    /// Marks the account as able to book (verified insurance or a saved card).
    pub async fn mark_qualified(&self, user_id: &str) -> Result<(), AccountError> {
        let path = format!("{}?id=eq.{}", USERS, encode(user_id));
        self.supabase
            .execute(Method::PATCH, &path, Some(json!({ "qualified": true })))
            .await?;
        Ok(())
    }

    pub fn to_profile(&self, record: &UserRecord) -> Result<UserProfile, AccountError> {
        Ok(UserProfile {
            id: record.id.clone(),
            email: record.email.clone(),
            username: record.username.clone(),
            first_name: self.cipher.decrypt_opt(record.first_name.as_deref())?,
            last_name: self.cipher.decrypt_opt(record.last_name.as_deref())?,
            address: self.cipher.decrypt_opt(record.address.as_deref())?,
            city: self.cipher.decrypt_opt(record.city.as_deref())?,
            phone_number: record.phone_number.clone(),
            date_of_birth: record.date_of_birth,
            gender: record.gender.clone(),
            state: record.state.clone(),
            country: record.country.clone(),
            residential_zipcode: record.residential_zipcode.clone(),
            preferred_communication: record.preferred_communication.clone(),
            languages_spoken: record.languages_spoken.clone(),
            user_type: record.user_type,
            qualified: record.qualified,
            email_verified: record.email_verified,
            phone_verified: record.phone_verified,
            photo_url: record.photo_url.clone(),
            date_joined: record.date_joined,
        })
    }
}
