use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use shared_config::AppConfig;
use shared_utils::jwt::issue_token;

use crate::models::{
    AccountError, ChangePasswordRequest, LoginResponse, RegistrationRequest, UpdateProfileRequest,
    UserProfile, UserRecord, UserType,
};
use crate::services::directory::{
    capitalize, normalize_email, parse_date_of_birth, validate_phone, UserDirectory,
};
use crate::services::password::{PasswordPolicy, PasswordService};

pub struct AccountService {
    directory: UserDirectory,
    jwt_secret: String,
    token_lifetime_hours: i64,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Result<Self, AccountError> {
        Ok(Self {
            directory: UserDirectory::new(config)?,
            jwt_secret: config.jwt_secret.clone(),
            token_lifetime_hours: config.access_token_lifetime_hours,
        })
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    #[instrument(skip(self, request))]
    pub async fn register_patient(&self, request: RegistrationRequest) -> Result<UserProfile, AccountError> {
        let record = self.create_account(&request, UserType::Patient, Map::new()).await?;
        info!("Registered patient {}", record.id);
        self.directory.to_profile(&record)
    }

    /// Validates the shared registration fields and inserts the `users` row.
    /// `extra` carries columns specific to the account type.
    pub async fn create_account(
        &self,
        request: &RegistrationRequest,
        user_type: UserType,
        extra: Map<String, Value>,
    ) -> Result<UserRecord, AccountError> {
        if request.password != request.confirm_password {
            return Err(AccountError::PasswordMismatch);
        }

        let email = normalize_email(&request.email)?;
        let phone_number = validate_phone(&request.phone_number)?;
        let date_of_birth = parse_date_of_birth(&request.date_of_birth)?;

        let first_name = capitalize(&request.first_name);
        let last_name = capitalize(&request.last_name);
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AccountError::Validation("first_name and last_name are required".to_string()));
        }

        PasswordPolicy::new(&email)
            .with_attribute(&first_name)
            .with_attribute(&last_name)
            .validate(&request.password)?;

        if self.directory.find_by_email(&email).await?.is_some() {
            warn!("Registration attempted with existing email");
            return Err(AccountError::EmailTaken);
        }

        let cipher = self.directory.cipher();
        let username = self.directory.unique_username(&email).await?;
        let password_hash = PasswordService::hash_password(&request.password)?;

        let mut row = json!({
            "email": email,
            "username": username,
            "password_hash": password_hash,
            "first_name": cipher.encrypt(&first_name)?,
            "last_name": cipher.encrypt(&last_name)?,
            "address": cipher.encrypt(&request.address.trim().to_lowercase())?,
            "city": cipher.encrypt(&capitalize(&request.city))?,
            "phone_number": phone_number,
            "date_of_birth": date_of_birth,
            "gender": request.gender.trim().to_lowercase(),
            "state": capitalize(&request.state),
            "country": capitalize(&request.country),
            "residential_zipcode": non_empty(&request.residential_zipcode),
            "preferred_communication": non_empty(&request.preferred_communication).map(capitalize),
            "languages_spoken": request.languages_spoken,
            "user_type": user_type,
            "qualified": false,
            "email_verified": false,
            "phone_verified": false,
            "date_joined": Utc::now(),
        });

        if let Value::Object(columns) = &mut row {
            columns.extend(extra);
        }

        self.directory.insert(row).await
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str, expected: UserType) -> Result<LoginResponse, AccountError> {
        let record = self
            .directory
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(AccountError::UserNotFound)?;

        if record.user_type != expected {
            warn!("{} account attempted {} login", record.user_type, expected);
            return Err(AccountError::WrongUserType);
        }

        if !PasswordService::verify_password(password, &record.password_hash) {
            return Err(AccountError::InvalidCredentials);
        }

        let token = issue_token(
            &record.id,
            &record.email,
            record.user_type.as_str(),
            &self.jwt_secret,
            self.token_lifetime_hours,
        )
        .map_err(AccountError::Token)?;

        info!("User {} logged in", record.id);
        Ok(LoginResponse {
            user: self.directory.to_profile(&record)?,
            token,
        })
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<UserProfile, AccountError> {
        let record = self.directory.get(user_id).await?;
        self.directory.to_profile(&record)
    }

    /// Applies only the fields that are present and non-blank.
    pub async fn update_profile(&self, user_id: &str, request: UpdateProfileRequest) -> Result<UserProfile, AccountError> {
        debug!("Updating profile for user {}", user_id);
        let changes = self.profile_changes(&request)?;

        if changes.is_empty() {
            return self.get_profile(user_id).await;
        }

        let record = self.directory.update(user_id, changes).await?;
        self.directory.to_profile(&record)
    }

    pub fn profile_changes(&self, request: &UpdateProfileRequest) -> Result<Map<String, Value>, AccountError> {
        let cipher = self.directory.cipher();
        let mut changes = Map::new();

        if let Some(v) = non_empty(&request.first_name) {
            changes.insert("first_name".into(), json!(cipher.encrypt(&capitalize(v))?));
        }
        if let Some(v) = non_empty(&request.last_name) {
            changes.insert("last_name".into(), json!(cipher.encrypt(&capitalize(v))?));
        }
        if let Some(v) = non_empty(&request.address) {
            changes.insert("address".into(), json!(cipher.encrypt(&v.to_lowercase())?));
        }
        if let Some(v) = non_empty(&request.city) {
            changes.insert("city".into(), json!(cipher.encrypt(&capitalize(v))?));
        }
        if let Some(v) = non_empty(&request.phone_number) {
            changes.insert("phone_number".into(), json!(validate_phone(v)?));
            changes.insert("phone_verified".into(), json!(false));
        }
        if let Some(v) = non_empty(&request.gender) {
            changes.insert("gender".into(), json!(v.to_lowercase()));
        }
        if let Some(v) = non_empty(&request.state) {
            changes.insert("state".into(), json!(capitalize(v)));
        }
        if let Some(v) = non_empty(&request.country) {
            changes.insert("country".into(), json!(capitalize(v)));
        }
        if let Some(v) = non_empty(&request.residential_zipcode) {
            changes.insert("residential_zipcode".into(), json!(v));
        }
        if let Some(v) = non_empty(&request.preferred_communication) {
            changes.insert("preferred_communication".into(), json!(capitalize(v)));
        }
        if let Some(languages) = request.languages_spoken.as_ref().filter(|l| !l.is_empty()) {
            changes.insert("languages_spoken".into(), json!(languages));
        }

        Ok(changes)
    }

    #[instrument(skip(self, request))]
    pub async fn change_password(&self, user_id: &str, request: ChangePasswordRequest) -> Result<(), AccountError> {
        let record = self.directory.get(user_id).await?;

        if !PasswordService::verify_password(&request.existing_password, &record.password_hash) {
            return Err(AccountError::WrongExistingPassword);
        }
        if request.new_password != request.confirm_password {
            return Err(AccountError::PasswordMismatch);
        }
        if request.existing_password == request.new_password {
            return Err(AccountError::PasswordUnchanged);
        }

        PasswordPolicy::new(&record.email).validate(&request.new_password)?;

        let password_hash = PasswordService::hash_password(&request.new_password)?;
        self.directory.set_password_hash(&record.id, &password_hash).await?;

        info!("Password changed for user {}", record.id);
        Ok(())
    }
}
