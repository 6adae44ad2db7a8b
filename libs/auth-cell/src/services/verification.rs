use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use notification_cell::{EmailMessage, Notifier};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AccountError, EmailVerificationRecord, PasswordResetRecord, PhoneVerificationRecord,
    ResetPasswordRequest,
};
use crate::services::directory::{encode, validate_phone, UserDirectory};
use crate::services::password::{PasswordPolicy, PasswordService};

const EMAIL_VERIFICATIONS: &str = "/rest/v1/email_verifications";
const PHONE_VERIFICATIONS: &str = "/rest/v1/phone_verifications";
const PASSWORD_RESETS: &str = "/rest/v1/password_resets";

const CODE_ATTEMPTS: usize = 5;

pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now - created_at > window
}

/// Issues and confirms one-time codes for email, phone and password reset.
pub struct VerificationService {
    supabase: SupabaseClient,
    directory: UserDirectory,
    notifier: Notifier,
    otp_window: Duration,
    reset_window: Duration,
}

impl VerificationService {
    pub fn new(config: &AppConfig) -> Result<Self, AccountError> {
        Ok(Self {
            supabase: SupabaseClient::new(config),
            directory: UserDirectory::new(config)?,
            notifier: Notifier::new(config),
            otp_window: Duration::minutes(config.otp_expiry_minutes),
            reset_window: Duration::hours(config.password_reset_expiry_hours),
        })
    }

    /// Draws codes until one is not outstanding in `table`.
    async fn unique_code(&self, table: &str) -> Result<String, AccountError> {
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code();
            let path = format!("{}?select=id&token=eq.{}", table, code);
            let existing: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
            if existing.is_empty() {
                return Ok(code);
            }
            debug!("Code collision in {}, drawing again", table);
        }
        Err(AccountError::Database("Unable to allocate a unique code".to_string()))
    }

    async fn clear_for_user(&self, table: &str, user_id: &str) -> Result<(), AccountError> {
        let path = format!("{}?user_id=eq.{}", table, encode(user_id));
        self.supabase.execute(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn mark_row(&self, table: &str, row_id: &str, changes: Value) -> Result<(), AccountError> {
        let path = format!("{}?id=eq.{}", table, encode(row_id));
        self.supabase.execute(Method::PATCH, &path, Some(changes)).await?;
        Ok(())
    }

    async fn find_code<T>(&self, table: &str, filter: &str) -> Result<Option<T>, AccountError>
    where
        T: serde::de::DeserializeOwned,
    {
        let path = format!("{}?{}&limit=1", table, filter);
        let mut rows: Vec<T> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.pop())
    }

    #[instrument(skip(self))]
    pub async fn request_email_verification(&self, user_id: &str) -> Result<(), AccountError> {
        let user = self.directory.get(user_id).await?;
        if user.email_verified {
            return Err(AccountError::AlreadyVerified("Email"));
        }

        self.clear_for_user(EMAIL_VERIFICATIONS, &user.id).await?;
        let code = self.unique_code(EMAIL_VERIFICATIONS).await?;

        let mut rows: Vec<EmailVerificationRecord> = self
            .supabase
            .write_returning(
                Method::POST,
                EMAIL_VERIFICATIONS,
                json!({
                    "user_id": user.id,
                    "token": code,
                    "sent": false,
                    "is_verified": false,
                    "created_at": Utc::now(),
                }),
            )
            .await?;
        let record = rows
            .pop()
            .ok_or_else(|| AccountError::Database("Insert returned no verification".to_string()))?;

        let message = EmailMessage::new(
            &user.email,
            "Confirm your email address",
            format!(
                "Your email confirmation code is {}. It expires in {} minutes.",
                code,
                self.otp_window.num_minutes()
            ),
        );
        if self.notifier.email(message).await {
            self.mark_row(EMAIL_VERIFICATIONS, &record.id, json!({ "sent": true })).await?;
        }

        info!("Email verification issued for user {}", user.id);
        Ok(())
    }

    #[instrument(skip(self, token))]
    pub async fn confirm_email(&self, user_id: &str, token: &str) -> Result<(), AccountError> {
        let filter = format!("user_id=eq.{}&token=eq.{}", encode(user_id), encode(token.trim()));
        let record: EmailVerificationRecord = self
            .find_code(EMAIL_VERIFICATIONS, &filter)
            .await?
            .ok_or(AccountError::InvalidCode)?;

        if record.is_verified {
            return Err(AccountError::AlreadyVerified("Email"));
        }
        if is_expired(record.created_at, Utc::now(), self.otp_window) {
            return Err(AccountError::CodeExpired);
        }

        self.mark_row(EMAIL_VERIFICATIONS, &record.id, json!({ "is_verified": true })).await?;

        let mut changes = Map::new();
        changes.insert("email_verified".to_string(), json!(true));
        self.directory.update(&record.user_id, changes).await?;

        info!("Email verified for user {}", record.user_id);
        Ok(())
    }

    #[instrument(skip(self, phone_number))]
    pub async fn request_phone_verification(
        &self,
        user_id: &str,
        phone_number: Option<&str>,
    ) -> Result<(), AccountError> {
        let user = self.directory.get(user_id).await?;

        let phone_number = match phone_number.or(user.phone_number.as_deref()) {
            Some(number) => validate_phone(number)?,
            None => return Err(AccountError::Validation("phone_number is required".to_string())),
        };

        if user.phone_verified && user.phone_number.as_deref() == Some(phone_number.as_str()) {
            return Err(AccountError::AlreadyVerified("Phone number"));
        }

        self.clear_for_user(PHONE_VERIFICATIONS, &user.id).await?;
        let code = self.unique_code(PHONE_VERIFICATIONS).await?;

        let mut rows: Vec<PhoneVerificationRecord> = self
            .supabase
            .write_returning(
                Method::POST,
                PHONE_VERIFICATIONS,
                json!({
                    "user_id": user.id,
                    "phone_number": phone_number,
                    "token": code,
                    "sent": false,
                    "is_verified": false,
                    "created_at": Utc::now(),
                }),
            )
            .await?;
        let record = rows
            .pop()
            .ok_or_else(|| AccountError::Database("Insert returned no verification".to_string()))?;

        let body = format!("Your verification code is {}", code);
        if self.notifier.sms(&phone_number, &body).await {
            self.mark_row(PHONE_VERIFICATIONS, &record.id, json!({ "sent": true })).await?;
        }

        info!("Phone verification issued for user {}", user.id);
        Ok(())
    }

    #[instrument(skip(self, token))]
    pub async fn confirm_phone(&self, user_id: &str, token: &str) -> Result<(), AccountError> {
        let filter = format!("user_id=eq.{}&token=eq.{}", encode(user_id), encode(token.trim()));
        let record: PhoneVerificationRecord = self
            .find_code(PHONE_VERIFICATIONS, &filter)
            .await?
            .ok_or(AccountError::InvalidCode)?;

        if record.is_verified {
            return Err(AccountError::AlreadyVerified("Phone number"));
        }
        if is_expired(record.created_at, Utc::now(), self.otp_window) {
            return Err(AccountError::CodeExpired);
        }

        self.mark_row(PHONE_VERIFICATIONS, &record.id, json!({ "is_verified": true })).await?;

        let mut changes = Map::new();
        changes.insert("phone_verified".to_string(), json!(true));
        changes.insert("phone_number".to_string(), json!(record.phone_number));
        self.directory.update(&record.user_id, changes).await?;

        info!("Phone verified for user {}", record.user_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), AccountError> {
        let user = self
            .directory
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(AccountError::UserNotFound)?;

        self.clear_for_user(PASSWORD_RESETS, &user.id).await?;
        let code = self.unique_code(PASSWORD_RESETS).await?;

        self.supabase
            .execute(
                Method::POST,
                PASSWORD_RESETS,
                Some(json!({
                    "user_id": user.id,
                    "token": code,
                    "created_at": Utc::now(),
                })),
            )
            .await?;

        let message = EmailMessage::new(
            &user.email,
            "Password reset request",
            format!(
                "Use {} to reset your password. The code expires in {} hours.",
                code,
                self.reset_window.num_hours()
            ),
        );
        if !self.notifier.email(message).await {
            warn!("Password reset email for user {} was not delivered", user.id);
        }

        info!("Password reset issued for user {}", user.id);
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn confirm_forgot_password(&self, request: ResetPasswordRequest) -> Result<(), AccountError> {
        let filter = format!("token=eq.{}", encode(request.token.trim()));
        let record: PasswordResetRecord = self
            .find_code(PASSWORD_RESETS, &filter)
            .await?
            .ok_or(AccountError::InvalidCode)?;

        let record_path = format!("{}?id=eq.{}", PASSWORD_RESETS, encode(&record.id));

        if is_expired(record.created_at, Utc::now(), self.reset_window) {
            self.supabase.execute(Method::DELETE, &record_path, None).await?;
            return Err(AccountError::CodeExpired);
        }
        if request.password != request.confirm_password {
            return Err(AccountError::PasswordMismatch);
        }

        let user = self.directory.get(&record.user_id).await?;
        PasswordPolicy::new(&user.email).validate(&request.password)?;

        let password_hash = PasswordService::hash_password(&request.password)?;
        self.directory.set_password_hash(&user.id, &password_hash).await?;
        self.supabase.execute(Method::DELETE, &record_path, None).await?;

        info!("Password reset completed for user {}", user.id);
        Ok(())
    }
}
