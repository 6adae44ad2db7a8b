use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub public_base_url: String,

    pub supabase_url: String,
    pub supabase_service_key: String,

    pub jwt_secret: String,
    pub access_token_lifetime_hours: i64,
    pub field_encryption_key: String,
    pub otp_expiry_minutes: i64,
    pub password_reset_expiry_hours: i64,
    pub slot_minutes: i64,

    pub sendgrid_api_key: String,
    pub sendgrid_base_url: String,
    pub default_from_email: String,

    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_number: String,
    pub twilio_base_url: String,

    pub stripe_secret_key: String,
    pub stripe_base_url: String,

    pub pverify_client_id: String,
    pub pverify_client_secret: String,
    pub pverify_base_url: String,

    pub zip_code_api_key: String,
    pub zip_code_api_base_url: String,
    pub zip_code_radius_miles: u32,
}

fn required(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn with_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using default", name);
        default.to_string()
    })
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid number, using default", name);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            port: parsed("PORT", 3000),
            public_base_url: with_default("PUBLIC_BASE_URL", "http://localhost:3000"),

            supabase_url: required("SUPABASE_URL"),
            supabase_service_key: required("SUPABASE_SERVICE_ROLE_KEY"),

            jwt_secret: required("JWT_SECRET"),
            access_token_lifetime_hours: parsed("ACCESS_TOKEN_LIFETIME_HOURS", 48),
            field_encryption_key: required("FIELD_ENCRYPTION_KEY"),
            otp_expiry_minutes: parsed("OTP_EXPIRY_MINUTES", 10),
            password_reset_expiry_hours: parsed("PASSWORD_RESET_EXPIRY_HOURS", 4),
            slot_minutes: parsed("SLOT_MINUTES", 30),

            sendgrid_api_key: required("SENDGRID_API_KEY"),
            sendgrid_base_url: with_default("SENDGRID_BASE_URL", "https://api.sendgrid.com"),
            default_from_email: required("DEFAULT_FROM_EMAIL"),

            twilio_account_sid: required("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: required("TWILIO_AUTH_TOKEN"),
            twilio_number: required("TWILIO_NUMBER"),
            twilio_base_url: with_default("TWILIO_BASE_URL", "https://api.twilio.com"),

            stripe_secret_key: required("STRIPE_SECRET_KEY"),
            stripe_base_url: with_default("STRIPE_BASE_URL", "https://api.stripe.com"),

            pverify_client_id: required("PVERIFY_CLIENT_ID"),
            pverify_client_secret: required("PVERIFY_CLIENT_SECRET"),
            pverify_base_url: with_default("PVERIFY_BASE_URL", "https://api.pverify.com/"),

            zip_code_api_key: required("ZIP_CODE_API_KEY"),
            zip_code_api_base_url: with_default("ZIP_CODE_API_BASE_URL", "https://www.zipcodeapi.com/"),
            zip_code_radius_miles: parsed("ZIP_CODE_RADIUS_MILES", 15),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_key.is_empty()
            && !self.jwt_secret.is_empty()
            && !self.field_encryption_key.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.sendgrid_api_key.is_empty() && !self.default_from_email.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_number.is_empty()
    }

    pub fn is_payments_configured(&self) -> bool {
        !self.stripe_secret_key.is_empty()
    }

    pub fn is_insurance_configured(&self) -> bool {
        !self.pverify_client_id.is_empty() && !self.pverify_client_secret.is_empty()
    }

    pub fn is_proximity_configured(&self) -> bool {
        !self.zip_code_api_key.is_empty()
    }
}
