use reqwest::Client;
use tracing::{error, info};

use shared_config::AppConfig;

use crate::models::{NotificationError, TwilioMessage};

pub struct SmsClient {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    base_url: String,
}

impl SmsClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_sms_configured() {
            return Err(NotificationError::NotConfigured("sms"));
        }

        Ok(Self {
            client: Client::new(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_number.clone(),
            base_url: config.twilio_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST /2010-04-01/Accounts/{sid}/Messages.json
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<TwilioMessage, NotificationError> {
        info!("Sending SMS via Twilio");

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Twilio send failed: {} - {}", status, response_text);
            return Err(NotificationError::Sms(format!("HTTP {}: {}", status, response_text)));
        }

        serde_json::from_str(&response_text)
            .map_err(|e| NotificationError::Sms(format!("Failed to parse Twilio response: {}", e)))
    }
}
