use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::EmailMessage;
use crate::services::{EmailClient, SmsClient};

/// Best-effort delivery: failures are logged and never surface to the caller.
pub struct Notifier {
    email: Option<EmailClient>,
    sms: Option<SmsClient>,
}

impl Notifier {
    pub fn new(config: &AppConfig) -> Self {
        let email = EmailClient::new(config)
            .map_err(|e| debug!("Email disabled: {}", e))
            .ok();
        let sms = SmsClient::new(config)
            .map_err(|e| debug!("SMS disabled: {}", e))
            .ok();

        Self { email, sms }
    }

    /// Returns whether the provider accepted the message.
    pub async fn email(&self, message: EmailMessage) -> bool {
        let Some(client) = &self.email else {
            return false;
        };

        match client.send(&message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to deliver email '{}': {}", message.subject, e);
                false
            }
        }
    }

    pub async fn sms(&self, to: &str, body: &str) -> bool {
        let Some(client) = &self.sms else {
            return false;
        };

        match client.send_sms(to, body).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to deliver SMS: {}", e);
                false
            }
        }
    }
}
