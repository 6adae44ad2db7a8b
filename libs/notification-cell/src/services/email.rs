use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{
    EmailMessage, NotificationError, SendGridAddress, SendGridContent, SendGridMail,
    SendGridPersonalization,
};

/// SendGrid v3 mail client. Bodies are plain text.
#[derive(Debug)]
pub struct EmailClient {
    client: Client,
    api_key: String,
    base_url: String,
    from_email: String,
}

impl EmailClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_email_configured() {
            return Err(NotificationError::NotConfigured("email"));
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.sendgrid_api_key.clone(),
            base_url: config.sendgrid_base_url.trim_end_matches('/').to_string(),
            from_email: config.default_from_email.clone(),
        })
    }

    /// POST /v3/mail/send
    pub async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!("Sending email '{}' to {} recipient(s)", message.subject, message.to.len());

        let url = format!("{}/v3/mail/send", self.base_url);

        let mail = SendGridMail {
            personalizations: vec![SendGridPersonalization {
                to: message.to.iter().map(|email| SendGridAddress { email }).collect(),
                bcc: message.bcc.iter().map(|email| SendGridAddress { email }).collect(),
            }],
            from: SendGridAddress { email: &self.from_email },
            subject: &message.subject,
            content: vec![SendGridContent {
                content_type: "text/plain",
                value: &message.body,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&mail)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await?;
            error!("SendGrid rejected message: {} - {}", status, response_text);
            return Err(NotificationError::Email(format!("HTTP {}: {}", status, response_text)));
        }

        debug!("SendGrid accepted message with status {}", status);
        Ok(())
    }
}
