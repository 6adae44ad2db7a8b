use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            bcc: Vec::new(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn with_bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SendGridAddress<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendGridPersonalization<'a> {
    pub to: Vec<SendGridAddress<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<SendGridAddress<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendGridContent<'a> {
    #[serde(rename = "type")]
    pub content_type: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendGridMail<'a> {
    pub personalizations: Vec<SendGridPersonalization<'a>>,
    pub from: SendGridAddress<'a>,
    pub subject: &'a str,
    pub content: Vec<SendGridContent<'a>>,
}

#[derive(Debug, Deserialize)]
pub struct TwilioMessage {
    pub sid: String,
    pub status: Option<String>,
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification channel not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("SMS delivery failed: {0}")]
    Sms(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}
