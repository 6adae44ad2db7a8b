pub mod models;
pub mod services;

pub use models::{EmailMessage, NotificationError};
pub use services::{EmailClient, Notifier, SmsClient};
