pub mod email;
pub mod sms;
pub mod dispatch;

pub use dispatch::Notifier;
pub use email::EmailClient;
pub use sms::SmsClient;
