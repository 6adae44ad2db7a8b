pub mod card;
pub mod cards;
pub mod stripe;

pub use card::CardDetails;
pub use cards::CardService;
pub use stripe::StripeClient;
