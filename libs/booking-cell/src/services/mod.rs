pub mod booking;
pub mod earnings;
pub mod emails;
pub mod lifecycle;
pub mod pricing;

pub use booking::BookingService;
pub use earnings::EarningsService;
pub use lifecycle::BookingLifecycle;
pub use pricing::PricingService;
