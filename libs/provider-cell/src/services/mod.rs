pub mod availability;
pub mod matching;
pub mod provider;
pub mod proximity;

pub use availability::AvailabilityService;
pub use matching::ProviderMatchingService;
pub use provider::ProviderService;
pub use proximity::ZipCodeClient;
