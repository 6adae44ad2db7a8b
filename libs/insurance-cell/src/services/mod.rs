pub mod coverage;
pub mod insurance;
pub mod pverify;

pub use coverage::CostSplit;
pub use insurance::InsuranceService;
pub use pverify::{EligibilityQuery, PverifyClient};
