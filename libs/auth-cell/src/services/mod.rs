pub mod account;
pub mod directory;
pub mod password;
pub mod verification;

pub use account::AccountService;
pub use directory::UserDirectory;
pub use password::{PasswordPolicy, PasswordService};
pub use verification::VerificationService;
