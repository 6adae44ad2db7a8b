use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::instrument;

use crate::models::AccountError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "12345678", "123456789", "password1", "password123", "qwerty123",
    "iloveyou", "sunshine", "princess", "football", "welcome1", "abc12345",
    "letmein1", "baseball", "superman", "trustno1", "11111111", "00000000",
];

pub struct PasswordService;

impl PasswordService {
    #[instrument(skip(password))]
    pub fn hash_password(password: &str) -> Result<String, AccountError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AccountError::Validation(format!("Unable to hash password: {}", e)))
    }

    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Account password rules: minimum length, not numeric-only, not a well-known
/// password and not close to the account's own identifiers.
pub struct PasswordPolicy<'a> {
    attributes: Vec<&'a str>,
}

impl<'a> PasswordPolicy<'a> {
    pub fn new(email: &'a str) -> Self {
        let local_part = email.split('@').next().unwrap_or(email);
        Self {
            attributes: vec![local_part],
        }
    }

    pub fn with_attribute(mut self, attribute: &'a str) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn issues(&self, password: &str) -> Vec<String> {
        let mut issues = Vec::new();
        let lowered = password.to_lowercase();

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            issues.push(format!(
                "This password is too short. It must contain at least {} characters.",
                MIN_PASSWORD_LENGTH
            ));
        }

        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            issues.push("This password is entirely numeric.".to_string());
        }

        if COMMON_PASSWORDS.contains(&lowered.as_str()) {
            issues.push("This password is too common.".to_string());
        }

        let similar = self
            .attributes
            .iter()
            .map(|attribute| attribute.trim().to_lowercase())
            .filter(|attribute| attribute.len() >= 3)
            .any(|attribute| lowered.contains(&attribute) || attribute.contains(&lowered));
        if similar {
            issues.push("The password is too similar to your personal information.".to_string());
        }

        issues
    }

    pub fn validate(&self, password: &str) -> Result<(), AccountError> {
        let issues = self.issues(password);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(AccountError::WeakPassword(issues.join(" ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_and_verifies() {
        let hash = PasswordService::hash_password("Blue-Harbor-42").unwrap();
        assert!(PasswordService::verify_password("Blue-Harbor-42", &hash));
        assert!(!PasswordService::verify_password("blue-harbor-42", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!PasswordService::verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn accepts_reasonable_password() {
        let policy = PasswordPolicy::new("jane.doe@example.com");
        assert!(policy.validate("Blue-Harbor-42").is_ok());
    }

    #[test]
    fn flags_short_and_numeric() {
        let issues = PasswordPolicy::new("jane@example.com").issues("1234567");
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn flags_common_password() {
        let issues = PasswordPolicy::new("jane@example.com").issues("Password123");
        assert_eq!(issues, vec!["This password is too common.".to_string()]);
    }

    #[test]
    fn flags_similarity_to_identity() {
        let policy = PasswordPolicy::new("marguerite@example.com").with_attribute("Okafor");
        assert!(policy.validate("marguerite2026").is_err());
        assert!(policy.validate("okafor-rules!").is_err());
    }
}
