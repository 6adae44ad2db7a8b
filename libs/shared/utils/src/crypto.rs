use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CryptoError {
    #[error("Field encryption key must be 32 bytes of base64")]
    InvalidKey,

    #[error("Failed to encrypt field")]
    Encrypt,

    #[error("Failed to decrypt field")]
    Decrypt,
}

/// AES-256-GCM encryption for personally identifying columns.
///
/// Ciphertexts are `base64url(nonce || sealed)` so they fit in text columns.
pub struct FieldCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl FieldCipher {
    pub fn new(key_b64: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD.decode(key_b64.trim()).map_err(|_| CryptoError::InvalidKey)?;
        let unbound = UnboundKey::new(&AES_256_GCM, &bytes).map_err(|_| CryptoError::InvalidKey)?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::Encrypt)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce_bytes), Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&in_out);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let raw = URL_SAFE_NO_PAD.decode(ciphertext).map_err(|_| CryptoError::Decrypt)?;
        if raw.len() < NONCE_LEN {
            return Err(CryptoError::Decrypt);
        }

        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CryptoError::Decrypt)?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::Decrypt)
    }

    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, CryptoError> {
        plaintext.map(|value| self.encrypt(value)).transpose()
    }

    pub fn decrypt_opt(&self, ciphertext: Option<&str>) -> Result<Option<String>, CryptoError> {
        ciphertext.map(|value| self.decrypt(value)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new(&STANDARD.encode([9u8; 32])).unwrap()
    }

    #[test]
    fn decrypts_what_it_encrypts() {
        let cipher = cipher();
        let sealed = cipher.encrypt("Ada Lovelace").unwrap();

        assert_ne!(sealed, "Ada Lovelace");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "Ada Lovelace");
    }

    #[test]
    fn nonces_differ_per_call() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = cipher();
        let mut sealed = cipher.encrypt("secret").unwrap().into_bytes();
        let last = sealed.len() - 1;
        sealed[last] = if sealed[last] == b'A' { b'B' } else { b'A' };

        let tampered = String::from_utf8(sealed).unwrap();
        assert_eq!(cipher.decrypt(&tampered), Err(CryptoError::Decrypt));
    }

    #[test]
    fn rejects_short_key() {
        assert_eq!(FieldCipher::new(&STANDARD.encode([1u8; 16])).err(), Some(CryptoError::InvalidKey));
    }
}
