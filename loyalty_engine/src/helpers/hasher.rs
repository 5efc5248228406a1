//! Password hashing for the gateway.
//!
//! Hashes are Argon2id PHC strings with a salt derived from the deployment-wide secret, so hashing the same
//! password always yields the same string. That keeps the storage contract simple (`user_by_credentials` receives
//! a hash and compares it with the stored one) without ever persisting or comparing plaintext. Comparison is
//! constant-time.

use argon2::{
    password_hash::{PasswordHash, SaltString},
    Argon2, PasswordHasher as _,
};
use lgw_common::Secret;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum HasherError {
    #[error("The password salt is unusable: {0}")]
    BadSalt(String),
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

const PASSWORD_SALT_DOMAIN: &str = "loyalty-gateway/password-salt/v1";

#[derive(Clone)]
pub struct PasswordHasher {
    salt: SaltString,
}

impl PasswordHasher {
    /// Builds a hasher from the deployment secret. The Argon2 salt is the secret's password-domain key, so the
    /// token signer (which derives under its own domain) never shares material with it. A too-short secret is a
    /// fatal configuration error for the process.
    pub fn new(secret: &Secret) -> Result<Self, HasherError> {
        if secret.reveal().len() < 8 {
            return Err(HasherError::BadSalt("the secret must be at least 8 characters long".to_string()));
        }
        let material = secret.derive_key(PASSWORD_SALT_DOMAIN);
        let salt = SaltString::encode_b64(&material).map_err(|e| HasherError::BadSalt(e.to_string()))?;
        Ok(Self { salt })
    }

    pub fn hash(&self, password: &str) -> Result<String, HasherError> {
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &self.salt)
            .map_err(|e| HasherError::HashingFailed(e.to_string()))?;
        Ok(hash.to_string())
    }
}

/// Constant-time equality of two PHC hash strings. Unparseable input compares unequal.
pub fn hashes_match(stored: &str, presented: &str) -> bool {
    match (PasswordHash::new(stored), PasswordHash::new(presented)) {
        // `Output` equality is constant-time
        (Ok(stored), Ok(presented)) => match (stored.hash, presented.hash) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => false,
    }
}
