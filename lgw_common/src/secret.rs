//! The deployment secret.
//!
//! One configured secret backs both password hashing and access-token signing. Consumers never work with the raw
//! value directly; each derives its own key through [`Secret::derive_key`] under a distinct domain string, so the
//! hasher and the token signer share the configuration without sharing key material.

use std::{
    fmt,
    fmt::{Debug, Display},
};

use sha2::{Digest, Sha256};

/// The deployment-wide secret, read from configuration once at start-up. Neither `Debug` nor `Display` will leak
/// it into logs.
#[derive(Clone, Default)]
pub struct Secret {
    value: String,
}

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self { value: value.into() }
    }

    pub fn reveal(&self) -> &str {
        &self.value
    }

    /// Derives a 32-byte key bound to `domain`. Keys for different domains are unrelated, and the secret cannot
    /// be recovered from any of them.
    pub fn derive_key(&self, domain: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.value.as_bytes());
        hasher.finalize().into()
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}
