//! The stored password credential.

use cb_auth::secret_hash::{generate_secret_hash, is_secret_valid};

use crate::prelude::*;

/// A one-way password hash.
///
/// [`Credential::from_password`] and [`Credential::set_password`] are the only
/// ways a plaintext reaches the hasher, and they are only called when a
/// password is actually being written. Profile edits never construct or touch
/// a credential, so they can never rehash one.
///
/// ```rust
/// use cb_models::user::credential::Credential;
///
/// let mut credential = Credential::from_password("Password123!").unwrap();
/// assert!(credential.verify("Password123!"));
///
/// credential.set_password("N3wPassword!").unwrap();
/// assert!(!credential.verify("Password123!"));
/// assert!(credential.verify("N3wPassword!"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    hash: String,
}

impl Credential {
    /// Hashes `plaintext` into a new credential.
    pub fn from_password(plaintext: &str) -> Result<Self> {
        Ok(Self {
            hash: generate_secret_hash(plaintext)?,
        })
    }

    /// Wraps a hash loaded from storage.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    /// Replaces the stored hash with a hash of `plaintext`.
    ///
    /// On error the previous hash is kept.
    pub fn set_password(&mut self, plaintext: &str) -> Result<()> {
        self.hash = generate_secret_hash(plaintext)?;
        Ok(())
    }

    pub fn verify(&self, plaintext: &str) -> bool {
        is_secret_valid(plaintext, &self.hash)
    }

    pub fn as_hash(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(REDACTED)")
    }
}
