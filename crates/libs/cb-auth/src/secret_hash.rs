//! Password hashing and verification using Argon2id.
//!
//! Hashes are PHC strings (`$argon2id$v=19$...`) carrying their own salt and
//! parameters, so verification needs nothing besides the stored string.
//!
//! ```rust
//! use cb_auth::secret_hash::{generate_secret_hash, is_secret_valid};
//!
//! let hash = generate_secret_hash("Password123!").unwrap();
//! assert!(is_secret_valid("Password123!", &hash));
//! assert!(!is_secret_valid("password123!", &hash));
//! ```

use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, PasswordHash, SaltString},
};
use rand::rngs::OsRng;

use crate::prelude::*;

/// Prefix every hash produced by [`generate_secret_hash`] starts with.
pub const HASH_ALGORITHM_MARKER: &str = "$argon2id$";

/// Hashes `pw` with a fresh random salt.
///
/// Two calls with the same input produce different strings; both verify.
///
/// # Errors
///
/// [`Error::InvalidInput`] for an empty password, [`Error::PasswordHash`] if
/// the hasher itself fails.
pub fn generate_secret_hash(pw: &str) -> Result<String> {
    if pw.is_empty() {
        return Err(Error::InvalidInput("password must not be empty"));
    }
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2.hash_password(pw.as_bytes(), &salt)?.to_string())
}

/// Checks `pw` against a stored hash.
///
/// The comparison inside argon2 is constant-time. A stored value that does not
/// parse as a PHC string simply fails verification.
pub fn is_secret_valid(pw: &str, hash: &str) -> bool {
    let Ok(hash) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is malformed");
        return false;
    };

    Argon2::default()
        .verify_password(pw.as_bytes(), &hash)
        .is_ok()
}

impl From<password_hash::Error> for Error {
    fn from(value: password_hash::Error) -> Self {
        Self::PasswordHash(value)
    }
}
