//! Argon2id password hashing.
//!
//! Every call to [`hash_password`] draws a fresh random salt, so two hashes
//! of the same plaintext never compare equal. Verification parses the PHC
//! string and lets argon2 extract the salt and do the comparison itself —
//! never raw equality of two freshly produced hashes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{AuthError, Result};

/// Hash a plaintext password with Argon2id under a fresh random salt.
pub fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check a plaintext password against a stored PHC hash string.
///
/// A malformed stored hash yields `false` rather than an error; a corrupt
/// record must never authenticate anyone.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
