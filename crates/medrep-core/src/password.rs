//! Argon2id password hashing.
//!
//! Hashes are stored as PHC strings, so the parameters and salt travel with
//! the hash and verification needs no side channel.
//!
//! # Security
//!
//! - Argon2id (memory-hard, resistant to GPU/ASIC attacks)
//! - Random salt per hash
//! - [`dummy_hash`] lets login verify *something* for unknown emails, keeping
//!   the unknown-email and wrong-password paths doing comparable work

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use thiserror::Error;

// Argon2id parameters: 19 MiB memory, 2 passes, 1 lane.
const ARGON2_M_COST: u32 = 19_456;
const ARGON2_T_COST: u32 = 2;
const ARGON2_P_COST: u32 = 1;

/// Fixed input for [`dummy_hash`]. The value is irrelevant; only the work
/// performed while verifying against its hash matters.
const DUMMY_PASSWORD: &str = "medrep-dummy-password";

/// Errors during password hashing and verification.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is not a valid PHC string: {0}")]
    InvalidStoredHash(String),
}

fn argon2() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, None)
        .map_err(|e| PasswordError::Hash(format!("invalid Argon2 params: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `password` with a fresh random salt and returns the PHC string.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verifies `password` against a stored PHC string.
///
/// Returns `Ok(false)` on a clean mismatch; errors are reserved for
/// unparseable stored hashes.
///
/// # Errors
///
/// Returns [`PasswordError::InvalidStoredHash`] if `stored` cannot be parsed.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| PasswordError::InvalidStoredHash(e.to_string()))?;
    match argon2()?.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::InvalidStoredHash(e.to_string())),
    }
}

/// Returns a hash of a fixed dummy password.
///
/// Computed once at startup and verified against whenever a login names an
/// unknown email, so that path costs the same as a wrong password for a
/// known email.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn dummy_hash() -> Result<String, PasswordError> {
    hash_password(DUMMY_PASSWORD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verify_roundtrip() {
        let hash = hash_password("correct-horse-battery-staple").unwrap();
        assert!(verify_password("correct-horse-battery-staple", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn phc_string_shape() {
        let hash = hash_password("whatever").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn invalid_stored_hash_is_an_error_not_a_mismatch() {
        let result = verify_password("anything", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordError::InvalidStoredHash(_))));
    }

    #[test]
    fn dummy_hash_never_matches_real_input() {
        let dummy = dummy_hash().unwrap();
        assert!(!verify_password("password123", &dummy).unwrap());
    }
}
