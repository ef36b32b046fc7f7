//! Argon2id hashing of user passwords.
//!
//! Stored hashes are PHC strings, so the parameters travel with each hash and
//! verification keeps working if the defaults below change.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AuthError;

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Check `password` against a stored PHC hash. An unparsable hash is a
/// mismatch, never an error.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| hasher().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_is_salted_argon2id() {
        let first = hash_password("qwerty").expect("hash");
        let second = hash_password("qwerty").expect("hash");
        assert!(first.starts_with("$argon2id$v=19$"));
        assert_ne!(first, second);
        assert!(verify_password("qwerty", &first) && verify_password("qwerty", &second));
    }

    #[test]
    fn near_misses_do_not_verify() {
        let hash = hash_password("24-character-password!!!").expect("hash");
        assert!(verify_password("24-character-password!!!", &hash));
        assert!(!verify_password("24-character-password!!", &hash));
        assert!(!verify_password("24-CHARACTER-PASSWORD!!!", &hash));
    }

    #[test]
    fn garbage_hash_is_a_mismatch() {
        assert!(!verify_password("qwerty", "plaintext-qwerty"));
    }
}
