//! Credential primitives shared by all grant stores.
//!
//! Opaque credentials (authorization codes, refresh tokens, session ids,
//! reset hashes, client secrets) are handed out in the clear exactly once and
//! persisted only as a SHA-256 digest.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;

/// Number of random bytes in every opaque credential (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Inputs of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Generate a URL-safe opaque credential from the OS random source.
pub fn generate_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| AuthError::Entropy(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Storage digest of an opaque credential.
pub fn token_digest(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Check a presented credential against a stored digest in constant time.
pub fn digest_matches(presented: &str, stored_digest: &str) -> bool {
    constant_time_eq(token_digest(presented).as_bytes(), stored_digest.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_inputs_only() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret!"));
        assert!(!constant_time_eq(b"", b"a"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token().expect("token");
        let b = generate_token().expect("token");
        assert_ne!(a, b);
        // 32 bytes base64url without padding
        assert_eq!(a.len(), 43);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn digest_is_stable_and_hides_the_token() {
        let token = "abc123";
        let digest = token_digest(token);
        assert_eq!(digest, token_digest(token));
        assert_ne!(digest, token);
        assert!(digest_matches(token, &digest));
        assert!(!digest_matches("abc124", &digest));
    }
}
