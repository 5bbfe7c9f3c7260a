//! One-way password hashing helpers.
//!
//! Wraps bcrypt with a fixed work factor. Verification delegates to the
//! crate's constant-time digest comparison.

use crate::errors::{ServiceError, ServiceResult};
use bcrypt::{DEFAULT_COST, hash, verify};

/// Hashes a plaintext password for storage.
pub fn hash_password(password: &str) -> ServiceResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| ServiceError::internal(format!("Password hashing failed: {e}")))
}

/// Verifies a plaintext password against a stored digest.
pub fn verify_password(password: &str, digest: &str) -> ServiceResult<bool> {
    verify(password, digest)
        .map_err(|e| ServiceError::internal(format!("Password verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "secret1";
        let digest = hash_password(password).expect("hashing should succeed");
        assert_ne!(digest, password);
        assert!(verify_password(password, &digest).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let digest = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &digest).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_digest() {
        assert!(verify_password("anything", "not-a-bcrypt-digest").is_err());
    }
}
