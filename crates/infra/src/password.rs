//! Salted SHA-256 password adapter.
//!
//! The hashing scheme sits behind [`PasswordVerifier`]; swapping in a
//! memory-hard scheme is a one-file change and existing hashes are versioned
//! by the `v1$` prefix.

use rand::RngCore;
use sha2::{Digest, Sha256};

use atrium_directory::PasswordVerifier;

/// `v1$<salt-hex>$<digest-hex>` salted SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256PasswordVerifier;

impl PasswordVerifier for Sha256PasswordVerifier {
    fn hash(&self, password: &str) -> String {
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);

        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        let digest = hasher.finalize();

        format!("v1${}${}", hex::encode(salt), hex::encode(digest))
    }

    fn verify(&self, stored_hash: &str, password: &str) -> bool {
        let mut parts = stored_hash.split('$');
        let (Some("v1"), Some(salt_hex), Some(digest_hex)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let Ok(salt) = hex::decode(salt_hex) else {
            return false;
        };
        let Ok(expected) = hex::decode(digest_hex) else {
            return false;
        };

        let mut hasher = Sha256::new();
        hasher.update(&salt);
        hasher.update(password.as_bytes());
        hasher.finalize().as_slice() == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let verifier = Sha256PasswordVerifier;
        let hash = verifier.hash("correct horse battery staple");
        assert!(verifier.verify(&hash, "correct horse battery staple"));
        assert!(!verifier.verify(&hash, "wrong password"));
    }

    #[test]
    fn hashes_are_salted() {
        let verifier = Sha256PasswordVerifier;
        assert_ne!(verifier.hash("same"), verifier.hash("same"));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        let verifier = Sha256PasswordVerifier;
        assert!(!verifier.verify("", "pw"));
        assert!(!verifier.verify("v2$aa$bb", "pw"));
        assert!(!verifier.verify("v1$zz$zz", "pw"));
    }
}
