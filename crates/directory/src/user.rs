//! User account record.
//!
//! A user exists independently of any organization and may belong to many.
//! The super-admin flag is system-wide and lives outside all organization
//! scoping; it is deliberately disjoint from the global-administrator role
//! (see `atrium_core::authority`).

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use atrium_core::{Entity, UserId};

/// Email-verification tokens expire after this window.
const EMAIL_VERIFICATION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub timezone: String,
    pub language: String,
    /// Opaque to this crate; produced and checked by a [`PasswordVerifier`].
    pub password_hash: String,
    pub is_active: bool,
    pub is_super_admin: bool,
    pub two_factor_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    /// SHA-256 of the outstanding verification token; raw value never stored.
    pub email_verification_token_hash: Option<String>,
    pub email_verification_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        password_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email: email.into().trim().to_lowercase(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: None,
            timezone: "UTC".to_string(),
            language: "en".to_string(),
            password_hash: password_hash.into(),
            is_active: true,
            is_super_admin: false,
            two_factor_enabled: false,
            last_login_at: None,
            last_login_ip: None,
            email_verified_at: None,
            email_verification_token_hash: None,
            email_verification_sent_at: None,
            created_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn initials(&self) -> String {
        let mut initials = String::new();
        for part in [&self.first_name, &self.last_name] {
            if let Some(c) = part.chars().next() {
                initials.extend(c.to_uppercase());
            }
        }
        initials
    }

    pub fn record_login(&mut self, now: DateTime<Utc>, ip: Option<String>) {
        self.last_login_at = Some(now);
        self.last_login_ip = ip;
    }

    pub fn has_verified_email(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Generate a fresh email-verification token.
    ///
    /// Returns the raw token for the notification layer to transmit; only its
    /// SHA-256 hash is retained on the record.
    pub fn generate_email_verification_token(&mut self, now: DateTime<Utc>) -> String {
        let mut bytes = [0_u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let raw = hex::encode(bytes);

        self.email_verification_token_hash = Some(hash_token(&raw));
        self.email_verification_sent_at = Some(now);
        raw
    }

    /// Verify the email with a presented raw token.
    ///
    /// Fails when already verified, the token mismatches, or the 24-hour
    /// window has elapsed. On success the outstanding token is cleared.
    pub fn verify_email(&mut self, raw_token: &str, now: DateTime<Utc>) -> bool {
        if self.email_verified_at.is_some() {
            return false;
        }
        let (Some(stored), Some(sent_at)) = (
            self.email_verification_token_hash.as_deref(),
            self.email_verification_sent_at,
        ) else {
            return false;
        };
        if stored != hash_token(raw_token) {
            return false;
        }
        if now > sent_at + Duration::hours(EMAIL_VERIFICATION_TTL_HOURS) {
            return false;
        }

        self.email_verified_at = Some(now);
        self.email_verification_token_hash = None;
        self.email_verification_sent_at = None;
        true
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Password hashing seam.
///
/// The hashing scheme is an adapter concern; the directory only carries the
/// opaque hash string.
pub trait PasswordVerifier: Send + Sync {
    fn hash(&self, password: &str) -> String;
    fn verify(&self, stored_hash: &str, password: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new("Alice@Example.com ", "Alice", "Smith", "hash", Utc::now())
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(user().email, "alice@example.com");
    }

    #[test]
    fn full_name_and_initials() {
        let u = user();
        assert_eq!(u.full_name(), "Alice Smith");
        assert_eq!(u.initials(), "AS");
    }

    #[test]
    fn verification_token_round_trip() {
        let now = Utc::now();
        let mut u = user();
        let raw = u.generate_email_verification_token(now);

        // Only the hash is retained.
        assert_ne!(u.email_verification_token_hash.as_deref(), Some(raw.as_str()));

        assert!(u.verify_email(&raw, now + Duration::hours(1)));
        assert!(u.has_verified_email());
        assert!(u.email_verification_token_hash.is_none());
    }

    #[test]
    fn expired_verification_token_is_rejected() {
        let now = Utc::now();
        let mut u = user();
        let raw = u.generate_email_verification_token(now);

        assert!(!u.verify_email(&raw, now + Duration::hours(25)));
        assert!(!u.has_verified_email());
    }

    #[test]
    fn wrong_token_is_rejected() {
        let now = Utc::now();
        let mut u = user();
        let _raw = u.generate_email_verification_token(now);
        assert!(!u.verify_email("deadbeef", now));
    }

    #[test]
    fn already_verified_email_rejects_reverification() {
        let now = Utc::now();
        let mut u = user();
        let raw = u.generate_email_verification_token(now);
        assert!(u.verify_email(&raw, now));
        assert!(!u.verify_email(&raw, now));
    }
}
