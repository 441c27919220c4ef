//! Persisted refresh credentials.
//!
//! The store keeps only a one-way hash of the bearer value. Rotation is the
//! single operation in the system that needs atomicity: revoking the previous
//! credentials for a (user, organization) pair and inserting the replacement
//! must not be separable, or a crash in between could leave two valid
//! credentials for the pair.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use atrium_core::{AccessError, AccessResult, OrganizationId, RefreshTokenId, UserId};

/// Persisted refresh-credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub user_id: UserId,
    /// SHA-256 hex of the raw bearer value; the raw value is never stored.
    pub token_hash: String,
    /// Organization context at issuance; `None` for a context-free login.
    pub organization_id: Option<OrganizationId>,
    pub expires_at: DateTime<Utc>,
    /// Revocation is terminal: a revoked credential is never reissued.
    pub revoked_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// Generate a raw refresh bearer value: 32 random bytes, hex-encoded.
pub fn generate_raw_token() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One-way hash used for storage and lookup.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Refresh-credential persistence seam.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Atomically revoke every non-revoked credential for the record's
    /// (user, organization) pair, then insert the record. After a successful
    /// call, at most one valid credential exists for the pair.
    async fn rotate(&self, token: RefreshToken, now: DateTime<Utc>) -> AccessResult<()>;

    async fn find_by_hash(&self, token_hash: &str) -> AccessResult<Option<RefreshToken>>;

    /// Revoke all non-revoked credentials for the (user, organization) pair.
    /// Returns how many were revoked.
    async fn revoke_all(
        &self,
        user_id: UserId,
        organization_id: Option<OrganizationId>,
        now: DateTime<Utc>,
    ) -> AccessResult<u64>;

    /// Revoke every non-revoked credential the user holds, across all
    /// organization contexts (logout-everywhere).
    async fn revoke_every(&self, user_id: UserId, now: DateTime<Utc>) -> AccessResult<u64>;
}

/// In-memory refresh store for tests and local development.
///
/// A single mutex spans revoke-then-insert, which is exactly the rotation
/// atomicity the Postgres implementation gets from a transaction.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: Mutex<Vec<RefreshToken>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AccessResult<std::sync::MutexGuard<'_, Vec<RefreshToken>>> {
        self.tokens
            .lock()
            .map_err(|_| AccessError::internal("refresh store lock poisoned"))
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn rotate(&self, token: RefreshToken, now: DateTime<Utc>) -> AccessResult<()> {
        let mut tokens = self.lock()?;
        for existing in tokens.iter_mut() {
            if existing.user_id == token.user_id
                && existing.organization_id == token.organization_id
                && existing.revoked_at.is_none()
            {
                existing.revoked_at = Some(now);
            }
        }
        tokens.push(token);
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AccessResult<Option<RefreshToken>> {
        let tokens = self.lock()?;
        Ok(tokens.iter().find(|t| t.token_hash == token_hash).cloned())
    }

    async fn revoke_all(
        &self,
        user_id: UserId,
        organization_id: Option<OrganizationId>,
        now: DateTime<Utc>,
    ) -> AccessResult<u64> {
        let mut tokens = self.lock()?;
        let mut revoked = 0;
        for token in tokens.iter_mut() {
            if token.user_id == user_id
                && token.organization_id == organization_id
                && token.revoked_at.is_none()
            {
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn revoke_every(&self, user_id: UserId, now: DateTime<Utc>) -> AccessResult<u64> {
        let mut tokens = self.lock()?;
        let mut revoked = 0;
        for token in tokens.iter_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() {
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
