use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use atrium_core::{
    ModuleSlug, OrganizationId, OrganizationSlug, PermissionSlug, RoleSlug, SubscriptionStatus,
    TeamSlug, UserId,
};

/// Access-credential claims (transport-agnostic).
///
/// The claim shape is a stable contract consumed by the session guard and must
/// remain backward-compatible across versions: new fields are added with
/// defaults, existing fields never change meaning. `user_modules` and
/// `modules` are optional for exactly that reason; a credential minted by an
/// older issuer omits them, and the guard falls back instead of denying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,

    /// Organization context the credential was issued under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_slug: Option<OrganizationSlug>,

    /// Whether the subject holds the organization owner role.
    #[serde(default)]
    pub is_owner: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<SubscriptionStatus>,

    /// Organization seat limit at issuance; `None` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_users: Option<u32>,

    /// Role slugs resolved for the organization context.
    #[serde(default)]
    pub roles: Vec<RoleSlug>,

    /// Permission slugs (direct + role-derived) resolved for the context.
    #[serde(default)]
    pub permissions: Vec<PermissionSlug>,

    /// Modules enabled for the organization at issuance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<ModuleSlug>>,

    /// Teams the subject belongs to within the organization.
    #[serde(default)]
    pub teams: Vec<TeamSlug>,

    /// Modules the subject can access (hybrid team + role resolution).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_modules: Option<Vec<ModuleSlug>>,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiration (unix seconds).
    pub exp: i64,
}

impl AccessClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
    }

    pub fn has_role(&self, slug: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == slug)
    }

    pub fn has_team(&self, slug: &str) -> bool {
        self.teams.iter().any(|t| t.as_str() == slug)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("credential has expired")]
    Expired,

    #[error("credential not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid credential time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("failed to sign credential: {0}")]
    Signing(String),
}

impl From<TokenValidationError> for atrium_core::AccessError {
    fn from(err: TokenValidationError) -> Self {
        atrium_core::AccessError::authentication(err.to_string())
    }
}

/// Deterministically validate claim time bounds.
///
/// Signature verification happens before this (see [`crate::jwt`]); this
/// checks only the claims themselves, against an explicit `now` so callers
/// and tests control the clock.
pub fn validate_claims(claims: &AccessClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let ts = now.timestamp();
    if ts < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if ts >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_with_window(iat: DateTime<Utc>, exp: DateTime<Utc>) -> AccessClaims {
        AccessClaims {
            sub: UserId::new(),
            organization_id: None,
            organization_slug: None,
            is_owner: false,
            subscription_status: None,
            max_users: None,
            roles: vec![],
            permissions: vec![],
            modules: None,
            teams: vec![],
            user_modules: None,
            iat: iat.timestamp(),
            exp: exp.timestamp(),
        }
    }

    #[test]
    fn valid_window_passes() {
        let now = Utc::now();
        let claims = claims_with_window(now - Duration::minutes(1), now + Duration::minutes(10));
        assert!(validate_claims(&claims, now).is_ok());
    }

    #[test]
    fn expired_claims_are_rejected() {
        let now = Utc::now();
        let claims = claims_with_window(now - Duration::hours(2), now - Duration::hours(1));
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::Expired));
    }

    #[test]
    fn future_issued_at_is_rejected() {
        let now = Utc::now();
        let claims = claims_with_window(now + Duration::minutes(5), now + Duration::minutes(15));
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let claims = claims_with_window(now, now - Duration::minutes(1));
        assert_eq!(
            validate_claims(&claims, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn missing_module_claims_deserialize_as_none() {
        // An older issuer omits modules/user_modules entirely; the guard's
        // fallback depends on that arriving as None, not as an empty list.
        let json = serde_json::json!({
            "sub": uuid::Uuid::now_v7(),
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
        });
        let claims: AccessClaims = serde_json::from_value(json).unwrap();
        assert!(claims.modules.is_none());
        assert!(claims.user_modules.is_none());
        assert!(claims.roles.is_empty());
    }
}
