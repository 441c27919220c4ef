//! Credential issuer: claim resolution + signing + refresh rotation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

use atrium_auth::{AccessClaims, Hs256Jwt};
use atrium_core::authority::{ORG_OWNER_ROLE, SUPER_ADMIN_ROLE};
use atrium_core::{
    AccessError, AccessResult, OrganizationId, RefreshTokenId, RoleSlug, UserId,
};
use atrium_directory::store::{OrganizationStore, UserStore};
use atrium_directory::{DirectoryStore, Resolver, User};

use crate::refresh::{generate_raw_token, hash_token, RefreshToken, RefreshTokenStore};

/// Client metadata recorded against refresh credentials for audit.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// The pair handed to the caller at login/refresh/switch.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    pub access_token: String,
    /// Raw refresh bearer value; only its hash is persisted.
    pub refresh_token: String,
    pub claims: AccessClaims,
    /// Access-credential lifetime in seconds.
    pub expires_in: i64,
    /// Refresh-credential lifetime in seconds.
    pub refresh_expires_in: i64,
}

/// Builds signed access credentials and manages refresh rotation.
///
/// Resolution runs here (at login, refresh, and organization-switch time)
/// and never per ordinary request; the session guard trusts the embedded
/// claims until expiry.
pub struct CredentialIssuer {
    directory: Arc<dyn DirectoryStore>,
    refresh_store: Arc<dyn RefreshTokenStore>,
    jwt: Arc<Hs256Jwt>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl CredentialIssuer {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        refresh_store: Arc<dyn RefreshTokenStore>,
        jwt: Arc<Hs256Jwt>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            directory,
            refresh_store,
            jwt,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue a credential pair for the user under the given organization
    /// context.
    ///
    /// Membership in the organization is mandatory. Rotation happens inside
    /// the store: after this returns, at most one valid refresh credential
    /// exists for the (user, organization) pair.
    #[instrument(skip(self, client), fields(user = %user_id))]
    pub async fn issue(
        &self,
        user_id: UserId,
        organization_id: Option<OrganizationId>,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> AccessResult<CredentialPair> {
        let user = self
            .directory
            .user(user_id)
            .await?
            .ok_or_else(|| AccessError::not_found("user"))?;
        if !user.is_active {
            return Err(AccessError::authentication("account is disabled"));
        }
        if let Some(org_id) = organization_id {
            Resolver::new(self.directory.as_ref())
                .ensure_member(user_id, org_id)
                .await?;
        }

        let claims = self.build_claims(&user, organization_id, now).await?;
        let access_token = self.jwt.sign(&claims)?;

        let raw_refresh = generate_raw_token();
        let record = RefreshToken {
            id: RefreshTokenId::new(),
            user_id,
            token_hash: hash_token(&raw_refresh),
            organization_id,
            expires_at: now + self.refresh_ttl,
            revoked_at: None,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_at: now,
        };
        self.refresh_store.rotate(record, now).await?;

        Ok(CredentialPair {
            access_token,
            refresh_token: raw_refresh,
            claims,
            expires_in: self.access_ttl.num_seconds(),
            refresh_expires_in: self.refresh_ttl.num_seconds(),
        })
    }

    /// Login-time issuance: use the requested organization when the user is a
    /// member of it, otherwise their first active membership, otherwise no
    /// organization context at all.
    pub async fn login(
        &self,
        user_id: UserId,
        requested: Option<OrganizationId>,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> AccessResult<CredentialPair> {
        let resolver = Resolver::new(self.directory.as_ref());

        let mut context = None;
        if let Some(org_id) = requested {
            if resolver.is_member(user_id, org_id).await? {
                context = Some(org_id);
            }
        }
        if context.is_none() {
            let mut memberships = self.directory.memberships_for_user(user_id).await?;
            memberships.retain(|m| m.is_active);
            memberships.sort_by_key(|m| m.joined_at);
            for membership in memberships {
                if resolver.is_member(user_id, membership.organization_id).await? {
                    context = Some(membership.organization_id);
                    break;
                }
            }
        }

        self.issue(user_id, context, client, now).await
    }

    /// Rotate a presented refresh credential into a fresh pair.
    ///
    /// Unknown, revoked, and expired credentials all fail authentication and
    /// are never retried; the caller must log in again.
    #[instrument(skip(self, raw_refresh, client))]
    pub async fn rotate_refresh(
        &self,
        raw_refresh: &str,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> AccessResult<CredentialPair> {
        let token = self
            .refresh_store
            .find_by_hash(&hash_token(raw_refresh))
            .await?
            .ok_or_else(|| AccessError::authentication("unknown refresh credential"))?;

        if !token.is_valid(now) {
            return Err(AccessError::authentication(
                "refresh credential has expired or been revoked",
            ));
        }

        // Claims are recomputed from current state; issuing also revokes the
        // credential just presented.
        self.issue(token.user_id, token.organization_id, client, now)
            .await
    }

    /// Switch the organization context.
    ///
    /// Membership in the target is mandatory; a non-member is rejected with
    /// an authorization failure and no credential is issued. There is no
    /// silent fallback to the previous organization.
    #[instrument(skip(self, client), fields(user = %user_id, target = %target))]
    pub async fn switch_organization(
        &self,
        user_id: UserId,
        target: OrganizationId,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> AccessResult<CredentialPair> {
        if self
            .directory
            .organization(target)
            .await?
            .is_none()
        {
            return Err(AccessError::not_found("organization"));
        }
        Resolver::new(self.directory.as_ref())
            .ensure_member(user_id, target)
            .await?;
        self.issue(user_id, Some(target), client, now).await
    }

    /// Revoke all refresh credentials for the (user, organization) pair.
    pub async fn revoke_all(
        &self,
        user_id: UserId,
        organization_id: Option<OrganizationId>,
        now: DateTime<Utc>,
    ) -> AccessResult<u64> {
        self.refresh_store
            .revoke_all(user_id, organization_id, now)
            .await
    }

    /// Logout-everywhere: revoke the user's refresh credentials across all
    /// organization contexts.
    pub async fn logout(&self, user_id: UserId, now: DateTime<Utc>) -> AccessResult<u64> {
        self.refresh_store.revoke_every(user_id, now).await
    }

    async fn build_claims(
        &self,
        user: &User,
        organization_id: Option<OrganizationId>,
        now: DateTime<Utc>,
    ) -> AccessResult<AccessClaims> {
        let iat = now.timestamp();
        let exp = (now + self.access_ttl).timestamp();

        let Some(org_id) = organization_id else {
            // Context-free credential: identity only, no grants.
            let mut roles = Vec::new();
            if user.is_super_admin {
                roles.push(RoleSlug::new(SUPER_ADMIN_ROLE));
            }
            return Ok(AccessClaims {
                sub: user.id,
                organization_id: None,
                organization_slug: None,
                is_owner: false,
                subscription_status: None,
                max_users: None,
                roles,
                permissions: Vec::new(),
                modules: Some(Vec::new()),
                teams: Vec::new(),
                user_modules: Some(Vec::new()),
                iat,
                exp,
            });
        };

        let organization = self
            .directory
            .organization(org_id)
            .await?
            .ok_or_else(|| AccessError::not_found("organization"))?;
        let resolver = Resolver::new(self.directory.as_ref());

        let mut roles: Vec<RoleSlug> = resolver
            .roles_in_organization(user.id, org_id)
            .await?
            .into_iter()
            .map(|r| r.slug)
            .collect();
        if user.is_super_admin && !roles.iter().any(|r| r.as_str() == SUPER_ADMIN_ROLE) {
            roles.push(RoleSlug::new(SUPER_ADMIN_ROLE));
        }
        let is_owner = roles.iter().any(|r| r.as_str() == ORG_OWNER_ROLE);

        let permissions = resolver
            .resolve_permissions(user.id, org_id)
            .await?
            .into_iter()
            .map(|p| p.slug)
            .collect();

        let modules = resolver
            .enabled_modules(org_id, now)
            .await?
            .into_iter()
            .map(|m| m.slug)
            .collect();

        let teams = resolver
            .teams_in_organization(user.id, org_id)
            .await?
            .into_iter()
            .map(|(team, _)| team.slug)
            .collect();

        let user_modules = resolver.accessible_modules(user.id, org_id, now).await?;

        Ok(AccessClaims {
            sub: user.id,
            organization_id: Some(org_id),
            organization_slug: Some(organization.slug.clone()),
            is_owner,
            subscription_status: Some(organization.subscription_status),
            max_users: organization.max_users,
            roles,
            permissions,
            modules: Some(modules),
            teams,
            user_modules: Some(user_modules),
            iat,
            exp,
        })
    }
}
