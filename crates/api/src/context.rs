use atrium_auth::AccessClaims;
use atrium_core::{OrganizationId, UserId};

/// Organization context for a request.
///
/// Immutable once set by the middleware; routes that need an organization and
/// find none respond with `ContextMissing`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OrganizationContext {
    organization_id: OrganizationId,
}

impl OrganizationContext {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self { organization_id }
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

/// Principal context for a request (authenticated identity + frozen claims).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    claims: AccessClaims,
}

impl PrincipalContext {
    pub fn new(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            claims,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }
}
