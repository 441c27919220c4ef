//! Session/request guard: per-request authorization over embedded claims.
//!
//! This is the fast path. The guard trusts the claims for the lifetime of the
//! access credential and never re-runs the aggregator or module resolver.
//! The one exception is the degraded-claims fallback, which the caller
//! resolves against the module store when the guard returns
//! [`ModuleDecision::Unresolved`].

use atrium_core::authority::{SUPER_ADMIN_ROLE, GLOBAL_ADMIN_ROLE};
use atrium_core::{AccessError, AccessResult, ModuleSlug, PermissionSlug};

use crate::claims::AccessClaims;

/// Outcome of a claims-only module check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleDecision {
    Granted,
    Denied(AccessError),
    /// The credential carries no module information at all (older/degraded
    /// claims schema). The caller must fall back to the organization's
    /// currently enabled modules rather than denying outright.
    Unresolved,
}

/// Whether the claims carry an administrative role slug that bypasses module
/// restrictions.
pub fn is_admin_like(claims: &AccessClaims) -> bool {
    claims.has_role(SUPER_ADMIN_ROLE) || claims.has_role(GLOBAL_ADMIN_ROLE)
}

pub fn has_role(claims: &AccessClaims, slug: &str) -> bool {
    claims.has_role(slug)
}

/// Check module access using claims alone.
///
/// Resolution order: admin bypass, then the user-specific hybrid list, then
/// the organization list. A present-but-empty user list falls through to the
/// organization list (a user with no restriction sources was issued the full
/// organization set, so an empty list here means "nothing resolved", not
/// "denied everything").
pub fn check_module(claims: &AccessClaims, module: &ModuleSlug) -> ModuleDecision {
    if is_admin_like(claims) {
        return ModuleDecision::Granted;
    }

    if let Some(user_modules) = &claims.user_modules {
        if !user_modules.is_empty() {
            return if user_modules.contains(module) {
                ModuleDecision::Granted
            } else {
                ModuleDecision::Denied(AccessError::forbidden(format!("module '{module}'")))
            };
        }
    }

    match &claims.modules {
        Some(org_modules) => {
            if org_modules.contains(module) {
                ModuleDecision::Granted
            } else {
                ModuleDecision::Denied(AccessError::forbidden(format!(
                    "module '{module}' (not enabled for organization)"
                )))
            }
        }
        None => ModuleDecision::Unresolved,
    }
}

/// Require a permission slug in the claims.
///
/// The wildcard permission `*` grants everything without enumerating domain
/// permissions inside the credential.
pub fn require_permission(claims: &AccessClaims, permission: &PermissionSlug) -> AccessResult<()> {
    let granted = claims
        .permissions
        .iter()
        .any(|p| p.as_str() == "*" || p == permission);

    if granted {
        Ok(())
    } else {
        Err(AccessError::forbidden(format!("permission '{permission}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::{RoleSlug, UserId};
    use chrono::Utc;

    fn base_claims() -> AccessClaims {
        let now = Utc::now().timestamp();
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
            iat: now,
            exp: now + 600,
        }
    }

    #[test]
    fn admin_roles_bypass_module_checks() {
        for slug in ["superadmin", "admin"] {
            let mut claims = base_claims();
            claims.roles = vec![RoleSlug::new(slug.to_string())];
            claims.user_modules = Some(vec![ModuleSlug::new("crm")]);

            let decision = check_module(&claims, &ModuleSlug::new("payroll"));
            assert_eq!(decision, ModuleDecision::Granted, "role {slug}");
        }
    }

    #[test]
    fn user_modules_gate_non_admins() {
        let mut claims = base_claims();
        claims.user_modules = Some(vec![ModuleSlug::new("crm")]);
        claims.modules = Some(vec![ModuleSlug::new("crm"), ModuleSlug::new("payroll")]);

        assert_eq!(check_module(&claims, &ModuleSlug::new("crm")), ModuleDecision::Granted);
        assert!(matches!(
            check_module(&claims, &ModuleSlug::new("payroll")),
            ModuleDecision::Denied(AccessError::Authorization { .. })
        ));
    }

    #[test]
    fn empty_user_modules_fall_back_to_organization_modules() {
        let mut claims = base_claims();
        claims.user_modules = Some(vec![]);
        claims.modules = Some(vec![ModuleSlug::new("crm")]);

        assert_eq!(check_module(&claims, &ModuleSlug::new("crm")), ModuleDecision::Granted);
    }

    #[test]
    fn missing_module_claims_are_unresolved() {
        let claims = base_claims();
        assert_eq!(
            check_module(&claims, &ModuleSlug::new("crm")),
            ModuleDecision::Unresolved
        );
    }

    #[test]
    fn denial_names_the_missing_module() {
        let mut claims = base_claims();
        claims.user_modules = Some(vec![ModuleSlug::new("crm")]);

        let ModuleDecision::Denied(err) = check_module(&claims, &ModuleSlug::new("payroll")) else {
            panic!("expected denial");
        };
        assert!(err.to_string().contains("payroll"));
    }

    #[test]
    fn wildcard_permission_grants_everything() {
        let mut claims = base_claims();
        claims.permissions = vec![PermissionSlug::new("*")];
        assert!(require_permission(&claims, &PermissionSlug::new("teams.manage")).is_ok());
    }

    #[test]
    fn missing_permission_is_an_authorization_failure() {
        let mut claims = base_claims();
        claims.permissions = vec![PermissionSlug::new("teams.read")];

        let err = require_permission(&claims, &PermissionSlug::new("teams.manage")).unwrap_err();
        assert!(matches!(err, AccessError::Authorization { .. }));
        assert!(err.to_string().contains("teams.manage"));
    }
}
