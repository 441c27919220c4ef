//! Authorization decision explanations (audit trail).
//!
//! Answers "why was this request allowed/denied?" from claims alone, for
//! admin-facing diagnostics endpoints.

use serde::Serialize;

use atrium_core::{ModuleSlug, PermissionSlug};

use crate::claims::AccessClaims;
use crate::guard::{check_module, is_admin_like, ModuleDecision};

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    /// The capability that was checked (permission or module slug).
    pub required: String,

    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Role slugs present in the claims.
    pub roles: Vec<String>,

    /// Permission slugs present in the claims (sorted).
    pub effective_permissions: Vec<String>,

    /// If denied, what was missing.
    pub denial: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    MissingPermission,
    MissingModule,
}

fn claim_state(claims: &AccessClaims) -> (Vec<String>, Vec<String>) {
    let roles = claims.roles.iter().map(|r| r.as_str().to_string()).collect();
    let mut perms: Vec<String> = claims
        .permissions
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    perms.sort();
    (roles, perms)
}

/// Explain a permission decision for the given claims.
pub fn explain_permission(claims: &AccessClaims, required: &PermissionSlug) -> AccessExplanation {
    let (roles, perms) = claim_state(claims);
    let has_wildcard = perms.iter().any(|p| p == "*");
    let has_required = perms.iter().any(|p| p == required.as_str());

    if has_wildcard || has_required {
        let reason = if has_wildcard {
            "claims carry the wildcard permission '*'".to_string()
        } else {
            format!("claims carry permission '{required}'")
        };
        AccessExplanation {
            required: required.as_str().to_string(),
            granted: true,
            reason,
            roles,
            effective_permissions: perms,
            denial: None,
        }
    } else {
        AccessExplanation {
            required: required.as_str().to_string(),
            granted: false,
            reason: format!("claims do not carry permission '{required}'"),
            roles,
            effective_permissions: perms,
            denial: Some(DenialReason {
                kind: DenialKind::MissingPermission,
                message: format!("missing required permission '{required}'"),
                suggestions: vec![
                    format!("assign a role that grants '{required}' in this organization"),
                    format!("grant '{required}' directly to the user"),
                    "re-issue the credential if grants changed after issuance".to_string(),
                ],
            }),
        }
    }
}

/// Explain a module-access decision for the given claims.
pub fn explain_module(claims: &AccessClaims, module: &ModuleSlug) -> AccessExplanation {
    let (roles, perms) = claim_state(claims);

    match check_module(claims, module) {
        ModuleDecision::Granted => {
            let reason = if is_admin_like(claims) {
                "administrative role bypasses module restrictions".to_string()
            } else {
                format!("module '{module}' is in the resolved access set")
            };
            AccessExplanation {
                required: module.as_str().to_string(),
                granted: true,
                reason,
                roles,
                effective_permissions: perms,
                denial: None,
            }
        }
        ModuleDecision::Denied(err) => AccessExplanation {
            required: module.as_str().to_string(),
            granted: false,
            reason: err.to_string(),
            roles,
            effective_permissions: perms,
            denial: Some(DenialReason {
                kind: DenialKind::MissingModule,
                message: format!("module '{module}' is not in the resolved access set"),
                suggestions: vec![
                    format!("grant module '{module}' to one of the user's teams"),
                    format!("grant module '{module}' to one of the user's roles"),
                    format!("verify module '{module}' is enabled for the organization"),
                ],
            }),
        },
        ModuleDecision::Unresolved => AccessExplanation {
            required: module.as_str().to_string(),
            granted: false,
            reason: "credential carries no module claims; resolution deferred to the directory"
                .to_string(),
            roles,
            effective_permissions: perms,
            denial: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::{RoleSlug, UserId};
    use chrono::Utc;

    fn claims() -> AccessClaims {
        let now = Utc::now().timestamp();
        AccessClaims {
            sub: UserId::new(),
            organization_id: None,
            organization_slug: None,
            is_owner: false,
            subscription_status: None,
            max_users: None,
            roles: vec![RoleSlug::new("member")],
            permissions: vec![PermissionSlug::new("teams.read")],
            modules: Some(vec![ModuleSlug::new("crm")]),
            teams: vec![],
            user_modules: Some(vec![ModuleSlug::new("crm")]),
            iat: now,
            exp: now + 600,
        }
    }

    #[test]
    fn denied_permission_explains_what_is_missing() {
        let explanation = explain_permission(&claims(), &PermissionSlug::new("teams.manage"));
        assert!(!explanation.granted);
        let denial = explanation.denial.unwrap();
        assert_eq!(denial.kind, DenialKind::MissingPermission);
        assert!(denial.message.contains("teams.manage"));
        assert!(!denial.suggestions.is_empty());
    }

    #[test]
    fn granted_module_explains_the_grant() {
        let explanation = explain_module(&claims(), &ModuleSlug::new("crm"));
        assert!(explanation.granted);
        assert!(explanation.denial.is_none());
    }

    #[test]
    fn denied_module_suggests_grant_paths() {
        let explanation = explain_module(&claims(), &ModuleSlug::new("payroll"));
        assert!(!explanation.granted);
        assert_eq!(explanation.denial.unwrap().kind, DenialKind::MissingModule);
    }
}
