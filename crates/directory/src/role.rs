//! Role and permission records plus their join rows.

use serde::{Deserialize, Serialize};

use atrium_core::{
    Entity, ModuleId, OrganizationId, PermissionId, PermissionSlug, RoleId, RoleSlug, Scope,
    UserId,
};

/// Named authority bucket.
///
/// # Invariants
/// - (scope, slug) is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub scope: Scope,
    pub name: String,
    pub slug: RoleSlug,
    pub description: Option<String>,
}

impl Role {
    pub fn new(scope: Scope, name: impl Into<String>, slug: RoleSlug) -> Self {
        Self {
            id: RoleId::new(),
            scope,
            name: name.into(),
            slug,
            description: None,
        }
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Named capability.
///
/// # Invariants
/// - (scope, slug) is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub scope: Scope,
    pub name: String,
    pub slug: PermissionSlug,
    pub description: Option<String>,
}

impl Permission {
    pub fn new(scope: Scope, name: impl Into<String>, slug: PermissionSlug) -> Self {
        Self {
            id: PermissionId::new(),
            scope,
            name: name.into(),
            slug,
            description: None,
        }
    }
}

impl Entity for Permission {
    type Id = PermissionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// User↔Role assignment.
///
/// The pivot organization id is required even for a global role: the same
/// global role is activated independently per organization the user belongs
/// to. During resolution, however, an assignment of a global role applies to
/// every organization (see [`crate::resolve`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub organization_id: OrganizationId,
}

/// User↔Permission direct grant; bypasses roles entirely. Scoping comes from
/// the permission's own scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectPermissionGrant {
    pub user_id: UserId,
    pub permission_id: PermissionId,
}

/// Role↔Module grant, always pinned to one organization, even when the role
/// itself is global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleModuleGrant {
    pub role_id: RoleId,
    pub module_id: ModuleId,
    pub organization_id: OrganizationId,
    pub has_access: bool,
    /// Audit reference: who granted the access.
    pub granted_by: Option<UserId>,
}
