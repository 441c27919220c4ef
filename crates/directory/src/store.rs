//! Persistence seams for the directory.
//!
//! One trait per concern; resolvers and services are generic over them so the
//! backing store (in-memory, Postgres) can vary without touching the engine.
//! Uniqueness invariants ((scope, slug) for roles/permissions, organization
//! slug, team slug per organization, one membership per (user, organization))
//! are enforced by implementations at write time and surfaced as
//! `AccessError::ConflictInvariant`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use atrium_core::{
    AccessResult, ModuleId, ModuleSlug, OrganizationId, OrganizationSlug, PermissionId,
    PermissionSlug, RoleId, RoleSlug, Scope, TeamId, TeamSlug, UserId,
};

use crate::module::{Module, OrganizationModule};
use crate::organization::{Membership, Organization};
use crate::role::{Permission, Role, RoleAssignment, RoleModuleGrant};
use crate::team::{Team, TeamMembership, TeamModuleGrant};
use crate::user::User;

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn organization(&self, id: OrganizationId) -> AccessResult<Option<Organization>>;
    async fn organization_by_slug(
        &self,
        slug: &OrganizationSlug,
    ) -> AccessResult<Option<Organization>>;
    async fn insert_organization(&self, organization: Organization) -> AccessResult<()>;
    async fn update_organization(&self, organization: Organization) -> AccessResult<()>;

    async fn membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<Option<Membership>>;
    async fn memberships_for_user(&self, user_id: UserId) -> AccessResult<Vec<Membership>>;
    async fn insert_membership(&self, membership: Membership) -> AccessResult<()>;
    async fn remove_membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<()>;
    async fn active_member_count(&self, organization_id: OrganizationId) -> AccessResult<u32>;
    async fn member_count(&self, organization_id: OrganizationId) -> AccessResult<u32>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user(&self, id: UserId) -> AccessResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> AccessResult<Option<User>>;
    async fn insert_user(&self, user: User) -> AccessResult<()>;
    async fn update_user(&self, user: User) -> AccessResult<()>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn role(&self, id: RoleId) -> AccessResult<Option<Role>>;
    /// Typed lookup; absence is a value, never an unchecked failure.
    async fn find_role(&self, scope: Scope, slug: &RoleSlug) -> AccessResult<Option<Role>>;
    async fn insert_role(&self, role: Role) -> AccessResult<()>;

    async fn permission(&self, id: PermissionId) -> AccessResult<Option<Permission>>;
    async fn find_permission(
        &self,
        scope: Scope,
        slug: &PermissionSlug,
    ) -> AccessResult<Option<Permission>>;
    async fn insert_permission(&self, permission: Permission) -> AccessResult<()>;

    async fn assignments_for_user(&self, user_id: UserId) -> AccessResult<Vec<RoleAssignment>>;
    async fn assign_role(&self, assignment: RoleAssignment) -> AccessResult<()>;
    async fn unassign_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
        organization_id: OrganizationId,
    ) -> AccessResult<()>;
    /// Drop every role assignment the user holds under the organization pivot.
    async fn unassign_all(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<()>;

    async fn permissions_for_role(&self, role_id: RoleId) -> AccessResult<Vec<Permission>>;
    async fn grant_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AccessResult<()>;
    async fn revoke_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AccessResult<()>;

    async fn direct_grants_for_user(&self, user_id: UserId) -> AccessResult<Vec<Permission>>;
    async fn grant_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AccessResult<()>;
    async fn revoke_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AccessResult<()>;

    /// Module ids granted to the role **for this organization** with access.
    async fn module_grants_for_role(
        &self,
        role_id: RoleId,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<ModuleId>>;
    async fn set_role_module_grant(&self, grant: RoleModuleGrant) -> AccessResult<()>;
}

#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn module(&self, id: ModuleId) -> AccessResult<Option<Module>>;
    async fn module_by_slug(&self, slug: &ModuleSlug) -> AccessResult<Option<Module>>;
    async fn all_modules(&self) -> AccessResult<Vec<Module>>;
    async fn insert_module(&self, module: Module) -> AccessResult<()>;

    /// All enablement rows for the organization, joined with their modules.
    /// Liveness (`is_enabled`, expiry) is filtered by callers against an
    /// explicit clock.
    async fn enablements(
        &self,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<(Module, OrganizationModule)>>;
    async fn upsert_enablement(&self, enablement: OrganizationModule) -> AccessResult<()>;
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn team(&self, id: TeamId) -> AccessResult<Option<Team>>;
    async fn team_by_slug(
        &self,
        organization_id: OrganizationId,
        slug: &TeamSlug,
    ) -> AccessResult<Option<Team>>;
    async fn teams_in_organization(
        &self,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<Team>>;
    async fn insert_team(&self, team: Team) -> AccessResult<()>;
    async fn update_team(&self, team: Team) -> AccessResult<()>;
    /// Removes the team row plus its memberships and module grants. Callers
    /// enforce the childless-deletion invariant first.
    async fn delete_team(&self, id: TeamId) -> AccessResult<()>;
    async fn child_team_count(&self, id: TeamId) -> AccessResult<u32>;

    async fn team_memberships_for_user(&self, user_id: UserId)
        -> AccessResult<Vec<TeamMembership>>;
    async fn members(&self, team_id: TeamId) -> AccessResult<Vec<TeamMembership>>;
    async fn upsert_team_membership(&self, membership: TeamMembership) -> AccessResult<()>;
    async fn remove_team_membership(&self, team_id: TeamId, user_id: UserId) -> AccessResult<()>;

    /// Every grant row for the team, active or not. The resolver's
    /// default-open rule keys on "zero rows at all", so inactive rows still
    /// count as a restriction source.
    async fn module_grant_rows(&self, team_id: TeamId) -> AccessResult<Vec<TeamModuleGrant>>;
    async fn set_team_module_grants(
        &self,
        team_id: TeamId,
        grants: Vec<TeamModuleGrant>,
    ) -> AccessResult<()>;
}

/// The full directory seam: everything the resolution engine reads.
pub trait DirectoryStore:
    OrganizationStore + UserStore + RoleStore + ModuleStore + TeamStore
{
}

impl<T> DirectoryStore for T where
    T: OrganizationStore + UserStore + RoleStore + ModuleStore + TeamStore
{
}

/// Convenience: enablement rows filtered to live (enabled, unexpired,
/// catalog-active) modules at `now`.
pub async fn enabled_modules<S>(
    store: &S,
    organization_id: OrganizationId,
    now: DateTime<Utc>,
) -> AccessResult<Vec<Module>>
where
    S: ModuleStore + ?Sized,
{
    let mut modules: Vec<Module> = store
        .enablements(organization_id)
        .await?
        .into_iter()
        .filter(|(module, row)| module.is_active && row.is_live(now))
        .map(|(module, _)| module)
        .collect();
    modules.sort_by_key(|m| (m.display_order, m.slug.clone()));
    Ok(modules)
}
