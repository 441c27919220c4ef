//! Access-resolution engine: permissions, roles, and the hybrid module set.
//!
//! Every resolution reads current relational state and computes a fresh
//! answer; nothing here caches across calls. Results are cached *by the
//! credential issuer* inside the signed claims, never here.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::instrument;

use atrium_core::authority::{GLOBAL_ADMIN_ROLE, ORG_BYPASS_ROLES};
use atrium_core::{
    AccessError, AccessResult, ModuleSlug, OrganizationId, PermissionId, PermissionSlug, RoleId,
    Scope, UserId,
};

use crate::module::Module;
use crate::role::{Permission, Role};
use crate::store::{
    enabled_modules, DirectoryStore, OrganizationStore, RoleStore, TeamStore, UserStore,
};
use crate::team::Team;
use crate::user::User;

/// Read-only resolution over a directory store.
///
/// Construction is cheap; hold one per request or per issuance.
pub struct Resolver<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D> Resolver<'a, D>
where
    D: DirectoryStore + ?Sized,
{
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// Active membership in a live organization.
    pub async fn is_member(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<bool> {
        let Some(organization) = self.directory.organization(organization_id).await? else {
            return Ok(false);
        };
        if !organization.is_live() {
            return Ok(false);
        }
        Ok(self
            .directory
            .membership(user_id, organization_id)
            .await?
            .is_some_and(|m| m.is_active))
    }

    /// Reject with an authorization failure unless the user is a member.
    pub async fn ensure_member(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<()> {
        if self.is_member(user_id, organization_id).await? {
            Ok(())
        } else {
            Err(AccessError::forbidden(format!(
                "membership in organization {organization_id}"
            )))
        }
    }

    /// Roles active for the user in the organization: assignments pivoted to
    /// this organization, plus every assignment of a global-scoped role.
    ///
    /// Non-members resolve to no roles. Deduplication is by role row
    /// identity: a global and an organization role sharing a slug are both
    /// returned.
    pub async fn roles_in_organization(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<Role>> {
        if !self.is_member(user_id, organization_id).await? {
            return Ok(Vec::new());
        }

        let assignments = self.directory.assignments_for_user(user_id).await?;
        let mut seen: HashSet<RoleId> = HashSet::new();
        let mut roles = Vec::new();

        for assignment in assignments {
            let Some(role) = self.directory.role(assignment.role_id).await? else {
                continue;
            };
            let applies =
                assignment.organization_id == organization_id || role.scope.is_global();
            if applies && seen.insert(role.id) {
                roles.push(role);
            }
        }

        Ok(roles)
    }

    pub async fn has_role_in_organization(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        slugs: &[&str],
    ) -> AccessResult<bool> {
        let roles = self.roles_in_organization(user_id, organization_id).await?;
        Ok(roles.iter().any(|r| slugs.contains(&r.slug.as_str())))
    }

    pub async fn has_any_role_in_organization(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        slugs: &[&str],
    ) -> AccessResult<bool> {
        self.has_role_in_organization(user_id, organization_id, slugs)
            .await
    }

    pub async fn has_all_roles_in_organization(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        slugs: &[&str],
    ) -> AccessResult<bool> {
        let roles = self.roles_in_organization(user_id, organization_id).await?;
        let held: HashSet<&str> = roles.iter().map(|r| r.slug.as_str()).collect();
        Ok(slugs.iter().all(|s| held.contains(s)))
    }

    /// Union of direct permission grants and role-derived permissions for the
    /// organization, deduplicated by permission identity.
    ///
    /// An organization id that does not exist (or a user with no membership)
    /// yields an empty set rather than an error: absence of a tenant is a
    /// data-integrity concern for the caller, not an authorization concern.
    #[instrument(skip(self), fields(user = %user_id, organization = %organization_id))]
    pub async fn resolve_permissions(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<Permission>> {
        if !self.is_member(user_id, organization_id).await? {
            return Ok(Vec::new());
        }

        let mut seen: HashSet<PermissionId> = HashSet::new();
        let mut permissions = Vec::new();

        for permission in self.directory.direct_grants_for_user(user_id).await? {
            if permission.scope.applies_to(organization_id) && seen.insert(permission.id) {
                permissions.push(permission);
            }
        }

        for role in self.roles_in_organization(user_id, organization_id).await? {
            for permission in self.directory.permissions_for_role(role.id).await? {
                if seen.insert(permission.id) {
                    permissions.push(permission);
                }
            }
        }

        Ok(permissions)
    }

    /// Permission check with the direct-grant short-circuit: direct grants
    /// are cheaper to check than role expansion, so they are consulted first
    /// and the first match wins.
    pub async fn has_permission_in_organization(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        slug: &PermissionSlug,
    ) -> AccessResult<bool> {
        if !self.is_member(user_id, organization_id).await? {
            return Ok(false);
        }

        for permission in self.directory.direct_grants_for_user(user_id).await? {
            if permission.scope.applies_to(organization_id) && &permission.slug == slug {
                return Ok(true);
            }
        }

        for role in self.roles_in_organization(user_id, organization_id).await? {
            let granted = self
                .directory
                .permissions_for_role(role.id)
                .await?
                .iter()
                .any(|p| &p.slug == slug);
            if granted {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub async fn has_any_permission_in_organization(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        slugs: &[PermissionSlug],
    ) -> AccessResult<bool> {
        for slug in slugs {
            if self
                .has_permission_in_organization(user_id, organization_id, slug)
                .await?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn has_all_permissions_in_organization(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        slugs: &[PermissionSlug],
    ) -> AccessResult<bool> {
        for slug in slugs {
            if !self
                .has_permission_in_organization(user_id, organization_id, slug)
                .await?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Global administrator: holds a role whose scope is exactly global and
    /// whose slug is the designated admin slug, under any pivot.
    pub async fn is_global_admin(&self, user_id: UserId) -> AccessResult<bool> {
        for assignment in self.directory.assignments_for_user(user_id).await? {
            let Some(role) = self.directory.role(assignment.role_id).await? else {
                continue;
            };
            if role.scope == Scope::Global && role.slug.as_str() == GLOBAL_ADMIN_ROLE {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Authority over the global role/permission catalog.
    ///
    /// Super-admins are explicitly excluded: the super-admin flag governs
    /// operational bypass, the global-admin role governs catalog management,
    /// and the two never imply each other.
    pub async fn can_manage_global(&self, user: &User) -> AccessResult<bool> {
        if user.is_super_admin {
            return Ok(false);
        }
        self.is_global_admin(user.id).await
    }

    pub async fn ensure_can_manage_global(&self, user: &User) -> AccessResult<()> {
        if self.can_manage_global(user).await? {
            Ok(())
        } else {
            Err(AccessError::forbidden("global administrator role"))
        }
    }

    /// Modules currently live for the organization.
    pub async fn enabled_modules(
        &self,
        organization_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> AccessResult<Vec<Module>> {
        enabled_modules(self.directory, organization_id, now).await
    }

    /// Teams the user belongs to within the organization, paired with the
    /// membership row.
    pub async fn teams_in_organization(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<(Team, crate::team::TeamMembership)>> {
        let mut out = Vec::new();
        for membership in self.directory.team_memberships_for_user(user_id).await? {
            let Some(team) = self.directory.team(membership.team_id).await? else {
                continue;
            };
            if team.organization_id == organization_id && team.is_active {
                out.push((team, membership));
            }
        }
        Ok(out)
    }

    /// Hybrid module-access resolution for a (user, organization) pair.
    ///
    /// Ordering is load-bearing: the super-admin/owner bypass runs before the
    /// team default-open rule, so an owner sitting in a restricted team is
    /// never narrowed by it.
    #[instrument(skip(self), fields(user = %user_id, organization = %organization_id))]
    pub async fn accessible_modules(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> AccessResult<Vec<ModuleSlug>> {
        // 1. Organization gate: nothing enabled means nothing reachable.
        let org_modules = self.enabled_modules(organization_id, now).await?;
        if org_modules.is_empty() {
            return Ok(Vec::new());
        }
        let org_slugs: Vec<ModuleSlug> = org_modules.iter().map(|m| m.slug.clone()).collect();

        // 2. Full bypass: super-admin flag, or owner/admin role in the
        //    organization.
        let is_super_admin = self
            .directory
            .user(user_id)
            .await?
            .is_some_and(|u| u.is_super_admin);
        if is_super_admin {
            return Ok(org_slugs);
        }
        if self
            .has_role_in_organization(user_id, organization_id, &ORG_BYPASS_ROLES)
            .await?
        {
            return Ok(org_slugs);
        }

        // Non-members have no restriction sources; defaulting open here would
        // hand outsiders the full catalog, so they resolve to nothing.
        if !self.is_member(user_id, organization_id).await? {
            return Ok(Vec::new());
        }

        let mut user_module_ids: HashSet<atrium_core::ModuleId> = HashSet::new();

        // 3. Team grants. A team with zero grant rows is unrestricted: its
        //    members get the entire organization set immediately.
        for (team, _membership) in self.teams_in_organization(user_id, organization_id).await? {
            let rows = self.directory.module_grant_rows(team.id).await?;
            if rows.is_empty() {
                return Ok(org_slugs);
            }
            user_module_ids.extend(rows.into_iter().filter(|g| g.is_active).map(|g| g.module_id));
        }

        // 4. Role grants, always pinned to this organization.
        for role in self.roles_in_organization(user_id, organization_id).await? {
            let granted = self
                .directory
                .module_grants_for_role(role.id, organization_id)
                .await?;
            user_module_ids.extend(granted);
        }

        // 5. No restriction source at all defaults to full access, mirroring
        //    the per-team rule.
        if user_module_ids.is_empty() {
            return Ok(org_slugs);
        }

        // 6. Intersect with the organization set: a grant can never reach
        //    past what the organization has enabled.
        let user_slugs: HashSet<ModuleSlug> = org_modules
            .iter()
            .filter(|m| user_module_ids.contains(&m.id))
            .map(|m| m.slug.clone())
            .collect();
        Ok(intersect_with_org(&org_slugs, &user_slugs))
    }
}

/// Intersect the user's resolved set with the organization set, preserving
/// the organization ordering for deterministic output.
pub fn intersect_with_org(
    org_modules: &[ModuleSlug],
    user_modules: &HashSet<ModuleSlug>,
) -> Vec<ModuleSlug> {
    org_modules
        .iter()
        .filter(|slug| user_modules.contains(slug))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn slugs(names: &[&'static str]) -> Vec<ModuleSlug> {
        names.iter().map(|n| ModuleSlug::new(*n)).collect()
    }

    #[test]
    fn intersection_preserves_org_order() {
        let org = slugs(&["a", "b", "c"]);
        let user: HashSet<ModuleSlug> = slugs(&["c", "a"]).into_iter().collect();
        assert_eq!(intersect_with_org(&org, &user), slugs(&["a", "c"]));
    }

    proptest! {
        #[test]
        fn intersection_is_bounded_by_org_set(
            org in proptest::collection::vec("[a-z]{1,8}", 0..12),
            user in proptest::collection::hash_set("[a-z]{1,8}", 0..12),
        ) {
            let org: Vec<ModuleSlug> = org.into_iter().map(ModuleSlug::from).collect();
            let user: HashSet<ModuleSlug> = user.into_iter().map(ModuleSlug::from).collect();

            let result = intersect_with_org(&org, &user);
            for slug in &result {
                prop_assert!(org.contains(slug));
                prop_assert!(user.contains(slug));
            }
        }

        #[test]
        fn intersection_is_idempotent(
            org in proptest::collection::vec("[a-z]{1,8}", 0..12),
            user in proptest::collection::hash_set("[a-z]{1,8}", 0..12),
        ) {
            let org: Vec<ModuleSlug> = org.into_iter().map(ModuleSlug::from).collect();
            let user: HashSet<ModuleSlug> = user.into_iter().map(ModuleSlug::from).collect();

            let once = intersect_with_org(&org, &user);
            let twice = intersect_with_org(&once, &user);
            prop_assert_eq!(once, twice);
        }
    }
}
