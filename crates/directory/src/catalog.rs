//! Role/permission catalog management.
//!
//! Mutating a global-scoped role or permission requires global-administrator
//! authority; the super-admin flag never suffices. Organization-scoped
//! entries are managed by that organization's admins.

use tracing::instrument;

use atrium_core::authority::GLOBAL_ADMIN_ROLE;
use atrium_core::{
    AccessError, AccessResult, ModuleId, OrganizationId, PermissionSlug, RoleSlug, Scope, UserId,
};

use crate::resolve::Resolver;
use crate::role::{Permission, Role, RoleAssignment, RoleModuleGrant};
use crate::store::{DirectoryStore, RoleStore, UserStore};

/// Catalog mutations with scope-aware authority checks.
pub struct CatalogService<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D> CatalogService<'a, D>
where
    D: DirectoryStore + ?Sized,
{
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    fn resolver(&self) -> Resolver<'a, D> {
        Resolver::new(self.directory)
    }

    /// Global scope demands the global-admin role; organization scope demands
    /// that organization's admin role.
    async fn ensure_scope_authority(&self, actor: UserId, scope: Scope) -> AccessResult<()> {
        match scope {
            Scope::Global => {
                let actor = self
                    .directory
                    .user(actor)
                    .await?
                    .ok_or_else(|| AccessError::not_found("user"))?;
                self.resolver().ensure_can_manage_global(&actor).await
            }
            Scope::Organization(organization_id) => {
                if self
                    .resolver()
                    .has_role_in_organization(actor, organization_id, &[GLOBAL_ADMIN_ROLE])
                    .await?
                {
                    Ok(())
                } else {
                    Err(AccessError::forbidden("organization admin role"))
                }
            }
        }
    }

    /// Create a role. (scope, slug) uniqueness is enforced by the store.
    #[instrument(skip(self, name), fields(actor = %actor, slug = %slug))]
    pub async fn create_role(
        &self,
        actor: UserId,
        scope: Scope,
        name: &str,
        slug: RoleSlug,
    ) -> AccessResult<Role> {
        self.ensure_scope_authority(actor, scope).await?;

        let role = Role::new(scope, name, slug);
        self.directory.insert_role(role.clone()).await?;
        Ok(role)
    }

    /// Create a permission under the same scope rule.
    #[instrument(skip(self, name), fields(actor = %actor, slug = %slug))]
    pub async fn create_permission(
        &self,
        actor: UserId,
        scope: Scope,
        name: &str,
        slug: PermissionSlug,
    ) -> AccessResult<Permission> {
        self.ensure_scope_authority(actor, scope).await?;

        let permission = Permission::new(scope, name, slug);
        self.directory.insert_permission(permission.clone()).await?;
        Ok(permission)
    }

    /// Attach a permission to a role; authority follows the role's scope.
    pub async fn grant_permission_to_role(
        &self,
        actor: UserId,
        role_slug: &RoleSlug,
        role_scope: Scope,
        permission_slug: &PermissionSlug,
        permission_scope: Scope,
    ) -> AccessResult<()> {
        self.ensure_scope_authority(actor, role_scope).await?;

        let role = self
            .directory
            .find_role(role_scope, role_slug)
            .await?
            .ok_or_else(|| AccessError::not_found("role"))?;
        let permission = self
            .directory
            .find_permission(permission_scope, permission_slug)
            .await?
            .ok_or_else(|| AccessError::not_found("permission"))?;

        self.directory
            .grant_role_permission(role.id, permission.id)
            .await
    }

    /// Assign a role to a user under an organization pivot.
    ///
    /// The role is looked up global-first, then organization-scoped, the
    /// same resolution order the legacy system used when a bare slug was
    /// given.
    pub async fn assign_role_to_user(
        &self,
        actor: UserId,
        user_id: UserId,
        role_slug: &RoleSlug,
        organization_id: OrganizationId,
    ) -> AccessResult<()> {
        if !self
            .resolver()
            .has_role_in_organization(actor, organization_id, &[GLOBAL_ADMIN_ROLE])
            .await?
        {
            return Err(AccessError::forbidden("organization admin role"));
        }

        let role = match self.directory.find_role(Scope::Global, role_slug).await? {
            Some(role) => role,
            None => self
                .directory
                .find_role(Scope::Organization(organization_id), role_slug)
                .await?
                .ok_or_else(|| AccessError::not_found("role"))?,
        };

        self.directory
            .assign_role(RoleAssignment {
                user_id,
                role_id: role.id,
                organization_id,
            })
            .await
    }

    /// Grant a module to a role for one specific organization (role-module
    /// grants are organization-pinned even for global roles).
    pub async fn grant_module_to_role(
        &self,
        actor: UserId,
        role_slug: &RoleSlug,
        role_scope: Scope,
        module_id: ModuleId,
        organization_id: OrganizationId,
    ) -> AccessResult<()> {
        if !self
            .resolver()
            .has_role_in_organization(actor, organization_id, &[GLOBAL_ADMIN_ROLE])
            .await?
        {
            return Err(AccessError::forbidden("organization admin role"));
        }

        let role = self
            .directory
            .find_role(role_scope, role_slug)
            .await?
            .ok_or_else(|| AccessError::not_found("role"))?;

        self.directory
            .set_role_module_grant(RoleModuleGrant {
                role_id: role.id,
                module_id,
                organization_id,
                has_access: true,
                granted_by: Some(actor),
            })
            .await
    }
}
