//! In-memory directory store for tests and local development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use atrium_core::{
    AccessError, AccessResult, ModuleId, ModuleSlug, OrganizationId, OrganizationSlug,
    PermissionId, PermissionSlug, RoleId, RoleSlug, Scope, TeamId, TeamSlug, UserId,
};

use crate::module::{Module, OrganizationModule};
use crate::organization::{Membership, Organization};
use crate::role::{DirectPermissionGrant, Permission, Role, RoleAssignment, RoleModuleGrant};
use crate::store::{ModuleStore, OrganizationStore, RoleStore, TeamStore, UserStore};
use crate::team::{Team, TeamMembership, TeamModuleGrant};
use crate::user::User;

#[derive(Debug, Default)]
struct Inner {
    organizations: HashMap<OrganizationId, Organization>,
    memberships: Vec<Membership>,
    users: HashMap<UserId, User>,
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    role_assignments: Vec<RoleAssignment>,
    role_permissions: Vec<(RoleId, PermissionId)>,
    direct_grants: Vec<DirectPermissionGrant>,
    role_module_grants: Vec<RoleModuleGrant>,
    modules: HashMap<ModuleId, Module>,
    enablements: Vec<OrganizationModule>,
    teams: HashMap<TeamId, Team>,
    team_memberships: Vec<TeamMembership>,
    team_module_grants: Vec<TeamModuleGrant>,
}

/// In-memory directory: every relation in one `RwLock`ed state bag.
///
/// Write-time uniqueness checks mirror what the relational schema enforces
/// with unique indexes.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: RwLock<Inner>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> AccessResult<T> {
        let guard = self
            .inner
            .read()
            .map_err(|_| AccessError::internal("directory lock poisoned"))?;
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> AccessResult<T>) -> AccessResult<T> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| AccessError::internal("directory lock poisoned"))?;
        f(&mut guard)
    }
}

#[async_trait]
impl OrganizationStore for InMemoryDirectory {
    async fn organization(&self, id: OrganizationId) -> AccessResult<Option<Organization>> {
        self.read(|s| s.organizations.get(&id).cloned())
    }

    async fn organization_by_slug(
        &self,
        slug: &OrganizationSlug,
    ) -> AccessResult<Option<Organization>> {
        self.read(|s| s.organizations.values().find(|o| &o.slug == slug).cloned())
    }

    async fn insert_organization(&self, organization: Organization) -> AccessResult<()> {
        self.write(|s| {
            if s.organizations.values().any(|o| o.slug == organization.slug) {
                return Err(AccessError::conflict(format!(
                    "organization slug '{}' already exists",
                    organization.slug
                )));
            }
            s.organizations.insert(organization.id, organization);
            Ok(())
        })
    }

    async fn update_organization(&self, organization: Organization) -> AccessResult<()> {
        self.write(|s| {
            if !s.organizations.contains_key(&organization.id) {
                return Err(AccessError::not_found("organization"));
            }
            s.organizations.insert(organization.id, organization);
            Ok(())
        })
    }

    async fn membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<Option<Membership>> {
        self.read(|s| {
            s.memberships
                .iter()
                .find(|m| m.user_id == user_id && m.organization_id == organization_id)
                .cloned()
        })
    }

    async fn memberships_for_user(&self, user_id: UserId) -> AccessResult<Vec<Membership>> {
        self.read(|s| {
            s.memberships
                .iter()
                .filter(|m| m.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    async fn insert_membership(&self, membership: Membership) -> AccessResult<()> {
        self.write(|s| {
            let exists = s.memberships.iter().any(|m| {
                m.user_id == membership.user_id
                    && m.organization_id == membership.organization_id
            });
            if exists {
                return Err(AccessError::conflict(
                    "user is already a member of this organization",
                ));
            }
            s.memberships.push(membership);
            Ok(())
        })
    }

    async fn remove_membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<()> {
        self.write(|s| {
            s.memberships
                .retain(|m| !(m.user_id == user_id && m.organization_id == organization_id));
            Ok(())
        })
    }

    async fn active_member_count(&self, organization_id: OrganizationId) -> AccessResult<u32> {
        self.read(|s| {
            s.memberships
                .iter()
                .filter(|m| m.organization_id == organization_id && m.is_active)
                .count() as u32
        })
    }

    async fn member_count(&self, organization_id: OrganizationId) -> AccessResult<u32> {
        self.read(|s| {
            s.memberships
                .iter()
                .filter(|m| m.organization_id == organization_id)
                .count() as u32
        })
    }
}

#[async_trait]
impl UserStore for InMemoryDirectory {
    async fn user(&self, id: UserId) -> AccessResult<Option<User>> {
        self.read(|s| s.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> AccessResult<Option<User>> {
        let email = email.trim().to_lowercase();
        self.read(|s| s.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: User) -> AccessResult<()> {
        self.write(|s| {
            if s.users.values().any(|u| u.email == user.email) {
                return Err(AccessError::conflict(format!(
                    "email '{}' already registered",
                    user.email
                )));
            }
            s.users.insert(user.id, user);
            Ok(())
        })
    }

    async fn update_user(&self, user: User) -> AccessResult<()> {
        self.write(|s| {
            if !s.users.contains_key(&user.id) {
                return Err(AccessError::not_found("user"));
            }
            s.users.insert(user.id, user);
            Ok(())
        })
    }
}

#[async_trait]
impl RoleStore for InMemoryDirectory {
    async fn role(&self, id: RoleId) -> AccessResult<Option<Role>> {
        self.read(|s| s.roles.get(&id).cloned())
    }

    async fn find_role(&self, scope: Scope, slug: &RoleSlug) -> AccessResult<Option<Role>> {
        self.read(|s| {
            s.roles
                .values()
                .find(|r| r.scope == scope && &r.slug == slug)
                .cloned()
        })
    }

    async fn insert_role(&self, role: Role) -> AccessResult<()> {
        self.write(|s| {
            if s.roles
                .values()
                .any(|r| r.scope == role.scope && r.slug == role.slug)
            {
                return Err(AccessError::conflict(format!(
                    "role '{}' already exists in scope {}",
                    role.slug, role.scope
                )));
            }
            s.roles.insert(role.id, role);
            Ok(())
        })
    }

    async fn permission(&self, id: PermissionId) -> AccessResult<Option<Permission>> {
        self.read(|s| s.permissions.get(&id).cloned())
    }

    async fn find_permission(
        &self,
        scope: Scope,
        slug: &PermissionSlug,
    ) -> AccessResult<Option<Permission>> {
        self.read(|s| {
            s.permissions
                .values()
                .find(|p| p.scope == scope && &p.slug == slug)
                .cloned()
        })
    }

    async fn insert_permission(&self, permission: Permission) -> AccessResult<()> {
        self.write(|s| {
            if s.permissions
                .values()
                .any(|p| p.scope == permission.scope && p.slug == permission.slug)
            {
                return Err(AccessError::conflict(format!(
                    "permission '{}' already exists in scope {}",
                    permission.slug, permission.scope
                )));
            }
            s.permissions.insert(permission.id, permission);
            Ok(())
        })
    }

    async fn assignments_for_user(&self, user_id: UserId) -> AccessResult<Vec<RoleAssignment>> {
        self.read(|s| {
            s.role_assignments
                .iter()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    async fn assign_role(&self, assignment: RoleAssignment) -> AccessResult<()> {
        self.write(|s| {
            let exists = s.role_assignments.iter().any(|a| {
                a.user_id == assignment.user_id
                    && a.role_id == assignment.role_id
                    && a.organization_id == assignment.organization_id
            });
            if !exists {
                s.role_assignments.push(assignment);
            }
            Ok(())
        })
    }

    async fn unassign_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
        organization_id: OrganizationId,
    ) -> AccessResult<()> {
        self.write(|s| {
            s.role_assignments.retain(|a| {
                !(a.user_id == user_id
                    && a.role_id == role_id
                    && a.organization_id == organization_id)
            });
            Ok(())
        })
    }

    async fn unassign_all(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<()> {
        self.write(|s| {
            s.role_assignments
                .retain(|a| !(a.user_id == user_id && a.organization_id == organization_id));
            Ok(())
        })
    }

    async fn permissions_for_role(&self, role_id: RoleId) -> AccessResult<Vec<Permission>> {
        self.read(|s| {
            s.role_permissions
                .iter()
                .filter(|(r, _)| *r == role_id)
                .filter_map(|(_, p)| s.permissions.get(p).cloned())
                .collect()
        })
    }

    async fn grant_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AccessResult<()> {
        self.write(|s| {
            if !s.role_permissions.contains(&(role_id, permission_id)) {
                s.role_permissions.push((role_id, permission_id));
            }
            Ok(())
        })
    }

    async fn revoke_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AccessResult<()> {
        self.write(|s| {
            s.role_permissions
                .retain(|entry| entry != &(role_id, permission_id));
            Ok(())
        })
    }

    async fn direct_grants_for_user(&self, user_id: UserId) -> AccessResult<Vec<Permission>> {
        self.read(|s| {
            s.direct_grants
                .iter()
                .filter(|g| g.user_id == user_id)
                .filter_map(|g| s.permissions.get(&g.permission_id).cloned())
                .collect()
        })
    }

    async fn grant_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AccessResult<()> {
        self.write(|s| {
            let grant = DirectPermissionGrant {
                user_id,
                permission_id,
            };
            if !s.direct_grants.contains(&grant) {
                s.direct_grants.push(grant);
            }
            Ok(())
        })
    }

    async fn revoke_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AccessResult<()> {
        self.write(|s| {
            s.direct_grants
                .retain(|g| !(g.user_id == user_id && g.permission_id == permission_id));
            Ok(())
        })
    }

    async fn module_grants_for_role(
        &self,
        role_id: RoleId,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<ModuleId>> {
        self.read(|s| {
            s.role_module_grants
                .iter()
                .filter(|g| {
                    g.role_id == role_id
                        && g.organization_id == organization_id
                        && g.has_access
                })
                .map(|g| g.module_id)
                .collect()
        })
    }

    async fn set_role_module_grant(&self, grant: RoleModuleGrant) -> AccessResult<()> {
        self.write(|s| {
            s.role_module_grants.retain(|g| {
                !(g.role_id == grant.role_id
                    && g.module_id == grant.module_id
                    && g.organization_id == grant.organization_id)
            });
            s.role_module_grants.push(grant);
            Ok(())
        })
    }
}

#[async_trait]
impl ModuleStore for InMemoryDirectory {
    async fn module(&self, id: ModuleId) -> AccessResult<Option<Module>> {
        self.read(|s| s.modules.get(&id).cloned())
    }

    async fn module_by_slug(&self, slug: &ModuleSlug) -> AccessResult<Option<Module>> {
        self.read(|s| s.modules.values().find(|m| &m.slug == slug).cloned())
    }

    async fn all_modules(&self) -> AccessResult<Vec<Module>> {
        self.read(|s| {
            let mut modules: Vec<Module> = s.modules.values().cloned().collect();
            modules.sort_by_key(|m| (m.display_order, m.slug.clone()));
            modules
        })
    }

    async fn insert_module(&self, module: Module) -> AccessResult<()> {
        self.write(|s| {
            if s.modules.values().any(|m| m.slug == module.slug) {
                return Err(AccessError::conflict(format!(
                    "module slug '{}' already exists",
                    module.slug
                )));
            }
            s.modules.insert(module.id, module);
            Ok(())
        })
    }

    async fn enablements(
        &self,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<(Module, OrganizationModule)>> {
        self.read(|s| {
            s.enablements
                .iter()
                .filter(|e| e.organization_id == organization_id)
                .filter_map(|e| s.modules.get(&e.module_id).map(|m| (m.clone(), e.clone())))
                .collect()
        })
    }

    async fn upsert_enablement(&self, enablement: OrganizationModule) -> AccessResult<()> {
        self.write(|s| {
            s.enablements.retain(|e| {
                !(e.organization_id == enablement.organization_id
                    && e.module_id == enablement.module_id)
            });
            s.enablements.push(enablement);
            Ok(())
        })
    }
}

#[async_trait]
impl TeamStore for InMemoryDirectory {
    async fn team(&self, id: TeamId) -> AccessResult<Option<Team>> {
        self.read(|s| s.teams.get(&id).cloned())
    }

    async fn team_by_slug(
        &self,
        organization_id: OrganizationId,
        slug: &TeamSlug,
    ) -> AccessResult<Option<Team>> {
        self.read(|s| {
            s.teams
                .values()
                .find(|t| t.organization_id == organization_id && &t.slug == slug)
                .cloned()
        })
    }

    async fn teams_in_organization(
        &self,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<Team>> {
        self.read(|s| {
            let mut teams: Vec<Team> = s
                .teams
                .values()
                .filter(|t| t.organization_id == organization_id)
                .cloned()
                .collect();
            teams.sort_by_key(|t| t.slug.clone());
            teams
        })
    }

    async fn insert_team(&self, team: Team) -> AccessResult<()> {
        self.write(|s| {
            let duplicate = s
                .teams
                .values()
                .any(|t| t.organization_id == team.organization_id && t.slug == team.slug);
            if duplicate {
                return Err(AccessError::conflict(format!(
                    "a team with slug '{}' already exists in this organization",
                    team.slug
                )));
            }
            s.teams.insert(team.id, team);
            Ok(())
        })
    }

    async fn update_team(&self, team: Team) -> AccessResult<()> {
        self.write(|s| {
            if !s.teams.contains_key(&team.id) {
                return Err(AccessError::not_found("team"));
            }
            let duplicate = s.teams.values().any(|t| {
                t.id != team.id && t.organization_id == team.organization_id && t.slug == team.slug
            });
            if duplicate {
                return Err(AccessError::conflict(format!(
                    "a team with slug '{}' already exists in this organization",
                    team.slug
                )));
            }
            s.teams.insert(team.id, team);
            Ok(())
        })
    }

    async fn delete_team(&self, id: TeamId) -> AccessResult<()> {
        self.write(|s| {
            if s.teams.remove(&id).is_none() {
                return Err(AccessError::not_found("team"));
            }
            s.team_memberships.retain(|m| m.team_id != id);
            s.team_module_grants.retain(|g| g.team_id != id);
            Ok(())
        })
    }

    async fn child_team_count(&self, id: TeamId) -> AccessResult<u32> {
        self.read(|s| {
            s.teams
                .values()
                .filter(|t| t.parent_team_id == Some(id))
                .count() as u32
        })
    }

    async fn team_memberships_for_user(
        &self,
        user_id: UserId,
    ) -> AccessResult<Vec<TeamMembership>> {
        self.read(|s| {
            s.team_memberships
                .iter()
                .filter(|m| m.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    async fn members(&self, team_id: TeamId) -> AccessResult<Vec<TeamMembership>> {
        self.read(|s| {
            s.team_memberships
                .iter()
                .filter(|m| m.team_id == team_id)
                .cloned()
                .collect()
        })
    }

    async fn upsert_team_membership(&self, membership: TeamMembership) -> AccessResult<()> {
        self.write(|s| {
            s.team_memberships.retain(|m| {
                !(m.team_id == membership.team_id && m.user_id == membership.user_id)
            });
            s.team_memberships.push(membership);
            Ok(())
        })
    }

    async fn remove_team_membership(&self, team_id: TeamId, user_id: UserId) -> AccessResult<()> {
        self.write(|s| {
            s.team_memberships
                .retain(|m| !(m.team_id == team_id && m.user_id == user_id));
            Ok(())
        })
    }

    async fn module_grant_rows(&self, team_id: TeamId) -> AccessResult<Vec<TeamModuleGrant>> {
        self.read(|s| {
            s.team_module_grants
                .iter()
                .filter(|g| g.team_id == team_id)
                .cloned()
                .collect()
        })
    }

    async fn set_team_module_grants(
        &self,
        team_id: TeamId,
        grants: Vec<TeamModuleGrant>,
    ) -> AccessResult<()> {
        self.write(|s| {
            s.team_module_grants.retain(|g| g.team_id != team_id);
            s.team_module_grants
                .extend(grants.into_iter().filter(|g| g.team_id == team_id));
            Ok(())
        })
    }
}
