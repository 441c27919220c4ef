//! Shared fixture helpers for directory integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Utc};

use atrium_core::{ModuleSlug, OrganizationSlug, PermissionSlug, RoleSlug, Scope, TeamSlug};
use atrium_directory::store::{
    ModuleStore, OrganizationStore, RoleStore, TeamStore, UserStore,
};
use atrium_directory::{
    InMemoryDirectory, Membership, Module, Organization, OrganizationModule, Permission, Role,
    RoleAssignment, RoleModuleGrant, Team, TeamMembership, TeamModuleGrant, TeamRole, User,
};

pub struct Harness {
    pub dir: InMemoryDirectory,
    pub now: DateTime<Utc>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: InMemoryDirectory::new(),
            now: Utc::now(),
        }
    }

    pub async fn user(&self, email: &str) -> User {
        let user = User::new(email, "Test", "User", "hash", self.now);
        self.dir.insert_user(user.clone()).await.unwrap();
        user
    }

    pub async fn super_admin(&self, email: &str) -> User {
        let mut user = User::new(email, "Root", "Operator", "hash", self.now);
        user.is_super_admin = true;
        self.dir.insert_user(user.clone()).await.unwrap();
        user
    }

    pub async fn organization(&self, slug: &'static str) -> Organization {
        let org = Organization::new(slug, OrganizationSlug::new(slug), self.now);
        self.dir.insert_organization(org.clone()).await.unwrap();
        org
    }

    pub async fn join(&self, user: &User, org: &Organization) {
        self.dir
            .insert_membership(Membership::new(user.id, org.id, self.now))
            .await
            .unwrap();
    }

    pub async fn module(&self, slug: &'static str) -> Module {
        let module = Module::new(slug.to_uppercase(), slug, ModuleSlug::new(slug));
        self.dir.insert_module(module.clone()).await.unwrap();
        module
    }

    pub async fn enable(&self, org: &Organization, module: &Module) {
        self.dir
            .upsert_enablement(OrganizationModule::new(org.id, module.id, self.now))
            .await
            .unwrap();
    }

    pub async fn role(&self, scope: Scope, slug: &'static str) -> Role {
        let role = Role::new(scope, slug, RoleSlug::new(slug));
        self.dir.insert_role(role.clone()).await.unwrap();
        role
    }

    pub async fn assign(&self, user: &User, role: &Role, org: &Organization) {
        self.dir
            .assign_role(RoleAssignment {
                user_id: user.id,
                role_id: role.id,
                organization_id: org.id,
            })
            .await
            .unwrap();
    }

    pub async fn permission(&self, scope: Scope, slug: &'static str) -> Permission {
        let permission = Permission::new(scope, slug, PermissionSlug::new(slug));
        self.dir.insert_permission(permission.clone()).await.unwrap();
        permission
    }

    pub async fn grant_role_permission(&self, role: &Role, permission: &Permission) {
        self.dir
            .grant_role_permission(role.id, permission.id)
            .await
            .unwrap();
    }

    pub async fn grant_role_module(&self, role: &Role, module: &Module, org: &Organization) {
        self.dir
            .set_role_module_grant(RoleModuleGrant {
                role_id: role.id,
                module_id: module.id,
                organization_id: org.id,
                has_access: true,
                granted_by: None,
            })
            .await
            .unwrap();
    }

    pub async fn team(&self, org: &Organization, slug: &'static str, owner: &User) -> Team {
        let team = Team::new(org.id, slug, TeamSlug::new(slug), owner.id, self.now);
        self.dir.insert_team(team.clone()).await.unwrap();
        self.dir
            .upsert_team_membership(TeamMembership::new(
                team.id,
                owner.id,
                TeamRole::Owner,
                None,
                self.now,
            ))
            .await
            .unwrap();
        team
    }

    pub async fn add_to_team(&self, team: &Team, user: &User, role: TeamRole) {
        self.dir
            .upsert_team_membership(TeamMembership::new(team.id, user.id, role, None, self.now))
            .await
            .unwrap();
    }

    pub async fn restrict_team(&self, team: &Team, modules: &[&Module]) {
        let grants = modules
            .iter()
            .map(|m| TeamModuleGrant {
                team_id: team.id,
                module_id: m.id,
                is_active: true,
            })
            .collect();
        self.dir
            .set_team_module_grants(team.id, grants)
            .await
            .unwrap();
    }
}

pub fn slugs(names: &[&'static str]) -> Vec<ModuleSlug> {
    names.iter().map(|n| ModuleSlug::new(*n)).collect()
}
