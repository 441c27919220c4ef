//! Resolution engine behavior over the in-memory directory.

mod common;

use atrium_core::{OrganizationId, PermissionSlug, Scope};
use atrium_directory::store::{RoleStore, UserStore};
use atrium_directory::Resolver;

use common::{slugs, Harness};

#[tokio::test]
async fn non_member_resolves_to_nothing() {
    let h = Harness::new();
    let user = h.user("outsider@example.com").await;
    let org = h.organization("acme").await;

    // The user holds a role pivoted to a *different* organization.
    let other = h.organization("globex").await;
    h.join(&user, &other).await;
    let role = h.role(Scope::Organization(other.id), "member").await;
    h.assign(&user, &role, &other).await;

    let resolver = Resolver::new(&h.dir);
    assert!(resolver.resolve_permissions(user.id, org.id).await.unwrap().is_empty());
    assert!(!resolver
        .has_role_in_organization(user.id, org.id, &["member"])
        .await
        .unwrap());
}

#[tokio::test]
async fn unknown_organization_yields_empty_not_error() {
    let h = Harness::new();
    let user = h.user("user@example.com").await;

    let resolver = Resolver::new(&h.dir);
    let permissions = resolver
        .resolve_permissions(user.id, OrganizationId::new())
        .await
        .unwrap();
    assert!(permissions.is_empty());
}

#[tokio::test]
async fn global_role_permission_is_visible_in_every_member_organization() {
    let h = Harness::new();
    let user = h.user("carol@example.com").await;
    let org_a = h.organization("acme").await;
    let org_b = h.organization("globex").await;
    h.join(&user, &org_a).await;
    h.join(&user, &org_b).await;

    let auditor = h.role(Scope::Global, "auditor").await;
    let perm = h.permission(Scope::Global, "ledger.read").await;
    h.grant_role_permission(&auditor, &perm).await;
    // Assigned under org A's pivot only; the global scope carries it to B.
    h.assign(&user, &auditor, &org_a).await;

    let resolver = Resolver::new(&h.dir);
    for org in [&org_a, &org_b] {
        let permissions = resolver.resolve_permissions(user.id, org.id).await.unwrap();
        assert!(
            permissions.iter().any(|p| p.slug.as_str() == "ledger.read"),
            "missing in {}",
            org.slug
        );
    }
}

#[tokio::test]
async fn direct_grant_short_circuits_before_roles() {
    let h = Harness::new();
    let user = h.user("dave@example.com").await;
    let org = h.organization("acme").await;
    h.join(&user, &org).await;

    let perm = h.permission(Scope::Organization(org.id), "invoices.read").await;
    h.dir.grant_user_permission(user.id, perm.id).await.unwrap();

    let resolver = Resolver::new(&h.dir);
    assert!(resolver
        .has_permission_in_organization(user.id, org.id, &PermissionSlug::new("invoices.read"))
        .await
        .unwrap());
    assert!(!resolver
        .has_permission_in_organization(user.id, org.id, &PermissionSlug::new("invoices.write"))
        .await
        .unwrap());
}

#[tokio::test]
async fn duplicate_slug_across_scopes_yields_both_roles() {
    let h = Harness::new();
    let user = h.user("erin@example.com").await;
    let org = h.organization("acme").await;
    h.join(&user, &org).await;

    let global = h.role(Scope::Global, "support").await;
    // Same slug, different scope: both are independently valid rows.
    let local = atrium_directory::Role::new(
        Scope::Organization(org.id),
        "support",
        atrium_core::RoleSlug::new("support"),
    );
    h.dir.insert_role(local.clone()).await.unwrap();
    h.assign(&user, &global, &org).await;
    h.assign(&user, &local, &org).await;

    let resolver = Resolver::new(&h.dir);
    let roles = resolver.roles_in_organization(user.id, org.id).await.unwrap();
    assert_eq!(roles.iter().filter(|r| r.slug.as_str() == "support").count(), 2);
}

#[tokio::test]
async fn module_resolution_is_idempotent() {
    let h = Harness::new();
    let user = h.user("frank@example.com").await;
    let org = h.organization("acme").await;
    h.join(&user, &org).await;

    let crm = h.module("crm").await;
    let inventory = h.module("inventory").await;
    let payroll = h.module("payroll").await;
    for module in [&crm, &inventory, &payroll] {
        h.enable(&org, module).await;
    }
    let team = h.team(&org, "platform", &user).await;
    h.restrict_team(&team, &[&crm]).await;

    let resolver = Resolver::new(&h.dir);
    let first = resolver.accessible_modules(user.id, org.id, h.now).await.unwrap();
    let second = resolver.accessible_modules(user.id, org.id, h.now).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn unrestricted_team_defaults_open_to_the_full_org_set() {
    let h = Harness::new();
    let member = h.user("gina@example.com").await;
    let owner = h.user("owner@example.com").await;
    let org = h.organization("acme").await;
    h.join(&member, &org).await;
    h.join(&owner, &org).await;

    for slug in ["a", "b", "c"] {
        let module = h.module(slug).await;
        h.enable(&org, &module).await;
    }
    let team = h.team(&org, "everyone", &owner).await;
    h.add_to_team(&team, &member, atrium_directory::TeamRole::Member).await;

    let resolver = Resolver::new(&h.dir);
    let modules = resolver.accessible_modules(member.id, org.id, h.now).await.unwrap();
    assert_eq!(modules, slugs(&["a", "b", "c"]));
}

#[tokio::test]
async fn team_and_role_grants_union_then_intersect_with_org() {
    let h = Harness::new();
    let user = h.user("harry@example.com").await;
    let owner = h.user("owner@example.com").await;
    let org = h.organization("acme").await;
    h.join(&user, &org).await;
    h.join(&owner, &org).await;

    let a = h.module("a").await;
    let b = h.module("b").await;
    let c = h.module("c").await;
    for module in [&a, &b, &c] {
        h.enable(&org, module).await;
    }

    let team = h.team(&org, "ops", &owner).await;
    h.add_to_team(&team, &user, atrium_directory::TeamRole::Member).await;
    h.restrict_team(&team, &[&a]).await;

    let role = h.role(Scope::Organization(org.id), "analyst").await;
    h.assign(&user, &role, &org).await;
    h.grant_role_module(&role, &b, &org).await;

    let resolver = Resolver::new(&h.dir);
    let modules = resolver.accessible_modules(user.id, org.id, h.now).await.unwrap();
    // Union {a} ∪ {b}, then intersect with {a,b,c}: c is excluded even though
    // no explicit rule denies it.
    assert_eq!(modules, slugs(&["a", "b"]));
}

#[tokio::test]
async fn owner_in_restricted_team_still_gets_the_full_org_set() {
    let h = Harness::new();
    let owner = h.user("irene@example.com").await;
    let org = h.organization("acme").await;
    h.join(&owner, &org).await;

    let a = h.module("a").await;
    let b = h.module("b").await;
    let c = h.module("c").await;
    for module in [&a, &b, &c] {
        h.enable(&org, module).await;
    }

    let owner_role = h.role(Scope::Organization(org.id), "owner").await;
    h.assign(&owner, &owner_role, &org).await;

    let team = h.team(&org, "narrow", &owner).await;
    h.restrict_team(&team, &[&a]).await;

    let resolver = Resolver::new(&h.dir);
    let modules = resolver.accessible_modules(owner.id, org.id, h.now).await.unwrap();
    assert_eq!(modules, slugs(&["a", "b", "c"]));
}

#[tokio::test]
async fn super_admin_flag_bypasses_all_restrictions() {
    let h = Harness::new();
    let root = h.super_admin("root@example.com").await;
    let org = h.organization("acme").await;

    let a = h.module("a").await;
    h.enable(&org, &a).await;

    // Not even a member; the flag is an operational bypass.
    let resolver = Resolver::new(&h.dir);
    let modules = resolver.accessible_modules(root.id, org.id, h.now).await.unwrap();
    assert_eq!(modules, slugs(&["a"]));
}

#[tokio::test]
async fn no_restriction_sources_defaults_to_full_access() {
    let h = Harness::new();
    let user = h.user("jan@example.com").await;
    let org = h.organization("acme").await;
    h.join(&user, &org).await;

    let a = h.module("a").await;
    let b = h.module("b").await;
    h.enable(&org, &a).await;
    h.enable(&org, &b).await;

    let resolver = Resolver::new(&h.dir);
    let modules = resolver.accessible_modules(user.id, org.id, h.now).await.unwrap();
    assert_eq!(modules, slugs(&["a", "b"]));
}

#[tokio::test]
async fn expired_enablement_is_excluded() {
    use atrium_directory::store::ModuleStore;
    use atrium_directory::OrganizationModule;

    let h = Harness::new();
    let user = h.user("kay@example.com").await;
    let org = h.organization("acme").await;
    h.join(&user, &org).await;

    let a = h.module("a").await;
    let b = h.module("b").await;
    h.enable(&org, &a).await;
    let mut row = OrganizationModule::new(org.id, b.id, h.now);
    row.expires_at = Some(h.now - chrono::Duration::days(1));
    h.dir.upsert_enablement(row).await.unwrap();

    let resolver = Resolver::new(&h.dir);
    let modules = resolver.accessible_modules(user.id, org.id, h.now).await.unwrap();
    assert_eq!(modules, slugs(&["a"]));
}

#[tokio::test]
async fn super_admin_flag_never_grants_global_catalog_management() {
    let h = Harness::new();
    let root = h.super_admin("root@example.com").await;
    let admin = h.user("admin@example.com").await;
    let org = h.organization("acme").await;
    h.join(&admin, &org).await;

    let global_admin = h.role(Scope::Global, "admin").await;
    h.assign(&admin, &global_admin, &org).await;

    let resolver = Resolver::new(&h.dir);
    assert!(!resolver.can_manage_global(&root).await.unwrap());
    let admin_record = h.dir.user(admin.id).await.unwrap().unwrap();
    assert!(resolver.can_manage_global(&admin_record).await.unwrap());
    assert!(resolver.ensure_can_manage_global(&root).await.is_err());
}
