//! Catalog authority: global vs organization scope, super-admin exclusion.

mod common;

use atrium_core::{AccessError, PermissionSlug, RoleSlug, Scope};
use atrium_directory::CatalogService;

use common::Harness;

#[tokio::test]
async fn global_admin_manages_the_global_catalog() {
    let h = Harness::new();
    let admin = h.user("admin@example.com").await;
    let org = h.organization("acme").await;
    h.join(&admin, &org).await;

    let global_admin = h.role(Scope::Global, "admin").await;
    h.assign(&admin, &global_admin, &org).await;

    let service = CatalogService::new(&h.dir);
    let role = service
        .create_role(admin.id, Scope::Global, "Auditor", RoleSlug::new("auditor"))
        .await
        .unwrap();
    assert_eq!(role.scope, Scope::Global);

    service
        .create_permission(
            admin.id,
            Scope::Global,
            "Read ledgers",
            PermissionSlug::new("ledger.read"),
        )
        .await
        .unwrap();
    service
        .grant_permission_to_role(
            admin.id,
            &RoleSlug::new("auditor"),
            Scope::Global,
            &PermissionSlug::new("ledger.read"),
            Scope::Global,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn super_admin_flag_cannot_touch_the_global_catalog() {
    let h = Harness::new();
    let root = h.super_admin("root@example.com").await;

    let service = CatalogService::new(&h.dir);
    let err = service
        .create_role(root.id, Scope::Global, "Backdoor", RoleSlug::new("backdoor"))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Authorization { .. }));
}

#[tokio::test]
async fn organization_admin_manages_only_their_scope() {
    let h = Harness::new();
    let admin = h.user("admin@example.com").await;
    let org = h.organization("acme").await;
    h.join(&admin, &org).await;
    let org_admin = h.role(Scope::Organization(org.id), "admin").await;
    h.assign(&admin, &org_admin, &org).await;

    let service = CatalogService::new(&h.dir);

    // Organization scope: allowed.
    service
        .create_role(
            admin.id,
            Scope::Organization(org.id),
            "Analyst",
            RoleSlug::new("analyst"),
        )
        .await
        .unwrap();

    // Global scope: denied.
    let err = service
        .create_role(admin.id, Scope::Global, "Analyst", RoleSlug::new("analyst"))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Authorization { .. }));
}

#[tokio::test]
async fn duplicate_scope_slug_pairs_are_conflicts() {
    let h = Harness::new();
    let admin = h.user("admin@example.com").await;
    let org = h.organization("acme").await;
    h.join(&admin, &org).await;
    let org_admin = h.role(Scope::Organization(org.id), "admin").await;
    h.assign(&admin, &org_admin, &org).await;

    let service = CatalogService::new(&h.dir);
    service
        .create_role(
            admin.id,
            Scope::Organization(org.id),
            "Analyst",
            RoleSlug::new("analyst"),
        )
        .await
        .unwrap();
    let err = service
        .create_role(
            admin.id,
            Scope::Organization(org.id),
            "Analyst again",
            RoleSlug::new("analyst"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::ConflictInvariant(_)));
}

#[tokio::test]
async fn role_assignment_prefers_the_global_role_for_a_bare_slug() {
    let h = Harness::new();
    let admin = h.user("admin@example.com").await;
    let user = h.user("user@example.com").await;
    let org = h.organization("acme").await;
    h.join(&admin, &org).await;
    h.join(&user, &org).await;
    let org_admin = h.role(Scope::Organization(org.id), "admin").await;
    h.assign(&admin, &org_admin, &org).await;

    let global_support = h.role(Scope::Global, "support").await;

    let service = CatalogService::new(&h.dir);
    service
        .assign_role_to_user(admin.id, user.id, &RoleSlug::new("support"), org.id)
        .await
        .unwrap();

    let resolver = atrium_directory::Resolver::new(&h.dir);
    let roles = resolver.roles_in_organization(user.id, org.id).await.unwrap();
    assert!(roles.iter().any(|r| r.id == global_support.id));
}

#[tokio::test]
async fn assigning_an_unknown_role_is_not_found() {
    let h = Harness::new();
    let admin = h.user("admin@example.com").await;
    let user = h.user("user@example.com").await;
    let org = h.organization("acme").await;
    h.join(&admin, &org).await;
    h.join(&user, &org).await;
    let org_admin = h.role(Scope::Organization(org.id), "admin").await;
    h.assign(&admin, &org_admin, &org).await;

    let service = CatalogService::new(&h.dir);
    let err = service
        .assign_role_to_user(admin.id, user.id, &RoleSlug::new("ghost"), org.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::NotFound(_)));
}
