use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use tokio::runtime::Runtime;

use atrium_core::{ModuleSlug, OrganizationSlug, RoleSlug, Scope, TeamSlug};
use atrium_directory::store::{
    ModuleStore, OrganizationStore, RoleStore, TeamStore, UserStore,
};
use atrium_directory::{
    InMemoryDirectory, Membership, Module, Organization, OrganizationModule, Resolver, Role,
    RoleAssignment, RoleModuleGrant, Team, TeamMembership, TeamModuleGrant, TeamRole, User,
};

struct Fixture {
    dir: InMemoryDirectory,
    user: User,
    org: Organization,
}

/// Build an organization with `modules` enabled modules, the user spread
/// across `teams` restricted teams and holding `roles` roles with one module
/// grant each.
async fn build_fixture(modules: usize, teams: usize, roles: usize) -> Fixture {
    let now = Utc::now();
    let dir = InMemoryDirectory::new();

    let org = Organization::new("bench", OrganizationSlug::new("bench"), now);
    dir.insert_organization(org.clone()).await.unwrap();

    let user = User::new("bench@example.com", "Bench", "User", "hash", now);
    dir.insert_user(user.clone()).await.unwrap();
    dir.insert_membership(Membership::new(user.id, org.id, now))
        .await
        .unwrap();

    let mut module_rows = Vec::new();
    for i in 0..modules {
        let module = Module::new(
            format!("M{i}"),
            format!("module-{i}"),
            ModuleSlug::from(format!("module-{i}")),
        );
        dir.insert_module(module.clone()).await.unwrap();
        dir.upsert_enablement(OrganizationModule::new(org.id, module.id, now))
            .await
            .unwrap();
        module_rows.push(module);
    }

    for i in 0..teams {
        let team = Team::new(
            org.id,
            format!("team-{i}"),
            TeamSlug::from(format!("team-{i}")),
            user.id,
            now,
        );
        dir.insert_team(team.clone()).await.unwrap();
        dir.upsert_team_membership(TeamMembership::new(
            team.id,
            user.id,
            TeamRole::Member,
            None,
            now,
        ))
        .await
        .unwrap();
        let module = &module_rows[i % module_rows.len()];
        dir.set_team_module_grants(
            team.id,
            vec![TeamModuleGrant {
                team_id: team.id,
                module_id: module.id,
                is_active: true,
            }],
        )
        .await
        .unwrap();
    }

    for i in 0..roles {
        let role = Role::new(
            Scope::Organization(org.id),
            format!("role-{i}"),
            RoleSlug::from(format!("role-{i}")),
        );
        dir.insert_role(role.clone()).await.unwrap();
        dir.assign_role(RoleAssignment {
            user_id: user.id,
            role_id: role.id,
            organization_id: org.id,
        })
        .await
        .unwrap();
        let module = &module_rows[(i + 1) % module_rows.len()];
        dir.set_role_module_grant(RoleModuleGrant {
            role_id: role.id,
            module_id: module.id,
            organization_id: org.id,
            has_access: true,
            granted_by: None,
        })
        .await
        .unwrap();
    }

    Fixture { dir, user, org }
}

fn bench_accessible_modules(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("accessible_modules");

    for size in [4_usize, 16, 64] {
        let fixture = rt.block_on(build_fixture(size, size / 2 + 1, size / 2 + 1));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &fixture, |b, fixture| {
            b.iter(|| {
                rt.block_on(async {
                    let resolver = Resolver::new(&fixture.dir);
                    let modules = resolver
                        .accessible_modules(fixture.user.id, fixture.org.id, Utc::now())
                        .await
                        .unwrap();
                    black_box(modules)
                })
            })
        });
    }

    group.finish();
}

fn bench_resolve_permissions(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let fixture = rt.block_on(build_fixture(16, 4, 8));

    c.bench_function("resolve_permissions", |b| {
        b.iter(|| {
            rt.block_on(async {
                let resolver = Resolver::new(&fixture.dir);
                let permissions = resolver
                    .resolve_permissions(fixture.user.id, fixture.org.id)
                    .await
                    .unwrap();
                black_box(permissions)
            })
        })
    });
}

criterion_group!(benches, bench_accessible_modules, bench_resolve_permissions);
criterion_main!(benches);
