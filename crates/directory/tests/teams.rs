//! Team hierarchy invariants: leadership retention, childless deletion,
//! reparenting cycles.

mod common;

use atrium_core::AccessError;
use atrium_directory::store::TeamStore;
use atrium_directory::{NewTeam, TeamRole, TeamService};

use common::Harness;

fn new_team(name: &str) -> NewTeam {
    NewTeam {
        name: name.to_string(),
        slug: None,
        description: None,
        color: None,
        parent_team_id: None,
        metadata: serde_json::Value::Null,
    }
}

#[tokio::test]
async fn creator_becomes_team_owner() {
    let h = Harness::new();
    let user = h.user("ann@example.com").await;
    let org = h.organization("acme").await;
    h.join(&user, &org).await;

    let service = TeamService::new(&h.dir);
    let team = service
        .create_team(user.id, org.id, new_team("Platform Engineering"), h.now)
        .await
        .unwrap();

    assert_eq!(team.slug.as_str(), "platform-engineering");
    let members = h.dir.members(team.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, user.id);
    assert_eq!(members[0].role, TeamRole::Owner);
}

#[tokio::test]
async fn duplicate_team_slug_in_organization_is_rejected() {
    let h = Harness::new();
    let user = h.user("ann@example.com").await;
    let org = h.organization("acme").await;
    h.join(&user, &org).await;

    let service = TeamService::new(&h.dir);
    service
        .create_team(user.id, org.id, new_team("Ops"), h.now)
        .await
        .unwrap();
    let err = service
        .create_team(user.id, org.id, new_team("Ops"), h.now)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::ConflictInvariant(_)));
}

#[tokio::test]
async fn removing_the_last_leader_is_rejected_and_state_unchanged() {
    let h = Harness::new();
    let leader = h.user("leader@example.com").await;
    let member = h.user("member@example.com").await;
    let org = h.organization("acme").await;
    h.join(&leader, &org).await;
    h.join(&member, &org).await;

    let service = TeamService::new(&h.dir);
    let team = service
        .create_team(leader.id, org.id, new_team("Ops"), h.now)
        .await
        .unwrap();
    service
        .add_member(leader.id, team.id, member.id, TeamRole::Member, h.now)
        .await
        .unwrap();

    let err = service
        .remove_member(leader.id, team.id, leader.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::ConflictInvariant(_)));

    // Membership and role are unchanged after the rejected attempt.
    let members = h.dir.members(team.id).await.unwrap();
    let retained = members.iter().find(|m| m.user_id == leader.id).unwrap();
    assert_eq!(retained.role, TeamRole::Owner);
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn demoting_the_last_leader_is_rejected() {
    let h = Harness::new();
    let leader = h.user("leader@example.com").await;
    let org = h.organization("acme").await;
    h.join(&leader, &org).await;

    let service = TeamService::new(&h.dir);
    let team = service
        .create_team(leader.id, org.id, new_team("Ops"), h.now)
        .await
        .unwrap();

    let err = service
        .update_member_role(leader.id, team.id, leader.id, TeamRole::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::ConflictInvariant(_)));

    let members = h.dir.members(team.id).await.unwrap();
    assert_eq!(members[0].role, TeamRole::Owner);
}

#[tokio::test]
async fn demotion_succeeds_when_another_leader_remains() {
    let h = Harness::new();
    let leader = h.user("leader@example.com").await;
    let second = h.user("second@example.com").await;
    let org = h.organization("acme").await;
    h.join(&leader, &org).await;
    h.join(&second, &org).await;

    let service = TeamService::new(&h.dir);
    let team = service
        .create_team(leader.id, org.id, new_team("Ops"), h.now)
        .await
        .unwrap();
    service
        .add_member(leader.id, team.id, second.id, TeamRole::Manager, h.now)
        .await
        .unwrap();

    service
        .update_member_role(leader.id, team.id, leader.id, TeamRole::Member)
        .await
        .unwrap();
    let members = h.dir.members(team.id).await.unwrap();
    let demoted = members.iter().find(|m| m.user_id == leader.id).unwrap();
    assert_eq!(demoted.role, TeamRole::Member);
}

#[tokio::test]
async fn deleting_a_team_with_children_is_rejected() {
    let h = Harness::new();
    let admin = h.user("admin@example.com").await;
    let org = h.organization("acme").await;
    h.join(&admin, &org).await;
    let admin_role = h.role(atrium_core::Scope::Organization(org.id), "admin").await;
    h.assign(&admin, &admin_role, &org).await;

    let service = TeamService::new(&h.dir);
    let parent = service
        .create_team(admin.id, org.id, new_team("Parent"), h.now)
        .await
        .unwrap();
    let mut child_spec = new_team("Child");
    child_spec.parent_team_id = Some(parent.id);
    let child = service
        .create_team(admin.id, org.id, child_spec, h.now)
        .await
        .unwrap();

    let err = service.delete_team(admin.id, parent.id).await.unwrap_err();
    assert!(matches!(err, AccessError::ConflictInvariant(_)));

    // Both teams remain present after the rejected attempt.
    assert!(h.dir.team(parent.id).await.unwrap().is_some());
    assert!(h.dir.team(child.id).await.unwrap().is_some());

    // Deleting the leaf child, then the parent, succeeds.
    service.delete_team(admin.id, child.id).await.unwrap();
    service.delete_team(admin.id, parent.id).await.unwrap();
}

#[tokio::test]
async fn reparenting_under_a_descendant_is_rejected() {
    let h = Harness::new();
    let admin = h.user("admin@example.com").await;
    let org = h.organization("acme").await;
    h.join(&admin, &org).await;
    let admin_role = h.role(atrium_core::Scope::Organization(org.id), "admin").await;
    h.assign(&admin, &admin_role, &org).await;

    let service = TeamService::new(&h.dir);
    let a = service.create_team(admin.id, org.id, new_team("A"), h.now).await.unwrap();
    let mut b_spec = new_team("B");
    b_spec.parent_team_id = Some(a.id);
    let b = service.create_team(admin.id, org.id, b_spec, h.now).await.unwrap();
    let mut c_spec = new_team("C");
    c_spec.parent_team_id = Some(b.id);
    let c = service.create_team(admin.id, org.id, c_spec, h.now).await.unwrap();

    // A under its grandchild C: cycle, rejected.
    let err = service.reparent(admin.id, a.id, Some(c.id)).await.unwrap_err();
    assert!(matches!(err, AccessError::ConflictInvariant(_)));

    // A under itself: rejected.
    let err = service.reparent(admin.id, a.id, Some(a.id)).await.unwrap_err();
    assert!(matches!(err, AccessError::ConflictInvariant(_)));

    // C to the root: fine.
    service.reparent(admin.id, c.id, None).await.unwrap();
    assert_eq!(h.dir.team(c.id).await.unwrap().unwrap().parent_team_id, None);
}

#[tokio::test]
async fn adding_a_non_organization_member_is_rejected() {
    let h = Harness::new();
    let leader = h.user("leader@example.com").await;
    let outsider = h.user("outsider@example.com").await;
    let org = h.organization("acme").await;
    h.join(&leader, &org).await;

    let service = TeamService::new(&h.dir);
    let team = service
        .create_team(leader.id, org.id, new_team("Ops"), h.now)
        .await
        .unwrap();

    let err = service
        .add_member(leader.id, team.id, outsider.id, TeamRole::Member, h.now)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::ConflictInvariant(_)));
}

#[tokio::test]
async fn non_leader_cannot_manage_membership() {
    let h = Harness::new();
    let leader = h.user("leader@example.com").await;
    let member = h.user("member@example.com").await;
    let org = h.organization("acme").await;
    h.join(&leader, &org).await;
    h.join(&member, &org).await;

    let service = TeamService::new(&h.dir);
    let team = service
        .create_team(leader.id, org.id, new_team("Ops"), h.now)
        .await
        .unwrap();
    service
        .add_member(leader.id, team.id, member.id, TeamRole::Viewer, h.now)
        .await
        .unwrap();

    let err = service
        .remove_member(member.id, team.id, leader.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Authorization { .. }));
}
