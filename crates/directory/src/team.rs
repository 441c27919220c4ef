//! Team records: organization-scoped grouping with an optional parent team.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atrium_core::{Entity, ModuleId, OrganizationId, TeamId, TeamSlug, UserId};

/// Organization-scoped team.
///
/// # Invariants
/// - `slug` is unique within the organization.
/// - Parent references form a tree (single parent, no cycles). Creation
///   requires an already-persisted parent, so the structure is acyclic by
///   construction; reparenting re-verifies (see [`crate::teams`]).
/// - A team with child teams cannot be deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub organization_id: OrganizationId,
    pub parent_team_id: Option<TeamId>,
    pub name: String,
    pub slug: TeamSlug,
    pub description: Option<String>,
    /// Display color, `#RRGGBB`.
    pub color: Option<String>,
    pub created_by: UserId,
    pub is_active: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn new(
        organization_id: OrganizationId,
        name: impl Into<String>,
        slug: TeamSlug,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TeamId::new(),
            organization_id,
            parent_team_id: None,
            name: name.into(),
            slug,
            description: None,
            color: None,
            created_by,
            is_active: true,
            metadata: serde_json::Value::Null,
            created_at: now,
        }
    }
}

impl Entity for Team {
    type Id = TeamId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Membership role within a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    Manager,
    Member,
    Viewer,
    Billing,
}

impl TeamRole {
    /// Leadership = {owner, admin, manager}: team-management authority.
    pub fn is_leadership(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin | TeamRole::Manager)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Manager => "manager",
            TeamRole::Member => "member",
            TeamRole::Viewer => "viewer",
            TeamRole::Billing => "billing",
        }
    }
}

impl core::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User×Team join row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub role: TeamRole,
    pub invited_by: Option<UserId>,
    pub joined_at: DateTime<Utc>,
}

impl TeamMembership {
    pub fn new(
        team_id: TeamId,
        user_id: UserId,
        role: TeamRole,
        invited_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            team_id,
            user_id,
            role,
            invited_by,
            joined_at: now,
        }
    }
}

/// Team↔Module grant row.
///
/// A team with zero grant rows is **unrestricted** (default-open), not
/// "no access"; see the module resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamModuleGrant {
    pub team_id: TeamId,
    pub module_id: ModuleId,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leadership_roles() {
        assert!(TeamRole::Owner.is_leadership());
        assert!(TeamRole::Admin.is_leadership());
        assert!(TeamRole::Manager.is_leadership());
        assert!(!TeamRole::Member.is_leadership());
        assert!(!TeamRole::Viewer.is_leadership());
        assert!(!TeamRole::Billing.is_leadership());
    }

    #[test]
    fn team_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TeamRole::Owner).unwrap(), "\"owner\"");
        assert_eq!(
            serde_json::from_str::<TeamRole>("\"billing\"").unwrap(),
            TeamRole::Billing
        );
    }
}
