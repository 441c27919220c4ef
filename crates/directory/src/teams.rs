//! Team hierarchy management and its structural invariants.
//!
//! Mutations re-check invariants against then-current state (read, check,
//! write). Under high contention two actors can race a leadership check; the
//! store's last write wins and the invariant is re-validated on the next
//! mutation. See DESIGN.md for the accepted limitation.

use chrono::{DateTime, Utc};
use tracing::instrument;

use atrium_core::authority::GLOBAL_ADMIN_ROLE;
use atrium_core::{slugify, AccessError, AccessResult, ModuleId, OrganizationId, TeamId, TeamSlug, UserId};

use crate::resolve::Resolver;
use crate::store::{DirectoryStore, ModuleStore, TeamStore};
use crate::team::{Team, TeamMembership, TeamModuleGrant, TeamRole};

/// Input for team creation.
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<TeamSlug>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub parent_team_id: Option<TeamId>,
    pub metadata: serde_json::Value,
}

/// Partial update for a team.
#[derive(Debug, Clone, Default)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub slug: Option<TeamSlug>,
    pub description: Option<Option<String>>,
    pub color: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

/// Team mutations with authority checks and structural invariants.
pub struct TeamService<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D> TeamService<'a, D>
where
    D: DirectoryStore + ?Sized,
{
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    fn resolver(&self) -> Resolver<'a, D> {
        Resolver::new(self.directory)
    }

    /// Leadership members of a team.
    pub async fn leadership(&self, team_id: TeamId) -> AccessResult<Vec<TeamMembership>> {
        Ok(self
            .directory
            .members(team_id)
            .await?
            .into_iter()
            .filter(|m| m.role.is_leadership())
            .collect())
    }

    async fn is_team_leader(&self, user_id: UserId, team_id: TeamId) -> AccessResult<bool> {
        Ok(self
            .directory
            .members(team_id)
            .await?
            .iter()
            .any(|m| m.user_id == user_id && m.role.is_leadership()))
    }

    async fn is_org_admin(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<bool> {
        self.resolver()
            .has_role_in_organization(user_id, organization_id, &[GLOBAL_ADMIN_ROLE])
            .await
    }

    /// Team leaders and organization admins may manage membership.
    async fn ensure_can_manage(&self, actor: UserId, team: &Team) -> AccessResult<()> {
        if self.is_team_leader(actor, team.id).await?
            || self.is_org_admin(actor, team.organization_id).await?
        {
            Ok(())
        } else {
            Err(AccessError::forbidden(format!(
                "team leadership of '{}'",
                team.slug
            )))
        }
    }

    async fn ensure_org_admin(&self, actor: UserId, team: &Team) -> AccessResult<()> {
        if self.is_org_admin(actor, team.organization_id).await? {
            Ok(())
        } else {
            Err(AccessError::forbidden("organization admin role"))
        }
    }

    async fn require_team(&self, team_id: TeamId) -> AccessResult<Team> {
        self.directory
            .team(team_id)
            .await?
            .ok_or_else(|| AccessError::not_found("team"))
    }

    /// Create a team; the creator becomes its owner.
    #[instrument(skip(self, spec), fields(organization = %organization_id, actor = %actor))]
    pub async fn create_team(
        &self,
        actor: UserId,
        organization_id: OrganizationId,
        spec: NewTeam,
        now: DateTime<Utc>,
    ) -> AccessResult<Team> {
        self.resolver().ensure_member(actor, organization_id).await?;

        let slug = match spec.slug {
            Some(slug) => slug,
            None => TeamSlug::from(
                slugify(&spec.name)
                    .ok_or_else(|| AccessError::conflict("team name yields an empty slug"))?,
            ),
        };

        if let Some(parent_id) = spec.parent_team_id {
            let parent = self.require_team(parent_id).await?;
            if parent.organization_id != organization_id {
                return Err(AccessError::conflict(
                    "parent team belongs to a different organization",
                ));
            }
        }

        let mut team = Team::new(organization_id, spec.name, slug, actor, now);
        team.parent_team_id = spec.parent_team_id;
        team.description = spec.description;
        team.color = spec.color;
        team.metadata = spec.metadata;

        self.directory.insert_team(team.clone()).await?;
        self.directory
            .upsert_team_membership(TeamMembership::new(
                team.id,
                actor,
                TeamRole::Owner,
                None,
                now,
            ))
            .await?;

        Ok(team)
    }

    pub async fn update_team(
        &self,
        actor: UserId,
        team_id: TeamId,
        update: TeamUpdate,
    ) -> AccessResult<Team> {
        let mut team = self.require_team(team_id).await?;
        self.ensure_can_manage(actor, &team).await?;

        if let Some(name) = update.name {
            team.name = name;
        }
        if let Some(slug) = update.slug {
            team.slug = slug;
        }
        if let Some(description) = update.description {
            team.description = description;
        }
        if let Some(color) = update.color {
            team.color = color;
        }
        if let Some(is_active) = update.is_active {
            team.is_active = is_active;
        }
        if let Some(metadata) = update.metadata {
            team.metadata = metadata;
        }

        self.directory.update_team(team.clone()).await?;
        Ok(team)
    }

    /// Delete a team. Rejected while child teams exist, so no subtree is ever
    /// orphaned.
    #[instrument(skip(self), fields(team = %team_id, actor = %actor))]
    pub async fn delete_team(&self, actor: UserId, team_id: TeamId) -> AccessResult<()> {
        let team = self.require_team(team_id).await?;
        self.ensure_org_admin(actor, &team).await?;

        let children = self.directory.child_team_count(team_id).await?;
        if children > 0 {
            return Err(AccessError::conflict(
                "cannot delete a team with sub-teams; reassign or remove them first",
            ));
        }

        self.directory.delete_team(team_id).await
    }

    /// Add an organization member to the team.
    pub async fn add_member(
        &self,
        actor: UserId,
        team_id: TeamId,
        user_id: UserId,
        role: TeamRole,
        now: DateTime<Utc>,
    ) -> AccessResult<()> {
        let team = self.require_team(team_id).await?;
        self.ensure_can_manage(actor, &team).await?;

        if !self.resolver().is_member(user_id, team.organization_id).await? {
            return Err(AccessError::conflict(
                "user is not a member of this organization",
            ));
        }
        let already = self
            .directory
            .members(team_id)
            .await?
            .iter()
            .any(|m| m.user_id == user_id);
        if already {
            return Err(AccessError::conflict("user is already a member of this team"));
        }

        self.directory
            .upsert_team_membership(TeamMembership::new(team_id, user_id, role, Some(actor), now))
            .await
    }

    /// Remove a member. Rejected when it would strip the team's last leader.
    pub async fn remove_member(
        &self,
        actor: UserId,
        team_id: TeamId,
        user_id: UserId,
    ) -> AccessResult<()> {
        let team = self.require_team(team_id).await?;
        self.ensure_can_manage(actor, &team).await?;

        let members = self.directory.members(team_id).await?;
        let Some(target) = members.iter().find(|m| m.user_id == user_id) else {
            return Err(AccessError::not_found("team member"));
        };

        let leaders = members.iter().filter(|m| m.role.is_leadership()).count();
        if target.role.is_leadership() && leaders <= 1 {
            return Err(AccessError::conflict("cannot remove the last team leader"));
        }

        self.directory.remove_team_membership(team_id, user_id).await
    }

    /// Change a member's role. Demoting the last leader is rejected.
    pub async fn update_member_role(
        &self,
        actor: UserId,
        team_id: TeamId,
        user_id: UserId,
        new_role: TeamRole,
    ) -> AccessResult<()> {
        let team = self.require_team(team_id).await?;
        self.ensure_can_manage(actor, &team).await?;

        let members = self.directory.members(team_id).await?;
        let Some(target) = members.iter().find(|m| m.user_id == user_id) else {
            return Err(AccessError::not_found("team member"));
        };

        let leaders = members.iter().filter(|m| m.role.is_leadership()).count();
        if target.role.is_leadership() && !new_role.is_leadership() && leaders <= 1 {
            return Err(AccessError::conflict("cannot demote the last team leader"));
        }

        let mut membership = target.clone();
        membership.role = new_role;
        self.directory.upsert_team_membership(membership).await
    }

    /// Move a team under a new parent (or to the root).
    ///
    /// The new parent must not be the team itself or any of its descendants;
    /// the check walks the ancestor chain of the proposed parent.
    pub async fn reparent(
        &self,
        actor: UserId,
        team_id: TeamId,
        new_parent: Option<TeamId>,
    ) -> AccessResult<()> {
        let mut team = self.require_team(team_id).await?;
        self.ensure_org_admin(actor, &team).await?;

        if let Some(parent_id) = new_parent {
            if parent_id == team_id {
                return Err(AccessError::conflict("a team cannot be its own parent"));
            }
            let parent = self.require_team(parent_id).await?;
            if parent.organization_id != team.organization_id {
                return Err(AccessError::conflict(
                    "parent team belongs to a different organization",
                ));
            }

            // Walk up from the proposed parent; hitting the moved team means
            // the parent is inside its subtree.
            let mut cursor = parent.parent_team_id;
            while let Some(ancestor_id) = cursor {
                if ancestor_id == team_id {
                    return Err(AccessError::conflict(
                        "new parent is a descendant of the team being moved",
                    ));
                }
                cursor = self
                    .directory
                    .team(ancestor_id)
                    .await?
                    .and_then(|t| t.parent_team_id);
            }
        }

        team.parent_team_id = new_parent;
        self.directory.update_team(team).await
    }

    /// Replace the team's module grants.
    pub async fn set_module_grants(
        &self,
        actor: UserId,
        team_id: TeamId,
        module_ids: Vec<ModuleId>,
    ) -> AccessResult<()> {
        let team = self.require_team(team_id).await?;
        self.ensure_org_admin(actor, &team).await?;

        for module_id in &module_ids {
            if self.directory.module(*module_id).await?.is_none() {
                return Err(AccessError::not_found("module"));
            }
        }

        let grants = module_ids
            .into_iter()
            .map(|module_id| TeamModuleGrant {
                team_id,
                module_id,
                is_active: true,
            })
            .collect();
        self.directory.set_team_module_grants(team_id, grants).await
    }
}
