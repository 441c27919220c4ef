//! Organization lifecycle: creation, membership, module enablement, usage.

use chrono::{DateTime, Utc};
use tracing::instrument;

use atrium_core::{
    slugify, AccessError, AccessResult, ModuleSlug, OrganizationId, OrganizationSlug, UserId,
};

use crate::module::OrganizationModule;
use crate::organization::{Membership, Organization, UsageSummary};
use crate::resolve::Resolver;
use crate::store::{DirectoryStore, ModuleStore, OrganizationStore, RoleStore, UserStore};

/// Organization mutations and queries over the directory seam.
pub struct OrganizationService<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D> OrganizationService<'a, D>
where
    D: DirectoryStore + ?Sized,
{
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    fn resolver(&self) -> Resolver<'a, D> {
        Resolver::new(self.directory)
    }

    async fn require_organization(&self, id: OrganizationId) -> AccessResult<Organization> {
        self.directory
            .organization(id)
            .await?
            .ok_or_else(|| AccessError::not_found("organization"))
    }

    /// Create an organization; the creator becomes its first member.
    #[instrument(skip(self, name), fields(creator = %creator))]
    pub async fn create_organization(
        &self,
        creator: UserId,
        name: &str,
        slug: Option<OrganizationSlug>,
        now: DateTime<Utc>,
    ) -> AccessResult<Organization> {
        if self.directory.user(creator).await?.is_none() {
            return Err(AccessError::not_found("user"));
        }

        let slug = match slug {
            Some(slug) => slug,
            None => OrganizationSlug::from(
                slugify(name)
                    .ok_or_else(|| AccessError::conflict("organization name yields an empty slug"))?,
            ),
        };

        let organization = Organization::new(name, slug, now);
        self.directory.insert_organization(organization.clone()).await?;
        self.directory
            .insert_membership(Membership::new(creator, organization.id, now))
            .await?;

        Ok(organization)
    }

    /// Add a user, enforcing the one-membership invariant and the seat limit.
    pub async fn add_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AccessResult<()> {
        let organization = self.require_organization(organization_id).await?;
        if self.directory.user(user_id).await?.is_none() {
            return Err(AccessError::not_found("user"));
        }

        let active = self.directory.active_member_count(organization_id).await?;
        if !organization.can_add_users(active, 1) {
            return Err(AccessError::conflict(format!(
                "organization user limit reached ({})",
                organization.max_users.unwrap_or_default()
            )));
        }

        self.directory
            .insert_membership(Membership::new(user_id, organization_id, now))
            .await
    }

    /// Remove a user along with their role assignments under this
    /// organization.
    pub async fn remove_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AccessResult<()> {
        self.directory.unassign_all(user_id, organization_id).await?;
        self.directory.remove_membership(user_id, organization_id).await
    }

    /// Enable a module for the organization.
    ///
    /// Declared dependencies must already be live; licensed modules require
    /// an active subscription.
    #[instrument(skip(self, settings, limits), fields(organization = %organization_id))]
    pub async fn enable_module(
        &self,
        organization_id: OrganizationId,
        module_slug: &ModuleSlug,
        expires_at: Option<DateTime<Utc>>,
        settings: serde_json::Value,
        limits: serde_json::Value,
        now: DateTime<Utc>,
    ) -> AccessResult<()> {
        let organization = self.require_organization(organization_id).await?;
        let module = self
            .directory
            .module_by_slug(module_slug)
            .await?
            .ok_or_else(|| AccessError::not_found("module"))?;

        if !module.is_active {
            return Err(AccessError::conflict(format!(
                "module '{}' is retired from the catalog",
                module.slug
            )));
        }
        if module.requires_license && !organization.has_active_subscription() {
            return Err(AccessError::conflict(format!(
                "module '{}' requires an active subscription",
                module.slug
            )));
        }

        let live = self.resolver().enabled_modules(organization_id, now).await?;
        for dependency in &module.dependencies {
            if !live.iter().any(|m| &m.slug == dependency) {
                return Err(AccessError::conflict(format!(
                    "module '{}' depends on '{}', which is not enabled",
                    module.slug, dependency
                )));
            }
        }

        let mut enablement = OrganizationModule::new(organization_id, module.id, now);
        enablement.expires_at = expires_at;
        enablement.settings = settings;
        enablement.limits = limits;
        self.directory.upsert_enablement(enablement).await
    }

    /// Disable a module. Rejected while another live module depends on it.
    pub async fn disable_module(
        &self,
        organization_id: OrganizationId,
        module_slug: &ModuleSlug,
        now: DateTime<Utc>,
    ) -> AccessResult<()> {
        self.require_organization(organization_id).await?;
        let module = self
            .directory
            .module_by_slug(module_slug)
            .await?
            .ok_or_else(|| AccessError::not_found("module"))?;

        let live = self.resolver().enabled_modules(organization_id, now).await?;
        if let Some(dependent) = live
            .iter()
            .find(|m| m.id != module.id && m.dependencies.contains(module_slug))
        {
            return Err(AccessError::conflict(format!(
                "module '{}' is required by enabled module '{}'",
                module.slug, dependent.slug
            )));
        }

        let Some((_, mut row)) = self
            .directory
            .enablements(organization_id)
            .await?
            .into_iter()
            .find(|(m, _)| m.id == module.id)
        else {
            return Err(AccessError::not_found("module enablement"));
        };
        row.is_enabled = false;
        self.directory.upsert_enablement(row).await
    }

    /// Usage snapshot for billing.
    pub async fn usage(
        &self,
        organization_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> AccessResult<UsageSummary> {
        let organization = self.require_organization(organization_id).await?;
        let active = self.directory.active_member_count(organization_id).await?;
        let total = self.directory.member_count(organization_id).await?;
        let enabled = self
            .resolver()
            .enabled_modules(organization_id, now)
            .await?
            .into_iter()
            .map(|m| m.slug.as_str().to_string())
            .collect();

        Ok(UsageSummary {
            organization_id: organization.id,
            organization_name: organization.name.clone(),
            subscription_status: organization.subscription_status,
            subscription_id: organization.subscription_id.clone(),
            plan_id: organization.plan_id.clone(),
            max_users: organization.max_users,
            active_users_count: active,
            total_users_count: total,
            enabled_modules: enabled,
            is_trial: organization.is_on_trial(now),
            trial_ends_at: organization.trial_ends_at,
            is_active: organization.is_active,
        })
    }

    /// Soft-delete an organization; history rows stay referenced.
    pub async fn soft_delete(
        &self,
        organization_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> AccessResult<()> {
        let mut organization = self.require_organization(organization_id).await?;
        organization.soft_delete(now);
        self.directory.update_organization(organization).await
    }
}
