//! Postgres directory store.
//!
//! One adapter implements every directory seam over a shared pool. Queries
//! are indexed point/range lookups; resolution never scans. Scope columns
//! keep the legacy representation (`'global'`, an organization uuid, or
//! null) and are normalized through `Scope::from_legacy` on read.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;

use atrium_core::{
    AccessError, AccessResult, ModuleId, ModuleSlug, OrganizationId, OrganizationSlug,
    PermissionId, PermissionSlug, RoleId, RoleSlug, Scope, SubscriptionStatus, TeamId, TeamSlug,
    UserId,
};
use atrium_directory::store::{
    ModuleStore, OrganizationStore, RoleStore, TeamStore, UserStore,
};
use atrium_directory::{
    Membership, Module, Organization, OrganizationModule, Permission, Role, RoleAssignment,
    RoleModuleGrant, Team, TeamMembership, TeamModuleGrant, TeamRole, User,
};

use super::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: Arc<PgPool>,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn decode_scope(column: Option<String>) -> AccessResult<Scope> {
    Scope::from_legacy(column.as_deref())
        .map_err(|e| AccessError::internal(format!("malformed scope column: {e}")))
}

fn decode_subscription_status(raw: &str) -> AccessResult<SubscriptionStatus> {
    match raw {
        "trial" => Ok(SubscriptionStatus::Trial),
        "active" => Ok(SubscriptionStatus::Active),
        "suspended" => Ok(SubscriptionStatus::Suspended),
        "cancelled" => Ok(SubscriptionStatus::Cancelled),
        "pending" => Ok(SubscriptionStatus::Pending),
        other => Err(AccessError::internal(format!(
            "unknown subscription status '{other}'"
        ))),
    }
}

fn decode_team_role(raw: &str) -> AccessResult<TeamRole> {
    match raw {
        "owner" => Ok(TeamRole::Owner),
        "admin" => Ok(TeamRole::Admin),
        "manager" => Ok(TeamRole::Manager),
        "member" => Ok(TeamRole::Member),
        "viewer" => Ok(TeamRole::Viewer),
        "billing" => Ok(TeamRole::Billing),
        other => Err(AccessError::internal(format!("unknown team role '{other}'"))),
    }
}

fn organization_from_row(row: &PgRow) -> AccessResult<Organization> {
    let status: String = row
        .try_get("subscription_status")
        .map_err(|e| map_sqlx_error("organization.decode", e))?;
    let get = |e| map_sqlx_error("organization.decode", e);
    Ok(Organization {
        id: OrganizationId::from_uuid(row.try_get("id").map_err(get)?),
        name: row.try_get("name").map_err(get)?,
        slug: OrganizationSlug::from(row.try_get::<String, _>("slug").map_err(get)?),
        domain: row.try_get("domain").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        settings: row.try_get("settings").map_err(get)?,
        is_active: row.try_get("is_active").map_err(get)?,
        subscription_status: decode_subscription_status(&status)?,
        max_users: row
            .try_get::<Option<i32>, _>("max_users")
            .map_err(get)?
            .map(|v| v as u32),
        trial_ends_at: row.try_get("trial_ends_at").map_err(get)?,
        subscription_id: row.try_get("subscription_id").map_err(get)?,
        plan_id: row.try_get("plan_id").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
        deleted_at: row.try_get("deleted_at").map_err(get)?,
    })
}

fn membership_from_row(row: &PgRow) -> AccessResult<Membership> {
    let get = |e| map_sqlx_error("membership.decode", e);
    Ok(Membership {
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(get)?),
        organization_id: OrganizationId::from_uuid(row.try_get("organization_id").map_err(get)?),
        is_active: row.try_get("is_active").map_err(get)?,
        joined_at: row.try_get("joined_at").map_err(get)?,
    })
}

fn user_from_row(row: &PgRow) -> AccessResult<User> {
    let get = |e| map_sqlx_error("user.decode", e);
    Ok(User {
        id: UserId::from_uuid(row.try_get("id").map_err(get)?),
        email: row.try_get("email").map_err(get)?,
        first_name: row.try_get("first_name").map_err(get)?,
        last_name: row.try_get("last_name").map_err(get)?,
        phone: row.try_get("phone").map_err(get)?,
        timezone: row.try_get("timezone").map_err(get)?,
        language: row.try_get("language").map_err(get)?,
        password_hash: row.try_get("password_hash").map_err(get)?,
        is_active: row.try_get("is_active").map_err(get)?,
        is_super_admin: row.try_get("is_super_admin").map_err(get)?,
        two_factor_enabled: row.try_get("two_factor_enabled").map_err(get)?,
        last_login_at: row.try_get("last_login_at").map_err(get)?,
        last_login_ip: row.try_get("last_login_ip").map_err(get)?,
        email_verified_at: row.try_get("email_verified_at").map_err(get)?,
        email_verification_token_hash: row
            .try_get("email_verification_token_hash")
            .map_err(get)?,
        email_verification_sent_at: row.try_get("email_verification_sent_at").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

fn role_from_row(row: &PgRow) -> AccessResult<Role> {
    let get = |e| map_sqlx_error("role.decode", e);
    Ok(Role {
        id: RoleId::from_uuid(row.try_get("id").map_err(get)?),
        scope: decode_scope(row.try_get("organization_scope").map_err(get)?)?,
        name: row.try_get("name").map_err(get)?,
        slug: RoleSlug::from(row.try_get::<String, _>("slug").map_err(get)?),
        description: row.try_get("description").map_err(get)?,
    })
}

fn permission_from_row(row: &PgRow) -> AccessResult<Permission> {
    let get = |e| map_sqlx_error("permission.decode", e);
    Ok(Permission {
        id: PermissionId::from_uuid(row.try_get("id").map_err(get)?),
        scope: decode_scope(row.try_get("organization_scope").map_err(get)?)?,
        name: row.try_get("name").map_err(get)?,
        slug: PermissionSlug::from(row.try_get::<String, _>("slug").map_err(get)?),
        description: row.try_get("description").map_err(get)?,
    })
}

fn module_from_row(row: &PgRow) -> AccessResult<Module> {
    let get = |e| map_sqlx_error("module.decode", e);
    let dependencies: serde_json::Value = row.try_get("dependencies").map_err(get)?;
    let dependencies: Vec<ModuleSlug> = serde_json::from_value(dependencies)
        .map_err(|e| AccessError::internal(format!("malformed module dependencies: {e}")))?;
    Ok(Module {
        id: ModuleId::from_uuid(row.try_get("id").map_err(get)?),
        code: row.try_get("code").map_err(get)?,
        name: row.try_get("name").map_err(get)?,
        slug: ModuleSlug::from(row.try_get::<String, _>("slug").map_err(get)?),
        description: row.try_get("description").map_err(get)?,
        category: row.try_get("category").map_err(get)?,
        display_order: row.try_get("display_order").map_err(get)?,
        dependencies,
        is_core: row.try_get("is_core").map_err(get)?,
        is_active: row.try_get("is_active").map_err(get)?,
        requires_license: row.try_get("requires_license").map_err(get)?,
    })
}

fn enablement_from_row(row: &PgRow) -> AccessResult<OrganizationModule> {
    let get = |e| map_sqlx_error("enablement.decode", e);
    Ok(OrganizationModule {
        organization_id: OrganizationId::from_uuid(row.try_get("organization_id").map_err(get)?),
        module_id: ModuleId::from_uuid(row.try_get("module_id").map_err(get)?),
        is_enabled: row.try_get("is_enabled").map_err(get)?,
        enabled_at: row.try_get("enabled_at").map_err(get)?,
        expires_at: row.try_get("expires_at").map_err(get)?,
        settings: row.try_get("settings").map_err(get)?,
        limits: row.try_get("limits").map_err(get)?,
    })
}

fn team_from_row(row: &PgRow) -> AccessResult<Team> {
    let get = |e| map_sqlx_error("team.decode", e);
    Ok(Team {
        id: TeamId::from_uuid(row.try_get("id").map_err(get)?),
        organization_id: OrganizationId::from_uuid(row.try_get("organization_id").map_err(get)?),
        parent_team_id: row
            .try_get::<Option<uuid::Uuid>, _>("parent_team_id")
            .map_err(get)?
            .map(TeamId::from_uuid),
        name: row.try_get("name").map_err(get)?,
        slug: TeamSlug::from(row.try_get::<String, _>("slug").map_err(get)?),
        description: row.try_get("description").map_err(get)?,
        color: row.try_get("color").map_err(get)?,
        created_by: UserId::from_uuid(row.try_get("created_by").map_err(get)?),
        is_active: row.try_get("is_active").map_err(get)?,
        metadata: row.try_get("metadata").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

fn team_membership_from_row(row: &PgRow) -> AccessResult<TeamMembership> {
    let get = |e| map_sqlx_error("team_membership.decode", e);
    let role: String = row.try_get("role").map_err(get)?;
    Ok(TeamMembership {
        team_id: TeamId::from_uuid(row.try_get("team_id").map_err(get)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(get)?),
        role: decode_team_role(&role)?,
        invited_by: row
            .try_get::<Option<uuid::Uuid>, _>("invited_by")
            .map_err(get)?
            .map(UserId::from_uuid),
        joined_at: row.try_get("joined_at").map_err(get)?,
    })
}

const ORGANIZATION_COLUMNS: &str = "id, name, slug, domain, description, settings, is_active, \
     subscription_status, max_users, trial_ends_at, subscription_id, plan_id, created_at, \
     deleted_at";

const USER_COLUMNS: &str = "id, email, first_name, last_name, phone, timezone, language, \
     password_hash, is_active, is_super_admin, two_factor_enabled, last_login_at, last_login_ip, \
     email_verified_at, email_verification_token_hash, email_verification_sent_at, created_at";

const MODULE_COLUMNS: &str = "id, code, name, slug, description, category, display_order, \
     dependencies, is_core, is_active, requires_license";

const TEAM_COLUMNS: &str = "id, organization_id, parent_team_id, name, slug, description, color, \
     created_by, is_active, metadata, created_at";

// ─────────────────────────────────────────────────────────────────────────────
// OrganizationStore
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OrganizationStore for PostgresDirectory {
    async fn organization(&self, id: OrganizationId) -> AccessResult<Option<Organization>> {
        let row = sqlx::query(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("organization", e))?;
        row.map(|r| organization_from_row(&r)).transpose()
    }

    async fn organization_by_slug(
        &self,
        slug: &OrganizationSlug,
    ) -> AccessResult<Option<Organization>> {
        let row = sqlx::query(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE slug = $1"
        ))
        .bind(slug.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("organization_by_slug", e))?;
        row.map(|r| organization_from_row(&r)).transpose()
    }

    #[instrument(skip(self, organization), fields(slug = %organization.slug))]
    async fn insert_organization(&self, organization: Organization) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations
                (id, name, slug, domain, description, settings, is_active,
                 subscription_status, max_users, trial_ends_at, subscription_id, plan_id,
                 created_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(organization.id.as_uuid())
        .bind(&organization.name)
        .bind(organization.slug.as_str())
        .bind(&organization.domain)
        .bind(&organization.description)
        .bind(&organization.settings)
        .bind(organization.is_active)
        .bind(organization.subscription_status.to_string())
        .bind(organization.max_users.map(|v| v as i32))
        .bind(organization.trial_ends_at)
        .bind(&organization.subscription_id)
        .bind(&organization.plan_id)
        .bind(organization.created_at)
        .bind(organization.deleted_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_organization", e))?;
        Ok(())
    }

    async fn update_organization(&self, organization: Organization) -> AccessResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET name = $2, slug = $3, domain = $4, description = $5, settings = $6,
                is_active = $7, subscription_status = $8, max_users = $9,
                trial_ends_at = $10, subscription_id = $11, plan_id = $12, deleted_at = $13
            WHERE id = $1
            "#,
        )
        .bind(organization.id.as_uuid())
        .bind(&organization.name)
        .bind(organization.slug.as_str())
        .bind(&organization.domain)
        .bind(&organization.description)
        .bind(&organization.settings)
        .bind(organization.is_active)
        .bind(organization.subscription_status.to_string())
        .bind(organization.max_users.map(|v| v as i32))
        .bind(organization.trial_ends_at)
        .bind(&organization.subscription_id)
        .bind(&organization.plan_id)
        .bind(organization.deleted_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_organization", e))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::not_found("organization"));
        }
        Ok(())
    }

    async fn membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<Option<Membership>> {
        let row = sqlx::query(
            "SELECT user_id, organization_id, is_active, joined_at \
             FROM organization_user WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id.as_uuid())
        .bind(organization_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("membership", e))?;
        row.map(|r| membership_from_row(&r)).transpose()
    }

    async fn memberships_for_user(&self, user_id: UserId) -> AccessResult<Vec<Membership>> {
        let rows = sqlx::query(
            "SELECT user_id, organization_id, is_active, joined_at \
             FROM organization_user WHERE user_id = $1 ORDER BY joined_at",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("memberships_for_user", e))?;
        rows.iter().map(membership_from_row).collect()
    }

    async fn insert_membership(&self, membership: Membership) -> AccessResult<()> {
        sqlx::query(
            "INSERT INTO organization_user (user_id, organization_id, is_active, joined_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(membership.user_id.as_uuid())
        .bind(membership.organization_id.as_uuid())
        .bind(membership.is_active)
        .bind(membership.joined_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_membership", e))?;
        Ok(())
    }

    async fn remove_membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<()> {
        sqlx::query(
            "DELETE FROM organization_user WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id.as_uuid())
        .bind(organization_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_membership", e))?;
        Ok(())
    }

    async fn active_member_count(&self, organization_id: OrganizationId) -> AccessResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM organization_user \
             WHERE organization_id = $1 AND is_active = TRUE",
        )
        .bind(organization_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_member_count", e))?;
        Ok(count as u32)
    }

    async fn member_count(&self, organization_id: OrganizationId) -> AccessResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM organization_user WHERE organization_id = $1",
        )
        .bind(organization_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("member_count", e))?;
        Ok(count as u32)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UserStore
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserStore for PostgresDirectory {
    async fn user(&self, id: UserId) -> AccessResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user", e))?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn user_by_email(&self, email: &str) -> AccessResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("user_by_email", e))?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    #[instrument(skip(self, user), fields(user = %user.id))]
    async fn insert_user(&self, user: User) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, email, first_name, last_name, phone, timezone, language, password_hash,
                 is_active, is_super_admin, two_factor_enabled, last_login_at, last_login_ip,
                 email_verified_at, email_verification_token_hash, email_verification_sent_at,
                 created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(&user.timezone)
        .bind(&user.language)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_super_admin)
        .bind(user.two_factor_enabled)
        .bind(user.last_login_at)
        .bind(&user.last_login_ip)
        .bind(user.email_verified_at)
        .bind(&user.email_verification_token_hash)
        .bind(user.email_verification_sent_at)
        .bind(user.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn update_user(&self, user: User) -> AccessResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, first_name = $3, last_name = $4, phone = $5, timezone = $6,
                language = $7, password_hash = $8, is_active = $9, is_super_admin = $10,
                two_factor_enabled = $11, last_login_at = $12, last_login_ip = $13,
                email_verified_at = $14, email_verification_token_hash = $15,
                email_verification_sent_at = $16
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(&user.timezone)
        .bind(&user.language)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_super_admin)
        .bind(user.two_factor_enabled)
        .bind(user.last_login_at)
        .bind(&user.last_login_ip)
        .bind(user.email_verified_at)
        .bind(&user.email_verification_token_hash)
        .bind(user.email_verification_sent_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::not_found("user"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RoleStore
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl RoleStore for PostgresDirectory {
    async fn role(&self, id: RoleId) -> AccessResult<Option<Role>> {
        let row = sqlx::query(
            "SELECT id, organization_scope, name, slug, description FROM roles WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("role", e))?;
        row.map(|r| role_from_row(&r)).transpose()
    }

    async fn find_role(&self, scope: Scope, slug: &RoleSlug) -> AccessResult<Option<Role>> {
        let row = sqlx::query(
            "SELECT id, organization_scope, name, slug, description FROM roles \
             WHERE organization_scope IS NOT DISTINCT FROM $1 AND slug = $2",
        )
        .bind(scope.to_column())
        .bind(slug.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_role", e))?;
        row.map(|r| role_from_row(&r)).transpose()
    }

    #[instrument(skip(self, role), fields(slug = %role.slug, scope = %role.scope))]
    async fn insert_role(&self, role: Role) -> AccessResult<()> {
        sqlx::query(
            "INSERT INTO roles (id, organization_scope, name, slug, description) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(role.id.as_uuid())
        .bind(role.scope.to_column())
        .bind(&role.name)
        .bind(role.slug.as_str())
        .bind(&role.description)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(())
    }

    async fn permission(&self, id: PermissionId) -> AccessResult<Option<Permission>> {
        let row = sqlx::query(
            "SELECT id, organization_scope, name, slug, description \
             FROM permissions WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("permission", e))?;
        row.map(|r| permission_from_row(&r)).transpose()
    }

    async fn find_permission(
        &self,
        scope: Scope,
        slug: &PermissionSlug,
    ) -> AccessResult<Option<Permission>> {
        let row = sqlx::query(
            "SELECT id, organization_scope, name, slug, description FROM permissions \
             WHERE organization_scope IS NOT DISTINCT FROM $1 AND slug = $2",
        )
        .bind(scope.to_column())
        .bind(slug.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_permission", e))?;
        row.map(|r| permission_from_row(&r)).transpose()
    }

    async fn insert_permission(&self, permission: Permission) -> AccessResult<()> {
        sqlx::query(
            "INSERT INTO permissions (id, organization_scope, name, slug, description) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(permission.id.as_uuid())
        .bind(permission.scope.to_column())
        .bind(&permission.name)
        .bind(permission.slug.as_str())
        .bind(&permission.description)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_permission", e))?;
        Ok(())
    }

    async fn assignments_for_user(&self, user_id: UserId) -> AccessResult<Vec<RoleAssignment>> {
        let rows = sqlx::query(
            "SELECT user_id, role_id, organization_id FROM role_user WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("assignments_for_user", e))?;

        rows.iter()
            .map(|row| {
                let get = |e| map_sqlx_error("assignment.decode", e);
                Ok(RoleAssignment {
                    user_id: UserId::from_uuid(row.try_get("user_id").map_err(get)?),
                    role_id: RoleId::from_uuid(row.try_get("role_id").map_err(get)?),
                    organization_id: OrganizationId::from_uuid(
                        row.try_get("organization_id").map_err(get)?,
                    ),
                })
            })
            .collect()
    }

    async fn assign_role(&self, assignment: RoleAssignment) -> AccessResult<()> {
        sqlx::query(
            "INSERT INTO role_user (user_id, role_id, organization_id) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.role_id.as_uuid())
        .bind(assignment.organization_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("assign_role", e))?;
        Ok(())
    }

    async fn unassign_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
        organization_id: OrganizationId,
    ) -> AccessResult<()> {
        sqlx::query(
            "DELETE FROM role_user \
             WHERE user_id = $1 AND role_id = $2 AND organization_id = $3",
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .bind(organization_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("unassign_role", e))?;
        Ok(())
    }

    async fn unassign_all(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AccessResult<()> {
        sqlx::query("DELETE FROM role_user WHERE user_id = $1 AND organization_id = $2")
            .bind(user_id.as_uuid())
            .bind(organization_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("unassign_all", e))?;
        Ok(())
    }

    async fn permissions_for_role(&self, role_id: RoleId) -> AccessResult<Vec<Permission>> {
        let rows = sqlx::query(
            "SELECT p.id, p.organization_scope, p.name, p.slug, p.description \
             FROM permissions p \
             JOIN permission_role pr ON pr.permission_id = p.id \
             WHERE pr.role_id = $1",
        )
        .bind(role_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("permissions_for_role", e))?;
        rows.iter().map(permission_from_row).collect()
    }

    async fn grant_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AccessResult<()> {
        sqlx::query(
            "INSERT INTO permission_role (role_id, permission_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("grant_role_permission", e))?;
        Ok(())
    }

    async fn revoke_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AccessResult<()> {
        sqlx::query("DELETE FROM permission_role WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id.as_uuid())
            .bind(permission_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("revoke_role_permission", e))?;
        Ok(())
    }

    async fn direct_grants_for_user(&self, user_id: UserId) -> AccessResult<Vec<Permission>> {
        let rows = sqlx::query(
            "SELECT p.id, p.organization_scope, p.name, p.slug, p.description \
             FROM permissions p \
             JOIN permission_user pu ON pu.permission_id = p.id \
             WHERE pu.user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("direct_grants_for_user", e))?;
        rows.iter().map(permission_from_row).collect()
    }

    async fn grant_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AccessResult<()> {
        sqlx::query(
            "INSERT INTO permission_user (user_id, permission_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .bind(permission_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("grant_user_permission", e))?;
        Ok(())
    }

    async fn revoke_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AccessResult<()> {
        sqlx::query("DELETE FROM permission_user WHERE user_id = $1 AND permission_id = $2")
            .bind(user_id.as_uuid())
            .bind(permission_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("revoke_user_permission", e))?;
        Ok(())
    }

    async fn module_grants_for_role(
        &self,
        role_id: RoleId,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<ModuleId>> {
        let rows: Vec<uuid::Uuid> = sqlx::query_scalar(
            "SELECT module_id FROM role_module \
             WHERE role_id = $1 AND organization_id = $2 AND has_access = TRUE",
        )
        .bind(role_id.as_uuid())
        .bind(organization_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("module_grants_for_role", e))?;
        Ok(rows.into_iter().map(ModuleId::from_uuid).collect())
    }

    async fn set_role_module_grant(&self, grant: RoleModuleGrant) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO role_module (role_id, module_id, organization_id, has_access, granted_by)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (role_id, module_id, organization_id)
            DO UPDATE SET has_access = EXCLUDED.has_access, granted_by = EXCLUDED.granted_by
            "#,
        )
        .bind(grant.role_id.as_uuid())
        .bind(grant.module_id.as_uuid())
        .bind(grant.organization_id.as_uuid())
        .bind(grant.has_access)
        .bind(grant.granted_by.map(|id| *id.as_uuid()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_role_module_grant", e))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ModuleStore
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ModuleStore for PostgresDirectory {
    async fn module(&self, id: ModuleId) -> AccessResult<Option<Module>> {
        let row = sqlx::query(&format!("SELECT {MODULE_COLUMNS} FROM modules WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("module", e))?;
        row.map(|r| module_from_row(&r)).transpose()
    }

    async fn module_by_slug(&self, slug: &ModuleSlug) -> AccessResult<Option<Module>> {
        let row = sqlx::query(&format!(
            "SELECT {MODULE_COLUMNS} FROM modules WHERE slug = $1"
        ))
        .bind(slug.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("module_by_slug", e))?;
        row.map(|r| module_from_row(&r)).transpose()
    }

    async fn all_modules(&self) -> AccessResult<Vec<Module>> {
        let rows = sqlx::query(&format!(
            "SELECT {MODULE_COLUMNS} FROM modules ORDER BY display_order, slug"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("all_modules", e))?;
        rows.iter().map(module_from_row).collect()
    }

    async fn insert_module(&self, module: Module) -> AccessResult<()> {
        let dependencies = serde_json::to_value(&module.dependencies)
            .map_err(|e| AccessError::internal(format!("encode module dependencies: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO modules
                (id, code, name, slug, description, category, display_order, dependencies,
                 is_core, is_active, requires_license)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(module.id.as_uuid())
        .bind(&module.code)
        .bind(&module.name)
        .bind(module.slug.as_str())
        .bind(&module.description)
        .bind(&module.category)
        .bind(module.display_order)
        .bind(dependencies)
        .bind(module.is_core)
        .bind(module.is_active)
        .bind(module.requires_license)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_module", e))?;
        Ok(())
    }

    async fn enablements(
        &self,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<(Module, OrganizationModule)>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.code, m.name, m.slug, m.description, m.category, m.display_order,
                   m.dependencies, m.is_core, m.is_active, m.requires_license,
                   om.organization_id, om.module_id, om.is_enabled, om.enabled_at,
                   om.expires_at, om.settings, om.limits
            FROM organization_module om
            JOIN modules m ON m.id = om.module_id
            WHERE om.organization_id = $1
            "#,
        )
        .bind(organization_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enablements", e))?;

        rows.iter()
            .map(|row| Ok((module_from_row(row)?, enablement_from_row(row)?)))
            .collect()
    }

    async fn upsert_enablement(&self, enablement: OrganizationModule) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organization_module
                (organization_id, module_id, is_enabled, enabled_at, expires_at, settings, limits)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (organization_id, module_id)
            DO UPDATE SET is_enabled = EXCLUDED.is_enabled, enabled_at = EXCLUDED.enabled_at,
                          expires_at = EXCLUDED.expires_at, settings = EXCLUDED.settings,
                          limits = EXCLUDED.limits
            "#,
        )
        .bind(enablement.organization_id.as_uuid())
        .bind(enablement.module_id.as_uuid())
        .bind(enablement.is_enabled)
        .bind(enablement.enabled_at)
        .bind(enablement.expires_at)
        .bind(&enablement.settings)
        .bind(&enablement.limits)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_enablement", e))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TeamStore
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TeamStore for PostgresDirectory {
    async fn team(&self, id: TeamId) -> AccessResult<Option<Team>> {
        let row = sqlx::query(&format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("team", e))?;
        row.map(|r| team_from_row(&r)).transpose()
    }

    async fn team_by_slug(
        &self,
        organization_id: OrganizationId,
        slug: &TeamSlug,
    ) -> AccessResult<Option<Team>> {
        let row = sqlx::query(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE organization_id = $1 AND slug = $2"
        ))
        .bind(organization_id.as_uuid())
        .bind(slug.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("team_by_slug", e))?;
        row.map(|r| team_from_row(&r)).transpose()
    }

    async fn teams_in_organization(
        &self,
        organization_id: OrganizationId,
    ) -> AccessResult<Vec<Team>> {
        let rows = sqlx::query(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE organization_id = $1 ORDER BY slug"
        ))
        .bind(organization_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("teams_in_organization", e))?;
        rows.iter().map(team_from_row).collect()
    }

    #[instrument(skip(self, team), fields(slug = %team.slug))]
    async fn insert_team(&self, team: Team) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO teams
                (id, organization_id, parent_team_id, name, slug, description, color,
                 created_by, is_active, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(team.id.as_uuid())
        .bind(team.organization_id.as_uuid())
        .bind(team.parent_team_id.map(|id| *id.as_uuid()))
        .bind(&team.name)
        .bind(team.slug.as_str())
        .bind(&team.description)
        .bind(&team.color)
        .bind(team.created_by.as_uuid())
        .bind(team.is_active)
        .bind(&team.metadata)
        .bind(team.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_team", e))?;
        Ok(())
    }

    async fn update_team(&self, team: Team) -> AccessResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE teams
            SET parent_team_id = $2, name = $3, slug = $4, description = $5, color = $6,
                is_active = $7, metadata = $8
            WHERE id = $1
            "#,
        )
        .bind(team.id.as_uuid())
        .bind(team.parent_team_id.map(|id| *id.as_uuid()))
        .bind(&team.name)
        .bind(team.slug.as_str())
        .bind(&team.description)
        .bind(&team.color)
        .bind(team.is_active)
        .bind(&team.metadata)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_team", e))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::not_found("team"));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_team(&self, id: TeamId) -> AccessResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("delete_team.begin", e))?;

        sqlx::query("DELETE FROM team_user WHERE team_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_team.members", e))?;
        sqlx::query("DELETE FROM team_module WHERE team_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_team.grants", e))?;
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_team", e))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("delete_team.rollback", e))?;
            return Err(AccessError::not_found("team"));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_team.commit", e))
    }

    async fn child_team_count(&self, id: TeamId) -> AccessResult<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams WHERE parent_team_id = $1")
            .bind(id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("child_team_count", e))?;
        Ok(count as u32)
    }

    async fn team_memberships_for_user(
        &self,
        user_id: UserId,
    ) -> AccessResult<Vec<TeamMembership>> {
        let rows = sqlx::query(
            "SELECT team_id, user_id, role, invited_by, joined_at \
             FROM team_user WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("team_memberships_for_user", e))?;
        rows.iter().map(team_membership_from_row).collect()
    }

    async fn members(&self, team_id: TeamId) -> AccessResult<Vec<TeamMembership>> {
        let rows = sqlx::query(
            "SELECT team_id, user_id, role, invited_by, joined_at \
             FROM team_user WHERE team_id = $1",
        )
        .bind(team_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("members", e))?;
        rows.iter().map(team_membership_from_row).collect()
    }

    async fn upsert_team_membership(&self, membership: TeamMembership) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO team_user (team_id, user_id, role, invited_by, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (team_id, user_id)
            DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(membership.team_id.as_uuid())
        .bind(membership.user_id.as_uuid())
        .bind(membership.role.as_str())
        .bind(membership.invited_by.map(|id| *id.as_uuid()))
        .bind(membership.joined_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_team_membership", e))?;
        Ok(())
    }

    async fn remove_team_membership(&self, team_id: TeamId, user_id: UserId) -> AccessResult<()> {
        sqlx::query("DELETE FROM team_user WHERE team_id = $1 AND user_id = $2")
            .bind(team_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_team_membership", e))?;
        Ok(())
    }

    async fn module_grant_rows(&self, team_id: TeamId) -> AccessResult<Vec<TeamModuleGrant>> {
        let rows = sqlx::query(
            "SELECT team_id, module_id, is_active FROM team_module WHERE team_id = $1",
        )
        .bind(team_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("module_grant_rows", e))?;

        rows.iter()
            .map(|row| {
                let get = |e| map_sqlx_error("team_module.decode", e);
                Ok(TeamModuleGrant {
                    team_id: TeamId::from_uuid(row.try_get("team_id").map_err(get)?),
                    module_id: ModuleId::from_uuid(row.try_get("module_id").map_err(get)?),
                    is_active: row.try_get("is_active").map_err(get)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, grants), fields(team = %team_id))]
    async fn set_team_module_grants(
        &self,
        team_id: TeamId,
        grants: Vec<TeamModuleGrant>,
    ) -> AccessResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("set_team_module_grants.begin", e))?;

        sqlx::query("DELETE FROM team_module WHERE team_id = $1")
            .bind(team_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_team_module_grants.clear", e))?;

        for grant in grants.iter().filter(|g| g.team_id == team_id) {
            sqlx::query(
                "INSERT INTO team_module (team_id, module_id, is_active) VALUES ($1, $2, $3)",
            )
            .bind(grant.team_id.as_uuid())
            .bind(grant.module_id.as_uuid())
            .bind(grant.is_active)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_team_module_grants.insert", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("set_team_module_grants.commit", e))
    }
}
