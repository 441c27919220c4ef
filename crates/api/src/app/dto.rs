//! Request/response DTOs and JSON mapping helpers.

use serde::{Deserialize, Serialize};

use atrium_auth::AccessClaims;
use atrium_core::{ModuleId, OrganizationId, TeamId, UserId};
use atrium_directory::{Organization, Team, TeamRole, User};
use atrium_tokens::CredentialPair;

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub organization_id: Option<OrganizationId>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SwitchOrganizationRequest {
    pub organization_id: OrganizationId,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
    pub claims: AccessClaims,
}

impl From<CredentialPair> for CredentialResponse {
    fn from(pair: CredentialPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer",
            expires_in: pair.expires_in,
            refresh_expires_in: pair.refresh_expires_in,
            claims: pair.claims,
        }
    }
}

/// Public projection of a user record (never credentials or token hashes).
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub is_super_admin: bool,
    pub email_verified: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            is_super_admin: user.is_super_admin,
            email_verified: user.has_verified_email(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrganizationView {
    pub id: OrganizationId,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub subscription_status: String,
}

impl From<&Organization> for OrganizationView {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id,
            name: org.name.clone(),
            slug: org.slug.as_str().to_string(),
            is_active: org.is_active,
            subscription_status: org.subscription_status.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Organizations & modules
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnableModuleRequest {
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub limits: serde_json::Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Teams
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub parent_team_id: Option<TeamId>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct AddTeamMemberRequest {
    pub user_id: UserId,
    pub role: TeamRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamMemberRequest {
    pub role: TeamRole,
}

#[derive(Debug, Deserialize)]
pub struct SetTeamModulesRequest {
    pub module_ids: Vec<ModuleId>,
}

#[derive(Debug, Serialize)]
pub struct TeamView {
    pub id: TeamId,
    pub organization_id: OrganizationId,
    pub parent_team_id: Option<TeamId>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
}

impl From<&Team> for TeamView {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id,
            organization_id: team.organization_id,
            parent_team_id: team.parent_team_id,
            name: team.name.clone(),
            slug: team.slug.as_str().to_string(),
            description: team.description.clone(),
            color: team.color.clone(),
            is_active: team.is_active,
        }
    }
}
