//! Team management routes.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chrono::Utc;

use atrium_core::{TeamId, TeamSlug, UserId};
use atrium_directory::store::TeamStore;
use atrium_directory::{NewTeam, Resolver, TeamService, TeamUpdate};

use crate::app::dto::{
    AddTeamMemberRequest, CreateTeamRequest, SetTeamModulesRequest, TeamView,
    UpdateTeamMemberRequest, UpdateTeamRequest,
};
use crate::app::{errors, AppServices};
use crate::context::{OrganizationContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/teams", get(list_teams).post(create_team))
        .route("/teams/mine", get(my_teams))
        .route(
            "/teams/:id",
            get(show_team).patch(update_team).delete(delete_team),
        )
        .route("/teams/:id/members", post(add_member))
        .route("/teams/:id/members/:user_id", delete(remove_member))
        .route("/teams/:id/members/:user_id/role", patch(update_member_role))
        .route("/teams/:id/modules", put(set_modules))
        .route("/teams/:id/parent", patch(reparent))
}

fn require_org(
    organization: Option<Extension<OrganizationContext>>,
) -> Result<OrganizationContext, axum::response::Response> {
    organization
        .map(|Extension(ctx)| ctx)
        .ok_or_else(|| errors::access_error_to_response(atrium_core::AccessError::ContextMissing))
}

/// GET /teams — teams in the current organization.
pub async fn list_teams(
    Extension(services): Extension<Arc<AppServices>>,
    organization: Option<Extension<OrganizationContext>>,
) -> axum::response::Response {
    let organization = match require_org(organization) {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    match services
        .directory
        .teams_in_organization(organization.organization_id())
        .await
    {
        Ok(teams) => {
            let views: Vec<TeamView> = teams.iter().map(TeamView::from).collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "teams": views, "total": views.len() })),
            )
                .into_response()
        }
        Err(err) => errors::access_error_to_response(err),
    }
}

/// GET /teams/mine — the caller's teams with their membership role.
pub async fn my_teams(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    organization: Option<Extension<OrganizationContext>>,
) -> axum::response::Response {
    let organization = match require_org(organization) {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let resolver = Resolver::new(services.directory.as_ref());
    match resolver
        .teams_in_organization(principal.user_id(), organization.organization_id())
        .await
    {
        Ok(teams) => {
            let views: Vec<_> = teams
                .iter()
                .map(|(team, membership)| {
                    serde_json::json!({
                        "team": TeamView::from(team),
                        "my_role": membership.role,
                        "joined_at": membership.joined_at,
                    })
                })
                .collect();
            (StatusCode::OK, Json(serde_json::json!({ "teams": views }))).into_response()
        }
        Err(err) => errors::access_error_to_response(err),
    }
}

/// POST /teams — create a team; the caller becomes its owner.
pub async fn create_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    organization: Option<Extension<OrganizationContext>>,
    Json(body): Json<CreateTeamRequest>,
) -> axum::response::Response {
    let organization = match require_org(organization) {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let spec = NewTeam {
        name: body.name,
        slug: body.slug.map(TeamSlug::from),
        description: body.description,
        color: body.color,
        parent_team_id: body.parent_team_id,
        metadata: body.metadata,
    };

    let service = TeamService::new(services.directory.as_ref());
    match service
        .create_team(principal.user_id(), organization.organization_id(), spec, Utc::now())
        .await
    {
        Ok(team) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "team": TeamView::from(&team) })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// GET /teams/:id
pub async fn show_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<TeamId>,
) -> axum::response::Response {
    let team = match services.directory.team(id).await {
        Ok(Some(team)) => team,
        Ok(None) => {
            return errors::access_error_to_response(atrium_core::AccessError::not_found("team"))
        }
        Err(err) => return errors::access_error_to_response(err),
    };

    // Callers outside the team's organization cannot see it.
    let resolver = Resolver::new(services.directory.as_ref());
    match resolver.is_member(principal.user_id(), team.organization_id).await {
        Ok(true) => {}
        Ok(false) => {
            return errors::access_error_to_response(atrium_core::AccessError::forbidden(
                "membership in the team's organization",
            ))
        }
        Err(err) => return errors::access_error_to_response(err),
    }

    let members = match services.directory.members(id).await {
        Ok(members) => members,
        Err(err) => return errors::access_error_to_response(err),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({ "team": TeamView::from(&team), "members": members })),
    )
        .into_response()
}

/// PATCH /teams/:id
pub async fn update_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<TeamId>,
    Json(body): Json<UpdateTeamRequest>,
) -> axum::response::Response {
    let update = TeamUpdate {
        name: body.name,
        slug: body.slug.map(TeamSlug::from),
        description: body.description.map(Some),
        color: body.color.map(Some),
        is_active: body.is_active,
        metadata: body.metadata,
    };

    let service = TeamService::new(services.directory.as_ref());
    match service.update_team(principal.user_id(), id, update).await {
        Ok(team) => (
            StatusCode::OK,
            Json(serde_json::json!({ "team": TeamView::from(&team) })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// DELETE /teams/:id — rejected while sub-teams exist.
pub async fn delete_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<TeamId>,
) -> axum::response::Response {
    let service = TeamService::new(services.directory.as_ref());
    match service.delete_team(principal.user_id(), id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "team deleted" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// POST /teams/:id/members
pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<TeamId>,
    Json(body): Json<AddTeamMemberRequest>,
) -> axum::response::Response {
    let service = TeamService::new(services.directory.as_ref());
    match service
        .add_member(principal.user_id(), id, body.user_id, body.role, Utc::now())
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "member added" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// DELETE /teams/:id/members/:user_id — leadership retention enforced.
pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, user_id)): Path<(TeamId, UserId)>,
) -> axum::response::Response {
    let service = TeamService::new(services.directory.as_ref());
    match service.remove_member(principal.user_id(), id, user_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "member removed" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// PATCH /teams/:id/members/:user_id/role
pub async fn update_member_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, user_id)): Path<(TeamId, UserId)>,
    Json(body): Json<UpdateTeamMemberRequest>,
) -> axum::response::Response {
    let service = TeamService::new(services.directory.as_ref());
    match service
        .update_member_role(principal.user_id(), id, user_id, body.role)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "member role updated" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// PUT /teams/:id/modules — replace the team's module grants.
pub async fn set_modules(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<TeamId>,
    Json(body): Json<SetTeamModulesRequest>,
) -> axum::response::Response {
    let service = TeamService::new(services.directory.as_ref());
    match service
        .set_module_grants(principal.user_id(), id, body.module_ids)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "modules assigned" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct ReparentRequest {
    pub parent_team_id: Option<TeamId>,
}

/// PATCH /teams/:id/parent — move within the hierarchy (cycle-checked).
pub async fn reparent(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<TeamId>,
    Json(body): Json<ReparentRequest>,
) -> axum::response::Response {
    let service = TeamService::new(services.directory.as_ref());
    match service
        .reparent(principal.user_id(), id, body.parent_team_id)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "team moved" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}
