//! Role/permission catalog routes.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use atrium_core::{ModuleId, OrganizationId, RoleSlug, Scope, UserId};
use atrium_directory::CatalogService;

use crate::app::{errors, AppServices};
use crate::context::{OrganizationContext, PrincipalContext};

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub slug: String,
    /// `true` targets the global catalog; otherwise the current organization.
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: UserId,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRoleModuleRequest {
    pub role: String,
    #[serde(default)]
    pub global_role: bool,
    pub module_id: ModuleId,
}

pub fn router() -> Router {
    Router::new()
        .route("/roles", post(create_role))
        .route("/roles/assign", post(assign_role))
        .route("/roles/modules", post(grant_module))
}

fn scope_for(
    global: bool,
    organization: &Option<Extension<OrganizationContext>>,
) -> Result<Scope, axum::response::Response> {
    if global {
        return Ok(Scope::Global);
    }
    organization
        .as_ref()
        .map(|Extension(ctx)| Scope::Organization(ctx.organization_id()))
        .ok_or_else(|| errors::access_error_to_response(atrium_core::AccessError::ContextMissing))
}

fn org_for(
    organization: &Option<Extension<OrganizationContext>>,
) -> Result<OrganizationId, axum::response::Response> {
    organization
        .as_ref()
        .map(|Extension(ctx)| ctx.organization_id())
        .ok_or_else(|| errors::access_error_to_response(atrium_core::AccessError::ContextMissing))
}

/// POST /roles — create a role in the global or current-organization catalog.
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    organization: Option<Extension<OrganizationContext>>,
    Json(body): Json<CreateRoleRequest>,
) -> axum::response::Response {
    let scope = match scope_for(body.global, &organization) {
        Ok(scope) => scope,
        Err(resp) => return resp,
    };

    let service = CatalogService::new(services.directory.as_ref());
    match service
        .create_role(principal.user_id(), scope, &body.name, RoleSlug::from(body.slug))
        .await
    {
        Ok(role) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "role": role })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// POST /roles/assign — assign a role (global-first slug lookup) to a user
/// under the current organization.
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    organization: Option<Extension<OrganizationContext>>,
    Json(body): Json<AssignRoleRequest>,
) -> axum::response::Response {
    let organization_id = match org_for(&organization) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let service = CatalogService::new(services.directory.as_ref());
    match service
        .assign_role_to_user(
            principal.user_id(),
            body.user_id,
            &RoleSlug::from(body.role),
            organization_id,
        )
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "role assigned" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// POST /roles/modules — grant a module to a role for the current
/// organization.
pub async fn grant_module(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    organization: Option<Extension<OrganizationContext>>,
    Json(body): Json<GrantRoleModuleRequest>,
) -> axum::response::Response {
    let organization_id = match org_for(&organization) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let scope = if body.global_role {
        Scope::Global
    } else {
        Scope::Organization(organization_id)
    };

    let service = CatalogService::new(services.directory.as_ref());
    match service
        .grant_module_to_role(
            principal.user_id(),
            &RoleSlug::from(body.role),
            scope,
            body.module_id,
            organization_id,
        )
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "module granted to role" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}
