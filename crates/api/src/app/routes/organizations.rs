//! Organization lifecycle routes.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use atrium_core::authority::GLOBAL_ADMIN_ROLE;
use atrium_core::{AccessError, ModuleSlug, OrganizationId, OrganizationSlug};
use atrium_directory::{OrganizationService, Resolver};

use crate::app::dto::{CreateOrganizationRequest, EnableModuleRequest, OrganizationView};
use crate::app::{errors, AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/organizations", post(create_organization))
        .route("/organizations/:id/usage", get(usage))
        .route(
            "/organizations/:id/modules/:slug",
            post(enable_module).delete(disable_module),
        )
}

/// POST /organizations — any authenticated user; the creator becomes the
/// first member.
pub async fn create_organization(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateOrganizationRequest>,
) -> axum::response::Response {
    let service = OrganizationService::new(services.directory.as_ref());
    match service
        .create_organization(
            principal.user_id(),
            &body.name,
            body.slug.map(OrganizationSlug::from),
            Utc::now(),
        )
        .await
    {
        Ok(org) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "organization": OrganizationView::from(&org) })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

async fn ensure_org_admin(
    services: &AppServices,
    principal: &PrincipalContext,
    organization_id: OrganizationId,
) -> Result<(), axum::response::Response> {
    let resolver = Resolver::new(services.directory.as_ref());
    match resolver
        .has_role_in_organization(principal.user_id(), organization_id, &[GLOBAL_ADMIN_ROLE])
        .await
    {
        Ok(true) => Ok(()),
        Ok(false) => Err(errors::access_error_to_response(AccessError::forbidden(
            "organization admin role",
        ))),
        Err(err) => Err(errors::access_error_to_response(err)),
    }
}

/// GET /organizations/:id/usage — members only.
pub async fn usage(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<OrganizationId>,
) -> axum::response::Response {
    let resolver = Resolver::new(services.directory.as_ref());
    match resolver.is_member(principal.user_id(), id).await {
        Ok(true) => {}
        Ok(false) => {
            return errors::access_error_to_response(AccessError::forbidden(
                "membership in this organization",
            ))
        }
        Err(err) => return errors::access_error_to_response(err),
    }

    let service = OrganizationService::new(services.directory.as_ref());
    match service.usage(id, Utc::now()).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// POST /organizations/:id/modules/:slug — enable (admin only).
pub async fn enable_module(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, slug)): Path<(OrganizationId, String)>,
    Json(body): Json<EnableModuleRequest>,
) -> axum::response::Response {
    if let Err(resp) = ensure_org_admin(&services, &principal, id).await {
        return resp;
    }

    let service = OrganizationService::new(services.directory.as_ref());
    match service
        .enable_module(
            id,
            &ModuleSlug::from(slug),
            body.expires_at,
            body.settings,
            body.limits,
            Utc::now(),
        )
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "module enabled" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// DELETE /organizations/:id/modules/:slug — disable (admin only).
pub async fn disable_module(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, slug)): Path<(OrganizationId, String)>,
) -> axum::response::Response {
    if let Err(resp) = ensure_org_admin(&services, &principal, id).await {
        return resp;
    }

    let service = OrganizationService::new(services.directory.as_ref());
    match service
        .disable_module(id, &ModuleSlug::from(slug), Utc::now())
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "module disabled" })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}
