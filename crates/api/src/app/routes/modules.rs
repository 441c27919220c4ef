//! Module catalog and per-request access checks.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use atrium_core::ModuleSlug;
use atrium_directory::store::ModuleStore;
use atrium_directory::Resolver;

use crate::app::{errors, AppServices};
use crate::authz::ensure_module_access;
use crate::context::{OrganizationContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/modules", get(catalog))
        .route("/modules/accessible", get(accessible))
        .route("/modules/:slug/access", get(check_access))
}

/// GET /modules — the full catalog.
pub async fn catalog(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.directory.all_modules().await {
        Ok(modules) => {
            (StatusCode::OK, Json(serde_json::json!({ "modules": modules }))).into_response()
        }
        Err(err) => errors::access_error_to_response(err),
    }
}

/// GET /modules/accessible — re-resolve the caller's module set from current
/// state (diagnostic; ordinary requests trust the claims).
pub async fn accessible(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    organization: Option<Extension<OrganizationContext>>,
) -> axum::response::Response {
    let Some(Extension(organization)) = organization else {
        return errors::access_error_to_response(atrium_core::AccessError::ContextMissing);
    };

    let resolver = Resolver::new(services.directory.as_ref());
    match resolver
        .accessible_modules(principal.user_id(), organization.organization_id(), Utc::now())
        .await
    {
        Ok(modules) => {
            (StatusCode::OK, Json(serde_json::json!({ "modules": modules }))).into_response()
        }
        Err(err) => errors::access_error_to_response(err),
    }
}

/// GET /modules/:slug/access — the claims-first gate, with the degraded-claims
/// fallback against the directory.
pub async fn check_access(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    organization: Option<Extension<OrganizationContext>>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    let module = ModuleSlug::from(slug);
    let organization = organization.map(|Extension(ctx)| ctx);

    match ensure_module_access(
        services.directory.as_ref(),
        organization.as_ref(),
        principal.claims(),
        &module,
    )
    .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "module": module, "access": true })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}
