//! RBAC diagnostics: "why was this request allowed/denied?"

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use atrium_auth::{explain_module, explain_permission};
use atrium_core::{ModuleSlug, PermissionSlug};

use crate::context::PrincipalContext;

#[derive(Debug, Deserialize)]
pub struct ExplainPermissionQuery {
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainModuleQuery {
    pub module: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/rbac/explain", get(explain_permission_decision))
        .route("/rbac/explain-module", get(explain_module_decision))
}

/// GET /rbac/explain?permission=X — explain a permission decision for the
/// caller's claims.
pub async fn explain_permission_decision(
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ExplainPermissionQuery>,
) -> axum::response::Response {
    let explanation =
        explain_permission(principal.claims(), &PermissionSlug::from(query.permission));
    (StatusCode::OK, Json(explanation)).into_response()
}

/// GET /rbac/explain-module?module=X — explain a module decision for the
/// caller's claims.
pub async fn explain_module_decision(
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ExplainModuleQuery>,
) -> axum::response::Response {
    let explanation = explain_module(principal.claims(), &ModuleSlug::from(query.module));
    (StatusCode::OK, Json(explanation)).into_response()
}
