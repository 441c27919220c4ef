use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use atrium_auth::JwtValidator;
use atrium_core::OrganizationId;
use atrium_directory::{DirectoryStore, Resolver};

use crate::context::{OrganizationContext, PrincipalContext};

/// Organization override header (falls back to the credential's claim).
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub directory: Arc<dyn DirectoryStore>,
}

/// Bearer guard: validates the access credential and installs the principal
/// and organization contexts.
///
/// Expired or malformed credentials are authentication failures (401);
/// malformed ones are additionally logged. A header-selected organization the
/// user is not a member of is an authorization failure (403), never a
/// silent fallback to the claim's organization.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        if matches!(e, atrium_auth::TokenValidationError::Malformed(_)) {
            tracing::warn!(error = %e, "rejected malformed access credential");
        }
        StatusCode::UNAUTHORIZED
    })?;

    let organization_id = match header_organization(req.headers())? {
        Some(requested) => {
            let member = Resolver::new(state.directory.as_ref())
                .is_member(claims.sub, requested)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            if !member {
                return Err(StatusCode::FORBIDDEN);
            }
            Some(requested)
        }
        None => claims.organization_id,
    };

    if let Some(organization_id) = organization_id {
        req.extensions_mut()
            .insert(OrganizationContext::new(organization_id));
    }
    req.extensions_mut().insert(PrincipalContext::new(claims));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

fn header_organization(headers: &HeaderMap) -> Result<Option<OrganizationId>, StatusCode> {
    let Some(raw) = headers.get(ORGANIZATION_HEADER) else {
        return Ok(None);
    };
    let raw = raw.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;
    raw.parse()
        .map(Some)
        .map_err(|_| StatusCode::BAD_REQUEST)
}
