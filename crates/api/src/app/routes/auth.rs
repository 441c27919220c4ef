//! Account and credential lifecycle routes.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use atrium_core::AccessError;
use atrium_directory::store::{OrganizationStore, UserStore};
use atrium_directory::{PasswordVerifier, Resolver, User};
use atrium_tokens::ClientInfo;

use crate::app::dto::{
    CredentialResponse, LoginRequest, OrganizationView, RefreshRequest, RegisterRequest,
    SwitchOrganizationRequest, UserView, VerifyEmailRequest,
};
use crate::app::{errors, AppServices};
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/verify-email", post(verify_email))
}

pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/switch-organization", post(switch_organization))
        .route("/auth/logout", post(logout))
}

fn client_info(headers: &axum::http::HeaderMap) -> ClientInfo {
    ClientInfo {
        ip_address: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string()),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// POST /auth/register — create an account and hand the verification token
/// to the notification layer.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> axum::response::Response {
    if body.password.len() < 8 {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_password",
            "password must be at least 8 characters",
        );
    }
    if !body.email.contains('@') {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_email",
            "invalid email address",
        );
    }

    let now = Utc::now();
    let hash = services.passwords.hash(&body.password);
    let mut user = User::new(body.email, body.first_name, body.last_name, hash, now);
    let verification_token = user.generate_email_verification_token(now);

    if let Err(err) = services.directory.insert_user(user.clone()).await {
        return errors::access_error_to_response(err);
    }

    // The notification layer transmits the token; the core only produces it.
    tracing::info!(user = %user.id, token = %verification_token, "verification token issued");

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "user": UserView::from(&user),
            "message": "registration successful; check your email to verify the account",
        })),
    )
        .into_response()
}

/// POST /auth/login — verify credentials, resolve claims, issue a pair.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<LoginRequest>,
) -> axum::response::Response {
    let now = Utc::now();

    let user = match services.directory.user_by_email(&body.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
                "invalid credentials",
            )
        }
        Err(err) => return errors::access_error_to_response(err),
    };
    if !services.passwords.verify(&user.password_hash, &body.password) {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "authentication_failed",
            "invalid credentials",
        );
    }

    let client = client_info(&headers);
    let pair = match services
        .issuer
        .login(user.id, body.organization_id, &client, now)
        .await
    {
        Ok(pair) => pair,
        Err(err) => return errors::access_error_to_response(err),
    };

    // Record the login against the account.
    let mut stamped = user.clone();
    stamped.record_login(now, client.ip_address.clone());
    if let Err(err) = services.directory.update_user(stamped).await {
        return errors::access_error_to_response(err);
    }

    let organizations = match member_organizations(&services, user.id).await {
        Ok(views) => views,
        Err(err) => return errors::access_error_to_response(err),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "credentials": CredentialResponse::from(pair),
            "user": UserView::from(&user),
            "organizations": organizations,
        })),
    )
        .into_response()
}

/// POST /auth/refresh — rotate the refresh credential.
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<RefreshRequest>,
) -> axum::response::Response {
    match services
        .issuer
        .rotate_refresh(&body.refresh_token, &client_info(&headers), Utc::now())
        .await
    {
        Ok(pair) => (StatusCode::OK, Json(CredentialResponse::from(pair))).into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// POST /auth/switch-organization — reissue under a different organization.
pub async fn switch_organization(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    headers: axum::http::HeaderMap,
    Json(body): Json<SwitchOrganizationRequest>,
) -> axum::response::Response {
    match services
        .issuer
        .switch_organization(
            principal.user_id(),
            body.organization_id,
            &client_info(&headers),
            Utc::now(),
        )
        .await
    {
        Ok(pair) => (StatusCode::OK, Json(CredentialResponse::from(pair))).into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// POST /auth/logout — revoke refresh credentials everywhere.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.issuer.logout(principal.user_id(), Utc::now()).await {
        Ok(revoked) => (
            StatusCode::OK,
            Json(serde_json::json!({ "revoked": revoked })),
        )
            .into_response(),
        Err(err) => errors::access_error_to_response(err),
    }
}

/// GET /auth/me — echo the frozen claims and memberships.
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let user = match services.directory.user(principal.user_id()).await {
        Ok(Some(user)) => user,
        Ok(None) => return errors::access_error_to_response(AccessError::not_found("user")),
        Err(err) => return errors::access_error_to_response(err),
    };
    let organizations = match member_organizations(&services, user.id).await {
        Ok(views) => views,
        Err(err) => return errors::access_error_to_response(err),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "user": UserView::from(&user),
            "claims": principal.claims(),
            "organizations": organizations,
        })),
    )
        .into_response()
}

/// POST /auth/verify-email — redeem a verification token.
pub async fn verify_email(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<VerifyEmailRequest>,
) -> axum::response::Response {
    let now = Utc::now();
    let user = match services.directory.user_by_email(&body.email).await {
        Ok(Some(user)) => user,
        Ok(None) => return errors::access_error_to_response(AccessError::not_found("user")),
        Err(err) => return errors::access_error_to_response(err),
    };

    let mut user = user;
    if !user.verify_email(&body.token, now) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_token",
            "verification token is invalid or expired",
        );
    }
    if let Err(err) = services.directory.update_user(user).await {
        return errors::access_error_to_response(err);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "email verified" })),
    )
        .into_response()
}

async fn member_organizations(
    services: &AppServices,
    user_id: atrium_core::UserId,
) -> Result<Vec<OrganizationView>, AccessError> {
    let resolver = Resolver::new(services.directory.as_ref());
    let mut views = Vec::new();
    for membership in services.directory.memberships_for_user(user_id).await? {
        if !membership.is_active {
            continue;
        }
        if !resolver.is_member(user_id, membership.organization_id).await? {
            continue;
        }
        if let Some(org) = services
            .directory
            .organization(membership.organization_id)
            .await?
        {
            views.push(OrganizationView::from(&org));
        }
    }
    Ok(views)
}
