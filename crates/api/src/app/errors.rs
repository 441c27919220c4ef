use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use atrium_core::AccessError;

/// Map the error taxonomy onto HTTP statuses.
///
/// Authentication → 401, authorization → 403 (naming the missing
/// capability), missing context → 400, not found → 404, invariant conflict →
/// 422, internal → 500.
pub fn access_error_to_response(err: AccessError) -> axum::response::Response {
    match err {
        AccessError::Authentication(msg) => {
            json_error(StatusCode::UNAUTHORIZED, "authentication_failed", msg)
        }
        AccessError::Authorization { missing } => json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("missing {missing}"),
        ),
        AccessError::ContextMissing => json_error(
            StatusCode::BAD_REQUEST,
            "context_missing",
            "organization context required",
        ),
        AccessError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        AccessError::ConflictInvariant(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        AccessError::Internal(msg) => {
            tracing::error!(error = %msg, "internal error");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
