use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// GET /health — liveness probe.
pub async fn health() -> axum::response::Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}
