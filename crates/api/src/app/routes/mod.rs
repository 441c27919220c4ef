//! Route modules, one file per domain area.

use axum::Router;

pub mod auth;
pub mod modules;
pub mod organizations;
pub mod rbac;
pub mod roles;
pub mod system;
pub mod teams;

/// Routes reachable without a credential.
pub fn public_router() -> Router {
    auth::public_router()
}

/// Routes behind the bearer guard.
pub fn protected_router() -> Router {
    Router::new()
        .merge(auth::protected_router())
        .merge(organizations::router())
        .merge(roles::router())
        .merge(teams::router())
        .merge(modules::router())
        .merge(rbac::router())
}
