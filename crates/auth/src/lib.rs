//! `atrium-auth` — pure authentication/authorization boundary (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage: everything
//! here operates on claims already extracted from a verified credential.

pub mod claims;
pub mod explain;
pub mod guard;
pub mod jwt;

pub use claims::{validate_claims, AccessClaims, TokenValidationError};
pub use explain::{explain_module, explain_permission, AccessExplanation, DenialKind};
pub use guard::{check_module, has_role, is_admin_like, require_permission, ModuleDecision};
pub use jwt::{Hs256Jwt, JwtValidator};
