//! Postgres-backed store implementations.
//!
//! ## Error mapping
//!
//! SQLx errors are mapped to `AccessError` as follows:
//!
//! | SQLx error | PostgreSQL code | AccessError | Scenario |
//! |------------|-----------------|-------------|----------|
//! | Database (unique violation) | `23505` | `ConflictInvariant` | Duplicate slug / membership / assignment |
//! | Database (foreign key violation) | `23503` | `NotFound` | Referenced row missing |
//! | RowNotFound | — | `NotFound` | Lookup of a missing row where one was required |
//! | Everything else | — | `Internal` | Pool closed, network failure, decode error |
//!
//! ## Thread safety
//!
//! Both stores are `Send + Sync` and share a `PgPool`; all multi-statement
//! writes run inside a transaction.

pub mod directory;
pub mod refresh;

pub use directory::PostgresDirectory;
pub use refresh::PostgresRefreshTokenStore;

use atrium_core::AccessError;

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AccessError {
    match &err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => AccessError::conflict(db.message().to_string()),
            Some("23503") => AccessError::not_found(format!("{operation}: referenced row")),
            _ => AccessError::internal(format!("{operation}: {}", db.message())),
        },
        sqlx::Error::RowNotFound => AccessError::not_found(operation.to_string()),
        _ => AccessError::internal(format!("{operation}: {err}")),
    }
}
