//! Infrastructure layer: Postgres adapters, configuration, password hashing.

pub mod config;
pub mod password;
pub mod postgres;

pub use config::AppConfig;
pub use password::Sha256PasswordVerifier;
pub use postgres::{PostgresDirectory, PostgresRefreshTokenStore};
