//! Infrastructure wiring: stores, issuer, password adapter.

use std::sync::Arc;

use chrono::Duration;
use sqlx::postgres::PgPoolOptions;

use atrium_auth::Hs256Jwt;
use atrium_directory::{DirectoryStore, InMemoryDirectory, PasswordVerifier};
use atrium_infra::{
    AppConfig, PostgresDirectory, PostgresRefreshTokenStore, Sha256PasswordVerifier,
};
use atrium_tokens::{CredentialIssuer, InMemoryRefreshTokenStore, RefreshTokenStore};

/// Shared service handles for the HTTP layer.
pub struct AppServices {
    pub directory: Arc<dyn DirectoryStore>,
    pub refresh: Arc<dyn RefreshTokenStore>,
    pub issuer: CredentialIssuer,
    pub passwords: Arc<dyn PasswordVerifier>,
    pub jwt: Arc<Hs256Jwt>,
}

/// Build services from configuration: Postgres-backed when `DATABASE_URL` is
/// set, otherwise in-memory (local development and tests).
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let (directory, refresh): (Arc<dyn DirectoryStore>, Arc<dyn RefreshTokenStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new().max_connections(16).connect(url).await?;
                (
                    Arc::new(PostgresDirectory::new(pool.clone())),
                    Arc::new(PostgresRefreshTokenStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; running on in-memory stores");
                (
                    Arc::new(InMemoryDirectory::new()),
                    Arc::new(InMemoryRefreshTokenStore::new()),
                )
            }
        };

    Ok(build_services_with(
        directory,
        refresh,
        &config.jwt_secret,
        config.access_ttl_minutes,
        config.refresh_ttl_days,
    ))
}

/// Wire services over explicit stores (used directly by tests).
pub fn build_services_with(
    directory: Arc<dyn DirectoryStore>,
    refresh: Arc<dyn RefreshTokenStore>,
    jwt_secret: &str,
    access_ttl_minutes: i64,
    refresh_ttl_days: i64,
) -> AppServices {
    let jwt = Arc::new(Hs256Jwt::new(jwt_secret.as_bytes()));
    let issuer = CredentialIssuer::new(
        directory.clone(),
        refresh.clone(),
        jwt.clone(),
        Duration::minutes(access_ttl_minutes),
        Duration::days(refresh_ttl_days),
    );

    AppServices {
        directory,
        refresh,
        issuer,
        passwords: Arc::new(Sha256PasswordVerifier),
        jwt,
    }
}
