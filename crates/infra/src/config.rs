//! Environment-driven configuration.

use atrium_core::{AccessError, AccessResult};

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string; absent means run on the in-memory stores.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> AccessResult<Self> {
        let jwt_secret = std::env::var("ATRIUM_JWT_SECRET")
            .unwrap_or_else(|_| "dev-jwt-secret-change-me".to_string());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            jwt_secret,
            access_ttl_minutes: env_i64("ATRIUM_ACCESS_TTL_MINUTES", 60)?,
            refresh_ttl_days: env_i64("ATRIUM_REFRESH_TTL_DAYS", 14)?,
            bind_addr: std::env::var("ATRIUM_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
        })
    }
}

fn env_i64(key: &str, default: i64) -> AccessResult<i64> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| AccessError::internal(format!("{key} must be an integer, got '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        // Env vars are process-global; only assert on keys the suite never sets.
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.access_ttl_minutes, 60);
        assert_eq!(config.refresh_ttl_days, 14);
    }
}
