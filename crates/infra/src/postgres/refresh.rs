//! Postgres refresh-credential store.
//!
//! Rotation runs revoke-then-insert in one transaction: a crash between the
//! two statements must never leave two valid credentials for the same
//! (user, organization) pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;

use atrium_core::{AccessResult, OrganizationId, RefreshTokenId, UserId};
use atrium_tokens::{RefreshToken, RefreshTokenStore};

use super::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresRefreshTokenStore {
    pool: Arc<PgPool>,
}

impl PostgresRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn token_from_row(row: &PgRow) -> Result<RefreshToken, sqlx::Error> {
    Ok(RefreshToken {
        id: RefreshTokenId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        token_hash: row.try_get("token_hash")?,
        organization_id: row
            .try_get::<Option<uuid::Uuid>, _>("organization_id")?
            .map(OrganizationId::from_uuid),
        expires_at: row.try_get("expires_at")?,
        revoked_at: row.try_get("revoked_at")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl RefreshTokenStore for PostgresRefreshTokenStore {
    #[instrument(skip(self, token), fields(user = %token.user_id))]
    async fn rotate(&self, token: RefreshToken, now: DateTime<Utc>) -> AccessResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("rotate.begin", e))?;

        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE user_id = $2
              AND organization_id IS NOT DISTINCT FROM $3
              AND revoked_at IS NULL
            "#,
        )
        .bind(now)
        .bind(token.user_id.as_uuid())
        .bind(token.organization_id.map(|id| *id.as_uuid()))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("rotate.revoke", e))?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (id, user_id, token_hash, organization_id, expires_at, revoked_at,
                 ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token_hash)
        .bind(token.organization_id.map(|id| *id.as_uuid()))
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .bind(&token.ip_address)
        .bind(&token.user_agent)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("rotate.insert", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("rotate.commit", e))
    }

    async fn find_by_hash(&self, token_hash: &str) -> AccessResult<Option<RefreshToken>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, token_hash, organization_id, expires_at, revoked_at,
                   ip_address, user_agent, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_hash", e))?;

        row.map(|r| token_from_row(&r))
            .transpose()
            .map_err(|e| map_sqlx_error("find_by_hash.decode", e))
    }

    #[instrument(skip(self), fields(user = %user_id))]
    async fn revoke_all(
        &self,
        user_id: UserId,
        organization_id: Option<OrganizationId>,
        now: DateTime<Utc>,
    ) -> AccessResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE user_id = $2
              AND organization_id IS NOT DISTINCT FROM $3
              AND revoked_at IS NULL
            "#,
        )
        .bind(now)
        .bind(user_id.as_uuid())
        .bind(organization_id.map(|id| *id.as_uuid()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("revoke_all", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(user = %user_id))]
    async fn revoke_every(&self, user_id: UserId, now: DateTime<Utc>) -> AccessResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE user_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(now)
        .bind(user_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("revoke_every", e))?;

        Ok(result.rows_affected())
    }
}
