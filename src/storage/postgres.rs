use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::config::{DatabaseConfig, StorageConfig};
use crate::error::SecretError;
use crate::models::Secret;
use crate::storage::{SecretStorage, StorageResult};

#[derive(Debug, FromRow)]
struct SecretRow {
    id: String,
    secret_text: String,
    created_at: OffsetDateTime,
    expires_at: Option<OffsetDateTime>,
    remaining_views: i32,
}

impl From<SecretRow> for Secret {
    fn from(row: SecretRow) -> Self {
        Self {
            handle: row.id,
            content: row.secret_text,
            created_at: row.created_at,
            expires_at: row.expires_at,
            remaining_views: row.remaining_views,
        }
    }
}

/// Backend sharing secrets across processes through one PostgreSQL table.
///
/// Every `get` runs in its own transaction holding a row lock, so concurrent
/// readers of one handle are serialised by the database.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
    transaction_timeout: Duration,
}

impl PostgresStorage {
    pub async fn new(database: &DatabaseConfig, storage: &StorageConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(database.max_connections)
            .connect(&database.connection_string())
            .await?;

        Self::from_pool(pool, Duration::from_millis(storage.transaction_timeout_ms)).await
    }

    /// Wraps an existing pool, applying pending migrations first.
    pub async fn from_pool(pool: PgPool, transaction_timeout: Duration) -> StorageResult<Self> {
        sqlx::migrate!().run(&pool).await?;

        Ok(Self {
            pool,
            transaction_timeout,
        })
    }

    async fn take_view(&self, handle: &str) -> StorageResult<Secret> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SecretRow>(
            r#"
            SELECT id, secret_text, created_at, expires_at, remaining_views
            FROM secret
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(handle)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(SecretError::NotFound);
        };
        let mut secret = Secret::from(row);

        if !secret.is_available() {
            sqlx::query("DELETE FROM secret WHERE id = $1")
                .bind(handle)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::debug!(handle, "deleted unavailable secret");
            return Err(SecretError::NotAvailable);
        }

        secret.remaining_views -= 1;
        if secret.remaining_views == 0 {
            sqlx::query("DELETE FROM secret WHERE id = $1")
                .bind(handle)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("UPDATE secret SET remaining_views = remaining_views - 1 WHERE id = $1")
                .bind(handle)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(secret)
    }
}

#[async_trait]
impl SecretStorage for PostgresStorage {
    async fn store(
        &self,
        content: &str,
        requested_views: i32,
        ttl_minutes: i64,
    ) -> StorageResult<Secret> {
        let secret = Secret::new(content, requested_views, ttl_minutes)?;

        sqlx::query(
            r#"
            INSERT INTO secret (id, secret_text, created_at, expires_at, remaining_views)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&secret.handle)
        .bind(&secret.content)
        .bind(secret.created_at)
        .bind(secret.expires_at)
        .bind(secret.remaining_views)
        .execute(&self.pool)
        .await?;

        tracing::debug!(handle = %secret.handle, "stored secret");
        Ok(secret)
    }

    async fn get(&self, handle: &str) -> StorageResult<Secret> {
        // Dropping the timed-out future drops the transaction, which rolls it back.
        match tokio::time::timeout(self.transaction_timeout, self.take_view(handle)).await {
            Ok(Ok(secret)) => Ok(secret),
            Ok(Err(e)) if e.is_gone() => Err(e),
            Ok(Err(e)) => {
                tracing::error!(handle, error = %e, "secret retrieval failed");
                Err(SecretError::NotAvailable)
            }
            Err(_) => {
                tracing::warn!(
                    handle,
                    timeout_ms = self.transaction_timeout.as_millis() as u64,
                    "secret retrieval timed out"
                );
                Err(SecretError::NotAvailable)
            }
        }
    }

    async fn purge_unavailable(&self) -> StorageResult<Vec<String>> {
        let purged = sqlx::query_scalar::<_, String>(
            r#"
            DELETE FROM secret
            WHERE remaining_views <= 0
               OR (expires_at IS NOT NULL AND expires_at <= $1)
            RETURNING id
            "#,
        )
        .bind(OffsetDateTime::now_utc())
        .fetch_all(&self.pool)
        .await?;

        Ok(purged)
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
