//! Release ledger repository.
//!
//! The ledger is the only source of truth for "has this version been
//! announced". Every mutating call has committed by the time it returns.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::ReleaseDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;

/// Release ledger repository trait.
#[async_trait]
pub trait ReleaseRepository: Send + Sync {
    /// Whether `(mod_id, version)` has already been announced.
    async fn is_released(&self, mod_id: &str, version: &str) -> Result<bool>;

    /// Record `(mod_id, version)` as announced.
    ///
    /// Inserting an existing key is a no-op. Returns `true` when a new row was written.
    async fn mark_released(&self, mod_id: &str, version: &str) -> Result<bool>;

    /// All versions recorded for a mod.
    async fn get_released_versions(&self, mod_id: &str) -> Result<HashSet<String>>;

    /// Most recent releases first.
    async fn get_recent(&self, limit: i64) -> Result<Vec<ReleaseDbModel>>;

    /// Total number of recorded releases.
    async fn count(&self) -> Result<i64>;
}

/// SQLx implementation of ReleaseRepository.
pub struct SqlxReleaseRepository {
    pool: SqlitePool,
}

impl SqlxReleaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReleaseRepository for SqlxReleaseRepository {
    async fn is_released(&self, mod_id: &str, version: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM releases WHERE mod_id = ? AND version = ?")
                .bind(mod_id)
                .bind(version)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn mark_released(&self, mod_id: &str, version: &str) -> Result<bool> {
        retry_on_sqlite_busy("mark_released", || async {
            let result = sqlx::query(
                r#"
                INSERT INTO releases (mod_id, version, released_at)
                VALUES (?, ?, ?)
                ON CONFLICT (mod_id, version) DO NOTHING
                "#,
            )
            .bind(mod_id)
            .bind(version)
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn get_released_versions(&self, mod_id: &str) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT version FROM releases WHERE mod_id = ?")
            .bind(mod_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    async fn get_recent(&self, limit: i64) -> Result<Vec<ReleaseDbModel>> {
        let releases = sqlx::query_as::<_, ReleaseDbModel>(
            r#"
            SELECT mod_id, version, released_at FROM releases
            ORDER BY released_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(releases)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM releases")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
