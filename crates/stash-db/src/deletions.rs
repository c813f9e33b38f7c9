//! Scheduled deletion bookkeeping.
//!
//! Each mutation updates the `scheduled_deletion` row and the file's
//! `pending_deletion` flag in one transaction.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::debug;

use stash_core::{
    DeletionRepository, Error, Result, ScheduleDeletionRequest, ScheduledDeletion,
};

const DELETION_COLUMNS: &str = "id, file_id, job_token, created_at, fire_at, attempts, last_error";

/// PostgreSQL implementation of DeletionRepository.
#[derive(Clone)]
pub struct PgDeletionRepository {
    pool: Pool<Postgres>,
}

impl PgDeletionRepository {
    /// Create a new PgDeletionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create-if-absent within an existing transaction.
    pub async fn schedule_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: &ScheduleDeletionRequest,
    ) -> Result<Option<ScheduledDeletion>> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM file WHERE id = $1 FOR UPDATE")
            .bind(req.file_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        if exists.is_none() {
            return Err(Error::FileNotFound(req.file_id));
        }

        let sql = format!(
            "INSERT INTO scheduled_deletion (file_id, job_token, created_at, fire_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (file_id) DO NOTHING
             RETURNING {DELETION_COLUMNS}"
        );
        let now = Utc::now();
        let row = sqlx::query(&sql)
            .bind(req.file_id)
            .bind(req.job_token)
            .bind(now)
            .bind(req.fire_at)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("UPDATE file SET pending_deletion = TRUE, updated_at = $2 WHERE id = $1")
            .bind(req.file_id)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        Ok(Some(deletion_from_row(&row)))
    }

    /// Remove the file and everything attached to it within an existing transaction.
    pub async fn purge_tx(&self, tx: &mut Transaction<'_, Postgres>, file_id: i64) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM scheduled_deletion WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        sqlx::query("DELETE FROM favorite WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query("DELETE FROM file_chunk_embedding WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let files = sqlx::query("DELETE FROM file WHERE id = $1")
            .bind(file_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        debug!(
            subsystem = "db",
            component = "deletions",
            op = "purge",
            file_id,
            rows,
            files,
            "Purged file metadata"
        );
        Ok(rows + files > 0)
    }
}

#[async_trait]
impl DeletionRepository for PgDeletionRepository {
    async fn schedule(&self, req: ScheduleDeletionRequest) -> Result<Option<ScheduledDeletion>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let created = self.schedule_tx(&mut tx, &req).await?;
        if created.is_some() {
            tx.commit().await.map_err(Error::Database)?;
        } else {
            tx.rollback().await.map_err(Error::Database)?;
        }
        Ok(created)
    }

    async fn get(&self, file_id: i64) -> Result<Option<ScheduledDeletion>> {
        let sql = format!("SELECT {DELETION_COLUMNS} FROM scheduled_deletion WHERE file_id = $1");
        let row = sqlx::query(&sql)
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(deletion_from_row))
    }

    async fn list_all(&self) -> Result<Vec<ScheduledDeletion>> {
        let sql = format!("SELECT {DELETION_COLUMNS} FROM scheduled_deletion ORDER BY fire_at, id");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(deletion_from_row).collect())
    }

    async fn cancel(&self, file_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let removed = sqlx::query("DELETE FROM scheduled_deletion WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        if removed == 0 {
            tx.rollback().await.map_err(Error::Database)?;
            return Ok(false);
        }

        sqlx::query("UPDATE file SET pending_deletion = FALSE, updated_at = $2 WHERE id = $1")
            .bind(file_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(true)
    }

    async fn record_failure(&self, file_id: i64, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_deletion SET attempts = attempts + 1, last_error = $2
             WHERE file_id = $1",
        )
        .bind(file_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn purge(&self, file_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let purged = self.purge_tx(&mut tx, file_id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(purged)
    }

    async fn repair_flag(&self, file_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE file SET pending_deletion = TRUE, updated_at = $2
             WHERE id = $1 AND NOT pending_deletion
               AND EXISTS (SELECT 1 FROM scheduled_deletion d WHERE d.file_id = $1)",
        )
        .bind(file_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_orphan_flags(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT f.id FROM file f
             WHERE f.pending_deletion
               AND NOT EXISTS (SELECT 1 FROM scheduled_deletion d WHERE d.file_id = f.id)
             ORDER BY f.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(ids)
    }

    async fn clear_orphan_flag(&self, file_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE file SET pending_deletion = FALSE, updated_at = $2
             WHERE id = $1 AND pending_deletion
               AND NOT EXISTS (SELECT 1 FROM scheduled_deletion d WHERE d.file_id = $1)",
        )
        .bind(file_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

fn deletion_from_row(row: &PgRow) -> ScheduledDeletion {
    ScheduledDeletion {
        id: row.get("id"),
        file_id: row.get("file_id"),
        job_token: row.get("job_token"),
        created_at: row.get("created_at"),
        fire_at: row.get("fire_at"),
        attempts: row.get("attempts"),
        last_error: row.get("last_error"),
    }
}
