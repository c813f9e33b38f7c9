//! File metadata repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};

use stash_core::{
    CreateFileRequest, Error, FileFilter, FileRecord, FileRepository, ListFilesRequest,
    ListedFile, Result,
};

/// Columns selected for a `FileRecord`, prefixed with the `f` alias.
pub(crate) const FILE_COLUMNS: &str = "f.id, f.display_name, f.storage_key, f.owner_id, \
     f.format, f.created_at, f.updated_at, f.pending_deletion";

/// PostgreSQL implementation of FileRepository.
#[derive(Clone)]
pub struct PgFileRepository {
    pool: Pool<Postgres>,
}

impl PgFileRepository {
    /// Create a new PgFileRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a file record within an existing transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: CreateFileRequest,
    ) -> Result<FileRecord> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO file AS f (display_name, storage_key, owner_id, format, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING {FILE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&req.display_name)
            .bind(&req.storage_key)
            .bind(req.owner_id)
            .bind(&req.format)
            .bind(now)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(file_from_row(&row))
    }

    /// Fetch a file record within an existing transaction, locking the row.
    pub async fn get_for_update_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM file f WHERE f.id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(file_from_row))
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn insert(&self, req: CreateFileRequest) -> Result<FileRecord> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let file = self.insert_tx(&mut tx, req).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(file)
    }

    async fn get(&self, id: i64) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM file f WHERE f.id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(file_from_row))
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<FileRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {FILE_COLUMNS} FROM file f WHERE f.id = ANY($1)");
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(file_from_row).collect())
    }

    async fn list(&self, req: ListFilesRequest) -> Result<Vec<ListedFile>> {
        let favorites_clause = match req.filter {
            FileFilter::Favorites => "AND fav.id IS NOT NULL",
            FileFilter::Active | FileFilter::Deleted => "",
        };
        let pending = matches!(req.filter, FileFilter::Deleted);

        let sql = format!(
            "SELECT {FILE_COLUMNS}, fav.id AS fav_id
             FROM file f
             LEFT JOIN favorite fav ON fav.file_id = f.id AND fav.owner_id = $1
             WHERE f.owner_id = $1
               AND f.pending_deletion = $2
               AND ($3::text IS NULL OR strpos(lower(f.display_name), $3) > 0)
               {favorites_clause}
             ORDER BY f.created_at DESC, f.id DESC"
        );

        let rows = sqlx::query(&sql)
            .bind(req.owner_id)
            .bind(pending)
            .bind(req.query.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| ListedFile {
                data: file_from_row(row),
                fav: row.get("fav_id"),
            })
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        // Favorites, deletion rows and index entries cascade.
        let result = sqlx::query("DELETE FROM file WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

/// Map a row selected with [`FILE_COLUMNS`] to a `FileRecord`.
pub(crate) fn file_from_row(row: &PgRow) -> FileRecord {
    FileRecord {
        id: row.get("id"),
        display_name: row.get("display_name"),
        storage_key: row.get("storage_key"),
        owner_id: row.get("owner_id"),
        format: row.get("format"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        pending_deletion: row.get("pending_deletion"),
    }
}
