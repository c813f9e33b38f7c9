//! Favorite repository.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use stash_core::{Error, Favorite, FavoriteRepository, FavoriteToggle, Result};

/// PostgreSQL implementation of FavoriteRepository.
#[derive(Clone)]
pub struct PgFavoriteRepository {
    pool: Pool<Postgres>,
}

impl PgFavoriteRepository {
    /// Create a new PgFavoriteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoriteRepository for PgFavoriteRepository {
    async fn toggle(&self, owner_id: i64, file_id: i64) -> Result<FavoriteToggle> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Lock the file so a concurrent purge cannot remove it mid-toggle.
        let owned: Option<i64> =
            sqlx::query_scalar("SELECT id FROM file WHERE id = $1 AND owner_id = $2 FOR SHARE")
                .bind(file_id)
                .bind(owner_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;
        if owned.is_none() {
            return Err(Error::FileNotFound(file_id));
        }

        let removed = sqlx::query(
            "DELETE FROM favorite WHERE owner_id = $1 AND file_id = $2
             RETURNING id, owner_id, file_id",
        )
        .bind(owner_id)
        .bind(file_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let toggle = match removed {
            Some(row) => FavoriteToggle::Removed(favorite_from_row(&row)),
            None => {
                let row = sqlx::query(
                    "INSERT INTO favorite (owner_id, file_id) VALUES ($1, $2)
                     RETURNING id, owner_id, file_id",
                )
                .bind(owner_id)
                .bind(file_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;
                FavoriteToggle::Added(favorite_from_row(&row))
            }
        };

        tx.commit().await.map_err(Error::Database)?;
        Ok(toggle)
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Favorite>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, file_id FROM favorite WHERE owner_id = $1 ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(favorite_from_row).collect())
    }
}

fn favorite_from_row(row: &PgRow) -> Favorite {
    Favorite {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        file_id: row.get("file_id"),
    }
}
