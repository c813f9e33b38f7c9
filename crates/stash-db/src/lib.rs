//! # stash-db
//!
//! PostgreSQL database layer and blob storage for stash.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for files, favorites and scheduled deletions
//! - Semantic index over pgvector
//! - Filesystem blob storage
//! - In-memory implementations of every store (tests, local runs)
//!
//! ## Example
//!
//! ```rust,ignore
//! use stash_db::{Database, FileRepository, CreateFileRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/stash").await?;
//!
//!     let file = db.files.insert(CreateFileRequest {
//!         display_name: "report".to_string(),
//!         storage_key: "files/01/94/0194...pdf".to_string(),
//!         owner_id: 1,
//!         format: "pdf".to_string(),
//!     }).await?;
//!
//!     println!("Created file: {}", file.id);
//!     Ok(())
//! }
//! ```

pub mod deletions;
pub mod favorites;
pub mod file_storage;
pub mod files;
pub mod memory;
pub mod pool;
pub mod semantic_index;
pub mod test_fixtures;

use std::sync::Arc;

pub use deletions::PgDeletionRepository;
pub use favorites::PgFavoriteRepository;
pub use file_storage::{generate_storage_key, FilesystemBackend, StorageBackend};
pub use files::PgFileRepository;
pub use memory::{MemoryBackend, MemorySemanticIndex, MemoryStore};
pub use pool::{create_pool_with_config, PoolConfig};
pub use semantic_index::PgSemanticIndex;

// Re-export core types
pub use stash_core::*;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// File metadata repository.
    pub files: PgFileRepository,
    /// Favorite repository.
    pub favorites: PgFavoriteRepository,
    /// Scheduled deletion bookkeeping.
    pub deletions: PgDeletionRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            files: PgFileRepository::new(pool.clone()),
            favorites: PgFavoriteRepository::new(pool.clone()),
            deletions: PgDeletionRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool settings.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool_with_config(url, PoolConfig::default()).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Build a semantic index sharing this database's pool.
    pub fn semantic_index(&self, embedder: Arc<dyn EmbeddingBackend>) -> PgSemanticIndex {
        PgSemanticIndex::new(self.pool.clone(), embedder)
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
