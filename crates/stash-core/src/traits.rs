//! Core traits for stash abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::chunking::Chunk;
use crate::error::Result;
use crate::formats::DocumentFormat;
use crate::models::*;

// =============================================================================
// METADATA STORE TRAITS
// =============================================================================

/// Repository for file metadata records.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Insert a new file record (active, not pending deletion).
    async fn insert(&self, req: CreateFileRequest) -> Result<FileRecord>;

    /// Get a file record by id.
    async fn get(&self, id: i64) -> Result<Option<FileRecord>>;

    /// Get the records for a set of ids. Missing ids are skipped.
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<FileRecord>>;

    /// List an owner's files, newest first, joined with their favorites.
    async fn list(&self, req: ListFilesRequest) -> Result<Vec<ListedFile>>;

    /// Hard-delete a record and everything attached to it.
    ///
    /// Only used to compensate a failed upload; deletions of user files go
    /// through the deletion scheduler.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Repository for favorites.
#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Add the favorite if absent, remove it if present.
    ///
    /// Returns `FileNotFound` if the file does not exist.
    async fn toggle(&self, owner_id: i64, file_id: i64) -> Result<FavoriteToggle>;

    /// List an owner's favorites.
    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Favorite>>;
}

/// Durable bookkeeping for scheduled deletions.
///
/// Every mutating method touches the row and the file's pending-deletion flag
/// in one transaction so that `pending_deletion ⟺ row exists` holds after each
/// call returns.
#[async_trait]
pub trait DeletionRepository: Send + Sync {
    /// Create the row and set the flag if no row exists for the file.
    ///
    /// Returns `None` if a row already exists, `FileNotFound` if the file
    /// does not exist.
    async fn schedule(&self, req: ScheduleDeletionRequest) -> Result<Option<ScheduledDeletion>>;

    /// Get the row for a file.
    async fn get(&self, file_id: i64) -> Result<Option<ScheduledDeletion>>;

    /// List every row, oldest deadline first.
    async fn list_all(&self) -> Result<Vec<ScheduledDeletion>>;

    /// Remove the row and clear the flag. Returns false if there was no row.
    async fn cancel(&self, file_id: i64) -> Result<bool>;

    /// Record a failed purge attempt on the row.
    async fn record_failure(&self, file_id: i64, error: &str) -> Result<()>;

    /// Delete the file record, its favorites, its index entries and the row.
    ///
    /// Returns false if neither a record nor a row existed.
    async fn purge(&self, file_id: i64) -> Result<bool>;

    /// Set the flag on a file that has a row but lost its flag.
    async fn repair_flag(&self, file_id: i64) -> Result<bool>;

    /// Ids of files flagged pending deletion without a row.
    async fn list_orphan_flags(&self) -> Result<Vec<i64>>;

    /// Clear the flag on a file, only if it still has no row.
    async fn clear_orphan_flag(&self, file_id: i64) -> Result<bool>;
}

// =============================================================================
// SEMANTIC INDEX TRAITS
// =============================================================================

/// Backend for generating embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for a batch of texts.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<crate::Vector>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the model name.
    fn model_name(&self) -> &str;
}

/// Similarity index over extracted file text.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Replace the indexed chunks of a file. Returns the number stored.
    async fn upsert(&self, file_id: i64, chunks: &[Chunk]) -> Result<usize>;

    /// Rank the owner's active files by similarity to the query text, best
    /// first.
    ///
    /// Files owned by someone else or pending deletion are excluded before
    /// the limit applies. Each file appears at most once, scored by its best
    /// chunk.
    async fn query(&self, owner_id: i64, text: &str, limit: i64) -> Result<Vec<SemanticHit>>;

    /// Remove every indexed chunk of a file. Idempotent.
    async fn remove(&self, file_id: i64) -> Result<()>;
}

// =============================================================================
// EXTRACTION TRAITS
// =============================================================================

/// Adapter for extracting text from a document format.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// The formats this adapter handles.
    fn formats(&self) -> &[DocumentFormat];

    /// Extract text from raw file data.
    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        format: DocumentFormat,
    ) -> Result<ExtractionResult>;

    /// Check if the adapter's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this adapter.
    fn name(&self) -> &str;
}
