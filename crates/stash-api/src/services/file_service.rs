//! File orchestration: upload, listing, search, favorites and the soft-delete
//! entry points.
//!
//! Uploads write the blob, then the record, then the index. A failure after
//! the blob is written removes what was already written before the error is
//! returned. Extraction failures are not errors: the file is stored but not
//! semantically searchable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use stash_core::defaults::SEMANTIC_MAX_LIMIT;
use stash_core::{
    split_filename, Chunker, CreateFileRequest, DocumentFormat, Error, FavoriteRepository,
    FavoriteToggle, FileFilter, FileRecord, FileRepository, ListFilesRequest, ListedFile, Result,
    ScheduledDeletion, SemanticIndex, SemanticMatch, SlidingWindowChunker,
};
use stash_db::{generate_storage_key, StorageBackend};
use stash_jobs::{DeletionScheduler, ExtractionRegistry};

/// Extension used for the storage key of files uploaded without one.
const FALLBACK_EXTENSION: &str = "bin";

/// Orchestrates the stores, the index and the deletion scheduler.
#[derive(Clone)]
pub struct FileService {
    files: Arc<dyn FileRepository>,
    favorites: Arc<dyn FavoriteRepository>,
    blobs: Arc<dyn StorageBackend>,
    index: Arc<dyn SemanticIndex>,
    scheduler: DeletionScheduler,
    extraction: Arc<ExtractionRegistry>,
    chunker: Arc<dyn Chunker>,
    semantic_top_k: i64,
}

impl FileService {
    pub fn new(
        files: Arc<dyn FileRepository>,
        favorites: Arc<dyn FavoriteRepository>,
        blobs: Arc<dyn StorageBackend>,
        index: Arc<dyn SemanticIndex>,
        scheduler: DeletionScheduler,
    ) -> Self {
        Self {
            files,
            favorites,
            blobs,
            index,
            scheduler,
            extraction: Arc::new(ExtractionRegistry::with_defaults()),
            chunker: Arc::new(SlidingWindowChunker::default()),
            semantic_top_k: stash_core::defaults::SEMANTIC_TOP_K,
        }
    }

    /// Replace the extraction registry.
    pub fn with_extraction(mut self, registry: ExtractionRegistry) -> Self {
        self.extraction = Arc::new(registry);
        self
    }

    /// Replace the chunker used before indexing.
    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set the default semantic search limit.
    pub fn with_semantic_top_k(mut self, top_k: i64) -> Self {
        self.semantic_top_k = top_k.clamp(1, SEMANTIC_MAX_LIMIT);
        self
    }

    pub fn scheduler(&self) -> &DeletionScheduler {
        &self.scheduler
    }

    pub fn extraction(&self) -> &ExtractionRegistry {
        &self.extraction
    }

    /// Store a new file and index its text.
    #[instrument(
        skip(self, data),
        fields(subsystem = "api", component = "file_service", op = "upload", bytes = data.len())
    )]
    pub async fn upload(&self, owner_id: i64, filename: &str, data: &[u8]) -> Result<FileRecord> {
        let start = Instant::now();
        let (display_name, extension) = split_filename(filename);
        if display_name.trim().is_empty() {
            return Err(Error::InvalidInput("Filename is required".to_string()));
        }

        let storage_key = generate_storage_key(if extension.is_empty() {
            FALLBACK_EXTENSION
        } else {
            &extension
        });
        self.blobs.write(&storage_key, data).await?;

        let file = match self
            .files
            .insert(CreateFileRequest {
                display_name,
                storage_key: storage_key.clone(),
                owner_id,
                format: extension.clone(),
            })
            .await
        {
            Ok(file) => file,
            Err(e) => {
                self.discard_blob(&storage_key).await;
                return Err(e);
            }
        };

        let chunks = match self.extract_text(&extension, data, filename).await {
            Some(text) => self.chunker.chunk(&text),
            None => Vec::new(),
        };

        if !chunks.is_empty() {
            if let Err(e) = self.index.upsert(file.id, &chunks).await {
                warn!(file_id = file.id, error = %e, "Indexing failed, rolling back upload");
                if let Err(cleanup) = self.index.remove(file.id).await {
                    warn!(file_id = file.id, error = %cleanup, "Index cleanup failed");
                }
                if let Err(cleanup) = self.files.delete(file.id).await {
                    warn!(file_id = file.id, error = %cleanup, "Record cleanup failed");
                }
                self.discard_blob(&storage_key).await;
                return Err(e);
            }
        }

        info!(
            file_id = file.id,
            owner_id,
            format = %file.format,
            chunk_count = chunks.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "File uploaded"
        );
        Ok(file)
    }

    /// Text of an upload, or `None` when the format has no extractor or
    /// extraction failed.
    async fn extract_text(&self, extension: &str, data: &[u8], filename: &str) -> Option<String> {
        let format = DocumentFormat::from_extension(extension)?;
        if !self.extraction.has_adapter(format) {
            return None;
        }
        match self.extraction.extract_text(format, data, filename).await {
            Ok(text) => text,
            Err(e) => {
                warn!(filename, %format, error = %e, "Extraction failed, storing file unindexed");
                None
            }
        }
    }

    async fn discard_blob(&self, storage_key: &str) {
        if let Err(e) = self.blobs.delete(storage_key).await {
            warn!(storage_key, error = %e, "Blob cleanup failed");
        }
    }

    /// List the owner's files matching `filter` and the optional name query.
    #[instrument(
        skip(self),
        fields(subsystem = "api", component = "file_service", op = "list")
    )]
    pub async fn list(
        &self,
        owner_id: i64,
        filter: FileFilter,
        query: Option<String>,
    ) -> Result<Vec<ListedFile>> {
        let listed = self
            .files
            .list(
                ListFilesRequest::new(owner_id)
                    .with_filter(filter)
                    .with_query(query),
            )
            .await?;
        debug!(result_count = listed.len(), "Listed files");
        Ok(listed)
    }

    /// Rank the owner's active files by similarity to `query`.
    ///
    /// The index scopes hits to the owner's active files before ranking. The
    /// records are re-read and re-checked, so a file purged or flagged
    /// between the two reads is dropped.
    #[instrument(
        skip(self),
        fields(subsystem = "api", component = "file_service", op = "semantic_search")
    )]
    pub async fn semantic_search(
        &self,
        owner_id: i64,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SemanticMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("Query is required".to_string()));
        }
        let limit = limit
            .unwrap_or(self.semantic_top_k)
            .clamp(1, SEMANTIC_MAX_LIMIT);

        let hits = self.index.query(owner_id, query, limit).await?;
        let ids: Vec<i64> = hits.iter().map(|h| h.file_id).collect();
        let mut records: HashMap<i64, FileRecord> = self
            .files
            .get_many(&ids)
            .await?
            .into_iter()
            .filter(|f| f.owner_id == owner_id && !f.pending_deletion)
            .map(|f| (f.id, f))
            .collect();

        let matches: Vec<SemanticMatch> = hits
            .into_iter()
            .filter_map(|hit| {
                records.remove(&hit.file_id).map(|data| SemanticMatch {
                    data,
                    score: hit.score,
                    snippet: hit.snippet,
                })
            })
            .collect();

        debug!(result_count = matches.len(), "Semantic search finished");
        Ok(matches)
    }

    /// Add the file to the owner's favorites, or remove it if already there.
    #[instrument(
        skip(self),
        fields(subsystem = "api", component = "file_service", op = "toggle_favorite")
    )]
    pub async fn toggle_favorite(&self, owner_id: i64, file_id: i64) -> Result<FavoriteToggle> {
        let toggle = self.favorites.toggle(owner_id, file_id).await?;
        debug!(?toggle, "Favorite toggled");
        Ok(toggle)
    }

    /// Fetch one of the owner's files.
    pub async fn get(&self, owner_id: i64, file_id: i64) -> Result<FileRecord> {
        match self.files.get(file_id).await? {
            Some(file) if file.owner_id == owner_id => Ok(file),
            _ => Err(Error::FileNotFound(file_id)),
        }
    }

    /// Fetch a file and its content.
    #[instrument(
        skip(self),
        fields(subsystem = "api", component = "file_service", op = "download")
    )]
    pub async fn download(&self, owner_id: i64, file_id: i64) -> Result<(FileRecord, Vec<u8>)> {
        let file = self.get(owner_id, file_id).await?;
        let data = self.blobs.read(&file.storage_key).await.map_err(|e| match e {
            // Purged between the two reads.
            Error::NotFound(_) => Error::FileNotFound(file_id),
            other => other,
        })?;
        Ok((file, data))
    }

    /// Soft-delete: the file moves to the deleted listing and is purged after
    /// the configured delay unless restored.
    #[instrument(
        skip(self),
        fields(subsystem = "api", component = "file_service", op = "delete")
    )]
    pub async fn delete(&self, owner_id: i64, file_id: i64) -> Result<ScheduledDeletion> {
        self.get(owner_id, file_id).await?;
        self.scheduler.schedule_default(file_id).await
    }

    /// Restore a soft-deleted file.
    #[instrument(
        skip(self),
        fields(subsystem = "api", component = "file_service", op = "restore")
    )]
    pub async fn restore(&self, owner_id: i64, file_id: i64) -> Result<FileRecord> {
        self.get(owner_id, file_id).await?;
        self.scheduler.cancel(file_id).await
    }
}
