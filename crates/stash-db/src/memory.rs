//! In-memory implementations of the store traits.
//!
//! Used by tests across the workspace and for running the server without
//! PostgreSQL. [`MemoryStore`] keeps files, favorites and deletion rows
//! behind one lock, so every trait method is atomic the same way a single
//! database transaction would be.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use stash_core::{
    Chunk, CreateFileRequest, DeletionRepository, EmbeddingBackend, Error, Favorite,
    FavoriteRepository, FavoriteToggle, FileFilter, FileRecord, FileRepository,
    ListFilesRequest, ListedFile, Result, ScheduleDeletionRequest, ScheduledDeletion,
    SemanticHit, SemanticIndex,
};

use crate::file_storage::StorageBackend;

#[derive(Default)]
struct MemoryState {
    next_file_id: i64,
    next_favorite_id: i64,
    next_deletion_id: i64,
    files: BTreeMap<i64, FileRecord>,
    favorites: BTreeMap<i64, Favorite>,
    /// Keyed by file id.
    deletions: BTreeMap<i64, ScheduledDeletion>,
}

impl MemoryState {
    fn remove_file_cascade(&mut self, file_id: i64) -> bool {
        self.favorites.retain(|_, f| f.file_id != file_id);
        let row = self.deletions.remove(&file_id).is_some();
        let file = self.files.remove(&file_id).is_some();
        row || file
    }
}

/// In-memory metadata store implementing the file, favorite and deletion
/// repositories.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_inserts: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make subsequent `FileRepository::insert` calls fail.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of file records.
    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }

    /// Number of deletion rows.
    pub fn deletion_count(&self) -> usize {
        self.lock().deletions.len()
    }

    /// Set a file's pending flag without touching its deletion row.
    ///
    /// Breaks the flag/row invariant on purpose, to simulate a crash between
    /// two non-transactional writes.
    pub fn force_pending_flag(&self, file_id: i64, pending: bool) {
        if let Some(file) = self.lock().files.get_mut(&file_id) {
            file.pending_deletion = pending;
        }
    }

    /// Insert a deletion row as-is, bypassing the file check and the flag.
    pub fn force_deletion_row(&self, row: ScheduledDeletion) {
        let mut state = self.lock();
        state.next_deletion_id = state.next_deletion_id.max(row.id);
        state.deletions.insert(row.file_id, row);
    }
}

#[async_trait]
impl FileRepository for MemoryStore {
    async fn insert(&self, req: CreateFileRequest) -> Result<FileRecord> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(Error::Internal("injected insert failure".to_string()));
        }
        let mut state = self.lock();
        if state.files.values().any(|f| f.storage_key == req.storage_key) {
            return Err(Error::InvalidInput(format!(
                "duplicate storage key {}",
                req.storage_key
            )));
        }
        state.next_file_id += 1;
        let now = Utc::now();
        let file = FileRecord {
            id: state.next_file_id,
            display_name: req.display_name,
            storage_key: req.storage_key,
            owner_id: req.owner_id,
            format: req.format,
            created_at: now,
            updated_at: now,
            pending_deletion: false,
        };
        state.files.insert(file.id, file.clone());
        Ok(file)
    }

    async fn get(&self, id: i64) -> Result<Option<FileRecord>> {
        Ok(self.lock().files.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<FileRecord>> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.files.get(id).cloned()).collect())
    }

    async fn list(&self, req: ListFilesRequest) -> Result<Vec<ListedFile>> {
        let state = self.lock();
        let mut listed: Vec<ListedFile> = state
            .files
            .values()
            .filter(|f| req.matches(f))
            .map(|f| ListedFile {
                data: f.clone(),
                fav: state
                    .favorites
                    .values()
                    .find(|fav| fav.file_id == f.id && fav.owner_id == req.owner_id)
                    .map(|fav| fav.id),
            })
            .filter(|l| req.filter != FileFilter::Favorites || l.fav.is_some())
            .collect();
        listed.sort_by(|a, b| {
            b.data
                .created_at
                .cmp(&a.data.created_at)
                .then(b.data.id.cmp(&a.data.id))
        });
        Ok(listed)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut state = self.lock();
        if !state.files.contains_key(&id) {
            return Ok(false);
        }
        Ok(state.remove_file_cascade(id))
    }
}

#[async_trait]
impl FavoriteRepository for MemoryStore {
    async fn toggle(&self, owner_id: i64, file_id: i64) -> Result<FavoriteToggle> {
        let mut state = self.lock();
        let owned = state
            .files
            .get(&file_id)
            .is_some_and(|f| f.owner_id == owner_id);
        if !owned {
            return Err(Error::FileNotFound(file_id));
        }

        let existing = state
            .favorites
            .values()
            .find(|f| f.owner_id == owner_id && f.file_id == file_id)
            .map(|f| f.id);
        if let Some(id) = existing {
            if let Some(removed) = state.favorites.remove(&id) {
                return Ok(FavoriteToggle::Removed(removed));
            }
        }

        state.next_favorite_id += 1;
        let favorite = Favorite {
            id: state.next_favorite_id,
            owner_id,
            file_id,
        };
        state.favorites.insert(favorite.id, favorite.clone());
        Ok(FavoriteToggle::Added(favorite))
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Favorite>> {
        Ok(self
            .lock()
            .favorites
            .values()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeletionRepository for MemoryStore {
    async fn schedule(&self, req: ScheduleDeletionRequest) -> Result<Option<ScheduledDeletion>> {
        let mut state = self.lock();
        if !state.files.contains_key(&req.file_id) {
            return Err(Error::FileNotFound(req.file_id));
        }
        if state.deletions.contains_key(&req.file_id) {
            return Ok(None);
        }

        state.next_deletion_id += 1;
        let now = Utc::now();
        let row = ScheduledDeletion {
            id: state.next_deletion_id,
            file_id: req.file_id,
            job_token: req.job_token,
            created_at: now,
            fire_at: req.fire_at,
            attempts: 0,
            last_error: None,
        };
        state.deletions.insert(req.file_id, row.clone());
        if let Some(file) = state.files.get_mut(&req.file_id) {
            file.pending_deletion = true;
            file.updated_at = now;
        }
        Ok(Some(row))
    }

    async fn get(&self, file_id: i64) -> Result<Option<ScheduledDeletion>> {
        Ok(self.lock().deletions.get(&file_id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ScheduledDeletion>> {
        let mut rows: Vec<_> = self.lock().deletions.values().cloned().collect();
        rows.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn cancel(&self, file_id: i64) -> Result<bool> {
        let mut state = self.lock();
        if state.deletions.remove(&file_id).is_none() {
            return Ok(false);
        }
        if let Some(file) = state.files.get_mut(&file_id) {
            file.pending_deletion = false;
            file.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn record_failure(&self, file_id: i64, error: &str) -> Result<()> {
        if let Some(row) = self.lock().deletions.get_mut(&file_id) {
            row.attempts += 1;
            row.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn purge(&self, file_id: i64) -> Result<bool> {
        Ok(self.lock().remove_file_cascade(file_id))
    }

    async fn repair_flag(&self, file_id: i64) -> Result<bool> {
        let mut state = self.lock();
        if !state.deletions.contains_key(&file_id) {
            return Ok(false);
        }
        match state.files.get_mut(&file_id) {
            Some(file) if !file.pending_deletion => {
                file.pending_deletion = true;
                file.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_orphan_flags(&self) -> Result<Vec<i64>> {
        let state = self.lock();
        Ok(state
            .files
            .values()
            .filter(|f| f.pending_deletion && !state.deletions.contains_key(&f.id))
            .map(|f| f.id)
            .collect())
    }

    async fn clear_orphan_flag(&self, file_id: i64) -> Result<bool> {
        let mut state = self.lock();
        if state.deletions.contains_key(&file_id) {
            return Ok(false);
        }
        match state.files.get_mut(&file_id) {
            Some(file) if file.pending_deletion => {
                file.pending_deletion = false;
                file.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// =============================================================================
// BLOB STORE
// =============================================================================

/// In-memory blob store with failure injection.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing_deletes: Arc<AtomicU32>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `n` delete calls fail.
    pub fn fail_next_deletes(&self, n: u32) {
        self.failing_deletes.store(n, Ordering::SeqCst);
    }

    /// Make subsequent write calls fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Whether a blob is stored under the key.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no blob is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("injected write failure for {key}")));
        }
        self.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blob {key}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let injected = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::Storage(format!("injected delete failure for {key}")));
        }
        self.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.contains(key))
    }
}

// =============================================================================
// SEMANTIC INDEX
// =============================================================================

struct IndexedChunk {
    text: String,
    vector: Vec<f32>,
}

/// In-memory semantic index using cosine similarity over an embedding backend.
///
/// Owner and pending-deletion scoping reads the file records of the
/// [`MemoryStore`] the index was built over.
#[derive(Clone)]
pub struct MemorySemanticIndex {
    embedder: Arc<dyn EmbeddingBackend>,
    files: MemoryStore,
    entries: Arc<Mutex<HashMap<i64, Vec<IndexedChunk>>>>,
    fail_upserts: Arc<AtomicBool>,
}

impl MemorySemanticIndex {
    /// Create an empty index over the given embedding backend and store.
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, files: MemoryStore) -> Self {
        Self {
            embedder,
            files,
            entries: Arc::new(Mutex::new(HashMap::new())),
            fail_upserts: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, Vec<IndexedChunk>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make subsequent upserts fail.
    pub fn set_fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Whether any chunk is indexed for the file.
    pub fn contains(&self, file_id: i64) -> bool {
        self.lock().contains_key(&file_id)
    }
}

#[async_trait]
impl SemanticIndex for MemorySemanticIndex {
    async fn upsert(&self, file_id: i64, chunks: &[Chunk]) -> Result<usize> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(Error::Index("injected upsert failure".to_string()));
        }
        if chunks.is_empty() {
            self.lock().remove(&file_id);
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts).await?;
        let indexed: Vec<IndexedChunk> = texts
            .into_iter()
            .zip(vectors)
            .map(|(text, v)| IndexedChunk {
                text,
                vector: v.to_vec(),
            })
            .collect();
        let count = indexed.len();
        self.lock().insert(file_id, indexed);
        Ok(count)
    }

    async fn query(&self, owner_id: i64, text: &str, limit: i64) -> Result<Vec<SemanticHit>> {
        if text.trim().is_empty() || limit <= 0 {
            return Ok(Vec::new());
        }
        let query = self
            .embedder
            .embed_texts(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Embedding("no embedding returned".to_string()))?
            .to_vec();

        let searchable: HashSet<i64> = self
            .files
            .lock()
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && !f.pending_deletion)
            .map(|f| f.id)
            .collect();

        let entries = self.lock();
        let mut hits: Vec<SemanticHit> = entries
            .iter()
            .filter(|(file_id, _)| searchable.contains(file_id))
            .filter_map(|(file_id, chunks)| {
                chunks
                    .iter()
                    .map(|c| (cosine_similarity(&query, &c.vector), c))
                    .max_by(|a, b| a.0.total_cmp(&b.0))
                    .map(|(score, c)| SemanticHit {
                        file_id: *file_id,
                        score,
                        snippet: Some(c.text.chars().take(200).collect()),
                    })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.file_id.cmp(&b.file_id)));
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn remove(&self, file_id: i64) -> Result<()> {
        self.lock().remove(&file_id);
        Ok(())
    }
}

/// Cosine similarity of two vectors; zero when either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_core::{Chunker, SlidingWindowChunker};
    use stash_inference::mock::MockEmbeddingBackend;
    use uuid::Uuid;

    fn create(owner_id: i64, name: &str) -> CreateFileRequest {
        CreateFileRequest {
            display_name: name.to_string(),
            storage_key: format!("files/{}", Uuid::now_v7()),
            owner_id,
            format: "pdf".to_string(),
        }
    }

    fn schedule_req(file_id: i64) -> ScheduleDeletionRequest {
        ScheduleDeletionRequest {
            file_id,
            job_token: Uuid::now_v7(),
            fire_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_and_filters() {
        let store = MemoryStore::new();
        let a = store.insert(create(1, "Alpha report")).await.unwrap();
        let b = store.insert(create(1, "beta")).await.unwrap();
        store.insert(create(2, "other owner")).await.unwrap();

        let listed = store.list(ListFilesRequest::new(1)).await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|l| l.data.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        let searched = store
            .list(ListFilesRequest::new(1).with_query(Some("REPORT".into())))
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].data.id, a.id);
    }

    #[tokio::test]
    async fn test_favorite_toggle_and_listing_join() {
        let store = MemoryStore::new();
        let file = store.insert(create(1, "doc")).await.unwrap();

        let added = store.toggle(1, file.id).await.unwrap();
        assert!(matches!(added, FavoriteToggle::Added(_)));

        let favs = store
            .list(ListFilesRequest::new(1).with_filter(FileFilter::Favorites))
            .await
            .unwrap();
        assert_eq!(favs.len(), 1);
        assert_eq!(favs[0].fav, Some(added.favorite().id));

        let removed = store.toggle(1, file.id).await.unwrap();
        assert_eq!(removed, FavoriteToggle::Removed(added.favorite().clone()));
        assert!(store.list_for_owner(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_favorite_toggle_requires_owned_file() {
        let store = MemoryStore::new();
        let file = store.insert(create(1, "doc")).await.unwrap();
        assert!(matches!(
            store.toggle(2, file.id).await,
            Err(Error::FileNotFound(_))
        ));
        assert!(matches!(store.toggle(1, 999).await, Err(Error::FileNotFound(999))));
    }

    #[tokio::test]
    async fn test_schedule_is_create_if_absent() {
        let store = MemoryStore::new();
        let file = store.insert(create(1, "doc")).await.unwrap();

        let first = DeletionRepository::schedule(&store, schedule_req(file.id)).await.unwrap();
        assert!(first.is_some());
        let second = DeletionRepository::schedule(&store, schedule_req(file.id)).await.unwrap();
        assert!(second.is_none());

        let stored = FileRepository::get(&store, file.id).await.unwrap().unwrap();
        assert!(stored.pending_deletion);
        assert_eq!(store.deletion_count(), 1);
    }

    #[tokio::test]
    async fn test_schedule_missing_file() {
        let store = MemoryStore::new();
        let err = DeletionRepository::schedule(&store, schedule_req(5)).await.unwrap_err();
        assert!(matches!(err, Error::FileNotFound(5)));
    }

    #[tokio::test]
    async fn test_cancel_clears_flag_and_row() {
        let store = MemoryStore::new();
        let file = store.insert(create(1, "doc")).await.unwrap();
        DeletionRepository::schedule(&store, schedule_req(file.id)).await.unwrap();

        assert!(store.cancel(file.id).await.unwrap());
        assert!(!store.cancel(file.id).await.unwrap());
        let stored = FileRepository::get(&store, file.id).await.unwrap().unwrap();
        assert!(!stored.pending_deletion);
        assert_eq!(store.deletion_count(), 0);
    }

    #[tokio::test]
    async fn test_purge_cascades_favorites() {
        let store = MemoryStore::new();
        let file = store.insert(create(1, "doc")).await.unwrap();
        store.toggle(1, file.id).await.unwrap();
        DeletionRepository::schedule(&store, schedule_req(file.id)).await.unwrap();

        assert!(DeletionRepository::purge(&store, file.id).await.unwrap());
        assert_eq!(store.file_count(), 0);
        assert_eq!(store.deletion_count(), 0);
        assert!(store.list_for_owner(1).await.unwrap().is_empty());
        assert!(!DeletionRepository::purge(&store, file.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_failure_increments_attempts() {
        let store = MemoryStore::new();
        let file = store.insert(create(1, "doc")).await.unwrap();
        DeletionRepository::schedule(&store, schedule_req(file.id)).await.unwrap();

        store.record_failure(file.id, "disk offline").await.unwrap();
        store.record_failure(file.id, "still offline").await.unwrap();
        let row = DeletionRepository::get(&store, file.id).await.unwrap().unwrap();
        assert_eq!(row.attempts, 2);
        assert_eq!(row.last_error.as_deref(), Some("still offline"));
    }

    #[tokio::test]
    async fn test_orphan_flag_repair_helpers() {
        let store = MemoryStore::new();
        let flagged = store.insert(create(1, "flag only")).await.unwrap();
        let rowed = store.insert(create(1, "row only")).await.unwrap();

        store.force_pending_flag(flagged.id, true);
        DeletionRepository::schedule(&store, schedule_req(rowed.id)).await.unwrap();
        store.force_pending_flag(rowed.id, false);

        assert_eq!(store.list_orphan_flags().await.unwrap(), vec![flagged.id]);
        assert!(store.clear_orphan_flag(flagged.id).await.unwrap());
        assert!(!store.clear_orphan_flag(rowed.id).await.unwrap());

        assert!(store.repair_flag(rowed.id).await.unwrap());
        assert!(!store.repair_flag(rowed.id).await.unwrap());
        assert!(store.list_orphan_flags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_backend_failure_injection() {
        let backend = MemoryBackend::new();
        backend.write("k", b"v").await.unwrap();
        backend.fail_next_deletes(2);
        assert!(backend.delete("k").await.is_err());
        assert!(backend.delete("k").await.is_err());
        backend.delete("k").await.unwrap();
        assert!(!backend.contains("k"));
        backend.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_index_ranks_by_similarity() {
        let store = MemoryStore::new();
        let index = MemorySemanticIndex::new(Arc::new(MockEmbeddingBackend::new()), store.clone());
        let chunker = SlidingWindowChunker::default();
        let rust = store.insert(create(1, "rust")).await.unwrap();
        let cake = store.insert(create(1, "cake")).await.unwrap();

        index
            .upsert(rust.id, &chunker.chunk("rust ownership and borrowing rules"))
            .await
            .unwrap();
        index
            .upsert(cake.id, &chunker.chunk("chocolate cake baking recipe"))
            .await
            .unwrap();

        let hits = index.query(1, "borrowing rules in rust", 3).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].file_id, rust.id);
        assert!(hits[0].score > hits[1].score);

        index.remove(rust.id).await.unwrap();
        assert!(!index.contains(rust.id));
        let hits = index.query(1, "borrowing rules in rust", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_index_scopes_before_limit() {
        let store = MemoryStore::new();
        let index = MemorySemanticIndex::new(Arc::new(MockEmbeddingBackend::new()), store.clone());
        let chunker = SlidingWindowChunker::default();

        // Other owners' exact matches outrank the caller's partial match.
        for i in 0..60 {
            let other = store.insert(create(2, &format!("other {i}"))).await.unwrap();
            index
                .upsert(other.id, &chunker.chunk("garden irrigation plan"))
                .await
                .unwrap();
        }
        let pending = store.insert(create(1, "pending")).await.unwrap();
        index
            .upsert(pending.id, &chunker.chunk("garden irrigation plan"))
            .await
            .unwrap();
        store.force_pending_flag(pending.id, true);
        let mine = store.insert(create(1, "mine")).await.unwrap();
        index
            .upsert(mine.id, &chunker.chunk("garden irrigation notes for spring"))
            .await
            .unwrap();

        let hits = index.query(1, "garden irrigation plan", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_id, mine.id);
        assert_eq!(index.query(2, "garden irrigation plan", 3).await.unwrap().len(), 3);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
