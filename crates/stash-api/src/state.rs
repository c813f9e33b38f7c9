//! Shared application state and backend wiring.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};

use stash_core::{DeletionRepository, EmbeddingBackend, FavoriteRepository, FileRepository, SemanticIndex};
use stash_db::{MemoryBackend, MemorySemanticIndex, MemoryStore, StorageBackend};
use stash_jobs::{DeletionScheduler, SchedulerConfig};

use crate::config::ApiConfig;
use crate::services::FileService;

/// Global rate limiter type (direct quota, no keyed bucketing).
pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(files: FileService, config: &ApiConfig) -> Self {
        Self {
            files,
            rate_limiter: build_rate_limiter(config),
        }
    }
}

/// Build the global limiter, or `None` when disabled.
pub fn build_rate_limiter(config: &ApiConfig) -> Option<Arc<GlobalRateLimiter>> {
    if !config.rate_limit_enabled {
        return None;
    }
    let burst = NonZeroU32::new(u32::try_from(config.rate_limit_requests).unwrap_or(u32::MAX))?;
    let quota =
        Quota::with_period(Duration::from_secs(config.rate_limit_period_secs))?.allow_burst(burst);
    Some(Arc::new(RateLimiter::direct(quota)))
}

/// The collaborators a [`FileService`] is built from.
#[derive(Clone)]
pub struct Backends {
    pub files: Arc<dyn FileRepository>,
    pub favorites: Arc<dyn FavoriteRepository>,
    pub deletions: Arc<dyn DeletionRepository>,
    pub blobs: Arc<dyn StorageBackend>,
    pub index: Arc<dyn SemanticIndex>,
}

impl Backends {
    /// Process-local stores sharing one [`MemoryStore`].
    pub fn memory(embedder: Arc<dyn EmbeddingBackend>) -> Self {
        let store = MemoryStore::new();
        Self {
            files: Arc::new(store.clone()),
            favorites: Arc::new(store.clone()),
            deletions: Arc::new(store.clone()),
            blobs: Arc::new(MemoryBackend::new()),
            index: Arc::new(MemorySemanticIndex::new(embedder, store)),
        }
    }

    /// PostgreSQL metadata and index with the given blob backend.
    pub fn postgres(
        db: &stash_db::Database,
        blobs: Arc<dyn StorageBackend>,
        embedder: Arc<dyn EmbeddingBackend>,
    ) -> Self {
        Self {
            files: Arc::new(db.files.clone()),
            favorites: Arc::new(db.favorites.clone()),
            deletions: Arc::new(db.deletions.clone()),
            blobs,
            index: Arc::new(db.semantic_index(embedder)),
        }
    }

    /// Wire the deletion scheduler and the file service. The scheduler is
    /// not started.
    pub fn into_service(self, scheduler_config: SchedulerConfig, semantic_top_k: i64) -> FileService {
        let scheduler = DeletionScheduler::new(
            scheduler_config,
            self.files.clone(),
            self.deletions,
            self.blobs.clone(),
            self.index.clone(),
        );
        FileService::new(self.files, self.favorites, self.blobs, self.index, scheduler)
            .with_semantic_top_k(semantic_top_k)
    }
}
