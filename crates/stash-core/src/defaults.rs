//! Centralized default constants for stash.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// CHUNKING
// =============================================================================

/// Maximum characters per chunk sent to the semantic index.
pub const CHUNK_SIZE: usize = 1050;

/// Overlap characters between adjacent chunks.
pub const CHUNK_OVERLAP: usize = 50;

// =============================================================================
// EMBEDDING / SEMANTIC INDEX
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "all-minilm";

/// Default embedding vector dimension for all-minilm.
pub const EMBED_DIMENSION: usize = 384;

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Timeout for a single embedding request.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Number of files returned by a semantic query when the caller gives no limit.
pub const SEMANTIC_TOP_K: i64 = 3;

/// Upper bound on the semantic query limit.
pub const SEMANTIC_MAX_LIMIT: i64 = 50;

// =============================================================================
// DELETION SCHEDULER
// =============================================================================

/// Delay between a soft delete and the purge, in seconds.
pub const DELETION_DELAY_SECS: u64 = 15;

/// Interval between reconciliation sweeps, in seconds.
pub const DELETION_SWEEP_INTERVAL_SECS: u64 = 60;

/// Blob delete attempts per purge before the row is left for the next sweep.
pub const PURGE_MAX_ATTEMPTS: u32 = 5;

/// Initial backoff between blob delete attempts (doubles per attempt).
pub const PURGE_BACKOFF_MS: u64 = 200;

/// Upper bound on a single backoff interval.
pub const PURGE_BACKOFF_MAX_MS: u64 = 10_000;

/// Capacity of the scheduler's event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Timeout for an external extraction command (pdftotext, pandoc, soffice).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default maximum upload size (50 MiB).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default blob storage directory for the filesystem backend.
pub const BLOB_STORAGE_PATH: &str = "./data/blobs";
