//! Structured logging schema and field name constants for stash.
//!
//! All crates use these names for structured logging fields so log
//! aggregation can query by the same keys across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback or retry applied |
//! | INFO  | Lifecycle events (startup, shutdown), state transitions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (chunks, sweep rows) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the HTTP request. Format: UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "jobs", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "scheduler", "file_service", "pool", "semantic_index"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "schedule", "cancel", "purge", "sweep", "upload"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// File record id being operated on.
pub const FILE_ID: &str = "file_id";

/// Owner of the file.
pub const OWNER_ID: &str = "owner_id";

/// Opaque timer registry handle of a scheduled deletion.
pub const JOB_TOKEN: &str = "job_token";

/// Blob storage key.
pub const STORAGE_KEY: &str = "storage_key";

/// Search query text.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or listing.
pub const RESULT_COUNT: &str = "result_count";

/// Number of chunks sent to the semantic index.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Attempt number of a retried operation.
pub const ATTEMPT: &str = "attempt";

/// Delay before a scheduled purge, in milliseconds.
pub const DELAY_MS: &str = "delay_ms";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
