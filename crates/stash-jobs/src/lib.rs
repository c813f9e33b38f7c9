//! # stash-jobs
//!
//! Background work for stash.
//!
//! This crate provides:
//! - The deferred deletion scheduler (soft delete, timed purge, restore)
//! - Per-file locking and bounded retry used by the scheduler
//! - Text extraction dispatched by document format
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stash_jobs::{DeletionScheduler, SchedulerConfig};
//!
//! let scheduler = DeletionScheduler::new(
//!     SchedulerConfig::from_env(),
//!     Arc::new(db.files.clone()),
//!     Arc::new(db.deletions.clone()),
//!     blobs,
//!     index,
//! );
//!
//! // Re-arm pending deletions and keep sweeping in the background
//! let handle = scheduler.start();
//!
//! scheduler.schedule_default(file_id).await?;
//! scheduler.cancel(file_id).await?;
//!
//! handle.shutdown().await?;
//! ```

pub mod adapters;
pub mod extraction;
pub mod locks;
pub mod retry;
pub mod scheduler;

// Re-export core types
pub use stash_core::*;

pub use adapters::{
    OfficeConvertAdapter, PdfTextAdapter, SpreadsheetConvertAdapter, TextNativeAdapter,
};
pub use extraction::{flatten_whitespace, ExtractionRegistry};
pub use locks::{FileLockGuard, FileLocks};
pub use retry::RetryPolicy;
pub use scheduler::{
    DeletionEvent, DeletionScheduler, PurgeOutcome, SchedulerConfig, SchedulerHandle,
};
