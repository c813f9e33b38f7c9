//! # stash-core
//!
//! Core types, traits, and abstractions for the stash file backend.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other stash crates depend on: file/favorite/deletion models, the
//! repository and collaborator traits (metadata store, blob store, semantic
//! index, embedding backend, extraction adapters), the shared error type and
//! the centralized defaults.

pub mod chunking;
pub mod defaults;
pub mod error;
pub mod formats;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use chunking::{Chunk, Chunker, ChunkerConfig, SlidingWindowChunker};
pub use error::{Error, Result};
pub use formats::{split_filename, DocumentFormat};
pub use models::*;
pub use traits::*;

/// Embedding vector type (shared with pgvector).
pub use pgvector::Vector;
