//! # stash-inference
//!
//! Embedding backends for the stash semantic index.
//!
//! This crate provides:
//! - Ollama implementation of [`EmbeddingBackend`] (default)
//! - A deterministic mock backend (feature `mock`) for tests and offline runs
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `mock`: Enable the mock backend outside of this crate's tests
//!
//! # Example
//!
//! ```rust,no_run
//! use stash_inference::OllamaBackend;
//! use stash_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env().unwrap();
//!     let texts = vec!["Hello".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use stash_core::{EmbeddingBackend, Error, Result, Vector};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaBackend, OllamaConfig};
