//! Mock embedding backend for deterministic testing.
//!
//! Embeddings are built by hashing lowercase word tokens into buckets, so
//! texts sharing words land close together under cosine similarity. No
//! network access, no model; the same text always yields the same vector.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stash_inference::mock::MockEmbeddingBackend;
//! use stash_core::EmbeddingBackend;
//!
//! let backend = MockEmbeddingBackend::new().with_dimension(64);
//! assert_eq!(backend.dimension(), 64);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use stash_core::{defaults, EmbeddingBackend, Error, Result, Vector};

/// Deterministic feature-hashing embedding backend.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl MockEmbeddingBackend {
    /// Create a mock backend with the default dimension.
    pub fn new() -> Self {
        Self {
            dimension: defaults::EMBED_DIMENSION,
            fail: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }

    /// Make subsequent calls fail with an embedding error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of `embed_texts` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Embed a single text.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(&token.to_lowercase());
            let idx = (hash % self.dimension as u64) as usize;
            // High bit picks the sign.
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vec[idx] += sign;
        }
        normalize(&mut vec);
        vec
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Embedding("Simulated failure for testing".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| Vector::from(self.embed_one(t)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn normalize(vec: &mut [f32]) {
    let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        vec.iter_mut().for_each(|x| *x /= magnitude);
    }
}
