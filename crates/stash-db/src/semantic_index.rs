//! Semantic index backed by pgvector.
//!
//! Chunks are embedded through an [`EmbeddingBackend`] and stored in
//! `file_chunk_embedding`. Rows cascade with their file, so index entries
//! never outlive the file they were extracted from.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};

use stash_core::{Chunk, EmbeddingBackend, Error, Result, SemanticHit, SemanticIndex};

/// Characters of the best chunk returned as a snippet.
const SNIPPET_CHARS: i32 = 200;

/// PostgreSQL + pgvector implementation of SemanticIndex.
#[derive(Clone)]
pub struct PgSemanticIndex {
    pool: Pool<Postgres>,
    embedder: Arc<dyn EmbeddingBackend>,
}

impl PgSemanticIndex {
    /// Create a new index over the given pool and embedding backend.
    pub fn new(pool: Pool<Postgres>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self { pool, embedder }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let vectors = self.embedder.embed_texts(texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl SemanticIndex for PgSemanticIndex {
    #[instrument(skip(self, chunks), fields(subsystem = "db", component = "semantic_index", op = "upsert", chunk_count = chunks.len()))]
    async fn upsert(&self, file_id: i64, chunks: &[Chunk]) -> Result<usize> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embed(&texts).await?
        };

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM file_chunk_embedding WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let now = Utc::now();
        let model = self.embedder.model_name();
        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(
                "INSERT INTO file_chunk_embedding (file_id, chunk_index, text, vector, model, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(file_id)
            .bind(chunk.index as i32)
            .bind(&chunk.text)
            .bind(vector)
            .bind(model)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Index(e.to_string()))?;
        }

        tx.commit().await.map_err(Error::Database)?;
        debug!(file_id, chunk_count = chunks.len(), model, "Indexed file chunks");
        Ok(chunks.len())
    }

    #[instrument(skip(self, text), fields(subsystem = "db", component = "semantic_index", op = "query"))]
    async fn query(&self, owner_id: i64, text: &str, limit: i64) -> Result<Vec<SemanticHit>> {
        if text.trim().is_empty() || limit <= 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Embedding("no embedding returned".to_string()))?;

        // Scope to the owner's active files, take the best chunk per file,
        // then rank files by that chunk's score.
        let rows = sqlx::query(
            r#"
            SELECT file_id, score, snippet FROM (
                SELECT DISTINCT ON (e.file_id)
                       e.file_id AS file_id,
                       (1.0 - (e.vector <=> $1::vector))::real AS score,
                       substring(e.text for $3) AS snippet
                FROM file_chunk_embedding e
                JOIN file f ON f.id = e.file_id
                           AND f.owner_id = $4
                           AND NOT f.pending_deletion
                ORDER BY e.file_id, e.vector <=> $1::vector
            ) best
            ORDER BY score DESC, file_id
            LIMIT $2
            "#,
        )
        .bind(&query_vec)
        .bind(limit)
        .bind(SNIPPET_CHARS)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let hits: Vec<SemanticHit> = rows
            .into_iter()
            .map(|row| SemanticHit {
                file_id: row.get("file_id"),
                score: row.get("score"),
                snippet: row.get("snippet"),
            })
            .collect();
        debug!(result_count = hits.len(), "Semantic query complete");
        Ok(hits)
    }

    async fn remove(&self, file_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM file_chunk_embedding WHERE file_id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
