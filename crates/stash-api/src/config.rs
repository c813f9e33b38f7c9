//! Server configuration read from the environment.

use axum::http::HeaderValue;

use stash_core::defaults;

/// Default CORS origins when `CORS_ALLOWED_ORIGINS` is unset or empty.
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Where file metadata and blobs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// PostgreSQL metadata + filesystem blobs.
    Postgres,
    /// Process-local stores; everything is lost on exit.
    Memory,
}

/// Which embedding backend feeds the semantic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    Ollama,
    /// Deterministic hashing embedder, no model required.
    Mock,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub store: StoreKind,
    pub embedding: EmbeddingKind,
    /// Largest accepted request body (uploads included).
    pub max_upload_bytes: usize,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u64,
    pub rate_limit_period_secs: u64,
    pub cors_allowed_origins: String,
    /// Results returned by semantic search when the caller gives no limit.
    pub semantic_top_k: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            database_url: "postgres://localhost/stash".to_string(),
            store: StoreKind::Postgres,
            embedding: EmbeddingKind::Ollama,
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            rate_limit_enabled: true,
            rate_limit_requests: defaults::RATE_LIMIT_REQUESTS,
            rate_limit_period_secs: defaults::RATE_LIMIT_PERIOD_SECS,
            cors_allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
            semantic_top_k: defaults::SEMANTIC_TOP_K,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `HOST` | `0.0.0.0` | Bind address |
    /// | `PORT` | `3000` | Bind port |
    /// | `DATABASE_URL` | `postgres://localhost/stash` | PostgreSQL URL |
    /// | `STORE` | `postgres` | `postgres` or `memory` |
    /// | `EMBEDDING_BACKEND` | `ollama` | `ollama` or `mock` |
    /// | `MAX_UPLOAD_BYTES` | `52428800` | Request body limit |
    /// | `RATE_LIMIT_ENABLED` | `true` | Global rate limiting |
    /// | `RATE_LIMIT_REQUESTS` | `100` | Requests per period |
    /// | `RATE_LIMIT_PERIOD_SECS` | `60` | Rate limit period |
    /// | `CORS_ALLOWED_ORIGINS` | `http://localhost:3000` | Comma-separated origins |
    /// | `SEMANTIC_TOP_K` | `3` | Default semantic search limit |
    pub fn from_env() -> Self {
        let base = Self::default();
        let store = match std::env::var("STORE").as_deref() {
            Ok("memory") => StoreKind::Memory,
            _ => StoreKind::Postgres,
        };
        let embedding = match std::env::var("EMBEDDING_BACKEND").as_deref() {
            Ok("mock") => EmbeddingKind::Mock,
            _ => EmbeddingKind::Ollama,
        };

        Self {
            host: std::env::var("HOST").unwrap_or(base.host),
            port: env_parse("PORT").unwrap_or(base.port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(base.database_url),
            store,
            embedding,
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES").unwrap_or(base.max_upload_bytes),
            rate_limit_enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(base.rate_limit_enabled),
            rate_limit_requests: env_parse("RATE_LIMIT_REQUESTS")
                .unwrap_or(base.rate_limit_requests)
                .max(1),
            rate_limit_period_secs: env_parse("RATE_LIMIT_PERIOD_SECS")
                .unwrap_or(base.rate_limit_period_secs)
                .max(1),
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or(base.cors_allowed_origins),
            semantic_top_k: env_parse::<i64>("SEMANTIC_TOP_K")
                .unwrap_or(base.semantic_top_k)
                .clamp(1, defaults::SEMANTIC_MAX_LIMIT),
        }
    }

    /// Disable rate limiting.
    pub fn without_rate_limit(mut self) -> Self {
        self.rate_limit_enabled = false;
        self
    }

    /// Set the request body limit.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Parse a comma-separated origin list, skipping invalid entries.
pub fn parse_allowed_origins(origins: &str) -> Vec<HeaderValue> {
    let parsed: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if parsed.is_empty() {
        return vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGINS)];
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.semantic_top_k, 3);
        assert_eq!(config.store, StoreKind::Postgres);
        assert!(config.rate_limit_enabled);
    }

    #[test]
    fn test_builders() {
        let config = ApiConfig::default()
            .without_rate_limit()
            .with_max_upload_bytes(1024);
        assert!(!config.rate_limit_enabled);
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_parse_allowed_origins() {
        let origins = parse_allowed_origins("https://stash.example.com, http://localhost:3000 ,");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "https://stash.example.com");
        assert_eq!(origins[1], "http://localhost:3000");
    }

    #[test]
    fn test_parse_allowed_origins_empty_uses_default() {
        let origins = parse_allowed_origins("  ");
        assert_eq!(origins, vec![HeaderValue::from_static(DEFAULT_ALLOWED_ORIGINS)]);
    }
}
