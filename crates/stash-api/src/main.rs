//! stash-api - HTTP API server for the stash file backend.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use stash_api::config::{ApiConfig, EmbeddingKind, StoreKind};
use stash_api::{app, AppState, Backends};
use stash_core::EmbeddingBackend;
use stash_db::{Database, FilesystemBackend, PoolConfig};
use stash_inference::mock::MockEmbeddingBackend;
use stash_inference::OllamaBackend;
use stash_jobs::SchedulerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "stash_api=debug,stash_jobs=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stash_api=debug,stash_jobs=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("stash-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // No ANSI in files unless asked for.
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ApiConfig::from_env();
    let scheduler_config = SchedulerConfig::from_env();

    let embedder: Arc<dyn EmbeddingBackend> = match config.embedding {
        EmbeddingKind::Ollama => {
            let backend = OllamaBackend::from_env()?;
            if !backend.health_check().await? {
                warn!(
                    base_url = %backend.base_url(),
                    "Ollama unreachable; uploads with extractable text fail until it answers"
                );
            }
            Arc::new(backend)
        }
        EmbeddingKind::Mock => {
            warn!("Using mock embeddings; semantic search results are not meaningful");
            Arc::new(MockEmbeddingBackend::new())
        }
    };

    let backends = match config.store {
        StoreKind::Memory => {
            warn!("Using in-memory stores; all files are lost on exit");
            Backends::memory(embedder)
        }
        StoreKind::Postgres => {
            let db = Database::connect_with_config(&config.database_url, PoolConfig::from_env())
                .await?;
            db.migrate().await?;
            info!("Database migrations applied");

            let blobs = FilesystemBackend::from_env();
            blobs
                .validate()
                .await
                .map_err(|e| anyhow::anyhow!("Blob storage unusable: {}", e))?;
            info!(path = %blobs.base_path().display(), "Blob storage ready");

            Backends::postgres(&db, Arc::new(blobs), embedder)
        }
    };

    let service = backends.into_service(scheduler_config, config.semantic_top_k);
    let extraction_health = service.extraction().health_check_all().await;
    for (adapter, healthy) in &extraction_health {
        if !healthy {
            warn!(adapter = %adapter, "Extraction tool unavailable; matching uploads stay unindexed");
        }
    }

    // Startup sweep re-arms deletions left by the previous process.
    let scheduler = service.scheduler().start();

    let state = AppState::new(service, &config);
    let router = app(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, disarming deletion timers");
    if let Err(e) = scheduler.shutdown().await {
        warn!(error = %e, "Scheduler shutdown failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
