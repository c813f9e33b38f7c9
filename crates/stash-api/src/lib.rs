//! # stash-api
//!
//! HTTP surface of the stash file backend: upload, listing, favorites,
//! semantic search and soft delete with a restore window.
//!
//! The binary in `main.rs` wires the backends from the environment and calls
//! [`app`]; tests build the same router over in-memory stores.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod services;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use config::ApiConfig;
pub use error::ApiError;
pub use extract::{OwnerId, OWNER_HEADER};
pub use services::FileService;
pub use state::{AppState, Backends};

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the router with its middleware stack.
pub fn app(state: AppState, config: &ApiConfig) -> Router {
    use handlers::{favorites, files, health, search};

    let owner_header = header::HeaderName::from_static(OWNER_HEADER);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/files", get(files::list_files).post(files::upload_file))
        .route(
            "/api/v1/files/:id",
            get(files::get_file).delete(files::delete_file),
        )
        .route("/api/v1/files/:id/content", get(files::download_file))
        .route("/api/v1/files/:id/restore", patch(files::restore_file))
        .route("/api/v1/deleted", get(files::list_deleted))
        .route(
            "/api/v1/favorites",
            get(favorites::list_favorites).post(favorites::toggle_favorite),
        )
        .route("/api/v1/search/semantic", get(search::semantic_search))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config::parse_allowed_origins(
                    &config.cors_allowed_origins,
                )))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, owner_header])
                .max_age(std::time::Duration::from_secs(3600)),
        )
        // Multipart reads past axum's 2 MB default, so both limits follow config.
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .with_state(state)
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}
