use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use stash_core::{FavoriteToggle, FileFilter, ListedFile};

use super::ListQuery;
use crate::error::ApiError;
use crate::extract::OwnerId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleFavoriteBody {
    pub file_id: i64,
}

/// `GET /api/v1/favorites?q=`
pub async fn list_favorites(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ListedFile>>, ApiError> {
    let files = state
        .files
        .list(owner_id, FileFilter::Favorites, query.q)
        .await?;
    Ok(Json(files))
}

/// `POST /api/v1/favorites`: add the file to favorites, or remove it when
/// already there.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Json(body): Json<ToggleFavoriteBody>,
) -> Result<Json<FavoriteToggle>, ApiError> {
    let toggle = state.files.toggle_favorite(owner_id, body.file_id).await?;
    Ok(Json(toggle))
}
