use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use stash_core::SemanticMatch;

use crate::error::ApiError;
use crate::extract::OwnerId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SemanticSearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

/// `GET /api/v1/search/semantic?q=&limit=`
pub async fn semantic_search(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(query): Query<SemanticSearchQuery>,
) -> Result<Json<Vec<SemanticMatch>>, ApiError> {
    let matches = state
        .files
        .semantic_search(owner_id, &query.q, query.limit)
        .await?;
    Ok(Json(matches))
}
