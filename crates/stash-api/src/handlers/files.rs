use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use stash_core::{DocumentFormat, FileFilter, FileRecord, ListedFile, ScheduledDeletion};

use super::ListQuery;
use crate::error::ApiError;
use crate::extract::OwnerId;
use crate::state::AppState;

/// Multipart field carrying the upload.
const UPLOAD_FIELD: &str = "file";

/// `GET /api/v1/files?q=`
pub async fn list_files(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ListedFile>>, ApiError> {
    let files = state.files.list(owner_id, FileFilter::Active, query.q).await?;
    Ok(Json(files))
}

/// `GET /api/v1/deleted?q=`: files pending deletion, still restorable.
pub async fn list_deleted(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ListedFile>>, ApiError> {
    let files = state.files.list(owner_id, FileFilter::Deleted, query.q).await?;
    Ok(Json(files))
}

/// `POST /api/v1/files` (multipart, field `file`).
pub async fn upload_file(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileRecord>), ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read upload", e))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let filename = field
                .file_name()
                .map(|s| s.to_string())
                .ok_or_else(|| ApiError::BadRequest("Upload has no filename".to_string()))?;
            let data = field
                .bytes()
                .await
                .map_err(|e| multipart_error("Failed to read file data", e))?
                .to_vec();
            upload = Some((filename, data));
            break;
        }
    }

    let (filename, data) = upload.ok_or_else(|| {
        ApiError::BadRequest("No file uploaded. Use field name 'file'.".to_string())
    })?;

    let file = state.files.upload(owner_id, &filename, &data).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

fn multipart_error(context: &str, e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!("{}: {}", context, e.body_text()))
    } else {
        ApiError::BadRequest(format!("{}: {}", context, e.body_text()))
    }
}

/// `GET /api/v1/files/:id`
pub async fn get_file(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<i64>,
) -> Result<Json<FileRecord>, ApiError> {
    Ok(Json(state.files.get(owner_id, id).await?))
}

/// `GET /api/v1/files/:id/content`
pub async fn download_file(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let (file, data) = state.files.download(owner_id, id).await?;

    let content_type = DocumentFormat::from_extension(&file.format)
        .map(|f| f.mime_type())
        .or_else(|| infer::get(&data).map(|kind| kind.mime_type()))
        .unwrap_or("application/octet-stream");

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file.filename().replace(['"', '\\'], "_")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((StatusCode::OK, headers, data))
}

/// `DELETE /api/v1/files/:id`: soft delete. The purge runs after the
/// configured delay unless the file is restored first.
pub async fn delete_file(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ScheduledDeletion>), ApiError> {
    let scheduled = state.files.delete(owner_id, id).await?;
    Ok((StatusCode::ACCEPTED, Json(scheduled)))
}

/// `PATCH /api/v1/files/:id/restore`
pub async fn restore_file(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<i64>,
) -> Result<Json<FileRecord>, ApiError> {
    Ok(Json(state.files.restore(owner_id, id).await?))
}
