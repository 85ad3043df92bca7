//! Upload and image endpoints: presigned upload targets, the
//! local-store direct-upload route, and the authenticated image proxy.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::storage::{guess_content_type, upload_key};
use crate::AppState;

/// Request body for a presigned upload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    pub filename: String,
    pub content_type: String,
}

/// A presigned upload target.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub url: String,
    pub key: String,
}

/// POST /api/uploads/presign - Issue a short-lived upload target keyed
/// by uploader and timestamp.
pub async fn presign_upload(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(request): Json<PresignRequest>,
) -> ApiResult<PresignResponse> {
    if request.filename.trim().is_empty() {
        return Err(AppError::Validation("Filename is required".to_string()));
    }
    if request.content_type.trim().is_empty() {
        return Err(AppError::Validation("Content type is required".to_string()));
    }

    let key = upload_key(&user.id, request.filename.trim());
    let url = state.store.presign_put(&key, &request.content_type).await?;

    success(PresignResponse { url, key })
}

/// PUT /api/uploads/direct/{key} - Upload target for the local
/// filesystem backend; S3 deployments upload straight to the bucket.
pub async fn direct_upload(
    State(state): State<AppState>,
    Extension(CurrentUser(_user)): Extension<CurrentUser>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<()> {
    if body.is_empty() {
        return Err(AppError::Validation("Empty upload body".to_string()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_else(|| guess_content_type(&key));

    state.store.put(&key, body.to_vec(), content_type).await?;
    success(())
}

/// GET /api/images/{key} - Stream a stored object to an authenticated
/// client with immutable cache headers.
pub async fn get_image(
    State(state): State<AppState>,
    Extension(CurrentUser(_user)): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (bytes, content_type) = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        bytes,
    )
        .into_response())
}
