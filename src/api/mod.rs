//! REST API module.
//!
//! Contains all API routes and handlers following the client contract.

mod activities;
mod admin;
mod analytics;
mod auth;
mod plans;
mod portfolios;
mod uploads;
mod users;

pub use activities::*;
pub use admin::*;
pub use analytics::*;
pub use auth::*;
pub use plans::*;
pub use portfolios::*;
pub use uploads::*;
pub use users::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::PhotoRef;
use crate::storage::ObjectStore;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, status: StatusCode) -> Self {
        Self {
            success: true,
            data,
            status,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppError>;

/// Create a 200 API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data, StatusCode::OK))
}

/// Create a 201 API response.
pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data, StatusCode::CREATED))
}

/// Resolve stored photo keys into wire references with signed read URLs.
/// A signing failure degrades to the bare key rather than failing the
/// whole read.
pub async fn resolve_photos(store: &dyn ObjectStore, keys: &[String]) -> Vec<PhotoRef> {
    let mut photos = Vec::with_capacity(keys.len());
    for key in keys {
        let url = match store.presign_get(key).await {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!("Failed to sign read URL for {}: {}", key, err);
                key.clone()
            }
        };
        photos.push(PhotoRef {
            key: key.clone(),
            url,
        });
    }
    photos
}
