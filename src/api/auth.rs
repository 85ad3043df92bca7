//! Login endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use super::{success, ApiResult};
use crate::auth::{issue_token, verify_password};
use crate::errors::AppError;
use crate::models::{LoginRequest, UserView};
use crate::AppState;

/// Login response: the bearer token plus the authenticated user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

/// POST /api/auth/login - Exchange credentials for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    if request.emp_id.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "Employee ID and password are required".to_string(),
        ));
    }

    let user = state
        .repo
        .get_user_by_emp_id(&request.emp_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(AppError::Unauthorized("Invalid password".to_string()));
    }

    if !user.active {
        return Err(AppError::Unauthorized(
            "User account is inactive".to_string(),
        ));
    }

    let token = issue_token(&user, &state.config.auth_secret, state.config.token_ttl_secs)?;

    let profile_pic_url = match &user.profile_pic_key {
        Some(key) => state.store.presign_get(key).await.ok(),
        None => None,
    };

    success(LoginResponse {
        token,
        user: UserView::from_user(&user, profile_pic_url),
    })
}
