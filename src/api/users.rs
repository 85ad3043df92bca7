//! User API endpoints: directory, bootstrap, self-service, cascade delete.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{created, success, ApiResult};
use crate::auth::{constant_time_compare, hash_password, CurrentUser};
use crate::errors::AppError;
use crate::models::{
    BootstrapRequest, CreateUserRequest, Role, UpdateSelfRequest, User, UserView,
};
use crate::{hierarchy, policy, AppState};

/// Response for user creation: the issued employee ID.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub emp_id: String,
}

/// POST /api/users - Create a direct subordinate.
pub async fn create_user(
    State(state): State<AppState>,
    Extension(CurrentUser(creator)): Extension<CurrentUser>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<CreatedUser> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    if !policy::can_create_role(creator.role, request.role) {
        return Err(AppError::Forbidden(format!(
            "You are not authorized to create a {}",
            request.role.as_str()
        )));
    }

    let number = state.repo.next_emp_number(request.role).await?;
    let emp_id = request.role.format_emp_id(number);
    let password_hash = hash_password(&request.password)?;

    let user = state
        .repo
        .create_user(
            &emp_id,
            request.name.trim(),
            request.role,
            request.mobile.as_deref(),
            &password_hash,
            Some(&creator.id),
        )
        .await?;

    created(CreatedUser {
        emp_id: user.emp_id,
    })
}

/// POST /api/users/bootstrap - One-time creation of the first RBM.
pub async fn bootstrap(
    State(state): State<AppState>,
    Json(request): Json<BootstrapRequest>,
) -> ApiResult<CreatedUser> {
    let Some(expected) = state.config.bootstrap_secret.clone() else {
        return Err(AppError::Unauthorized(
            "Bootstrap is not enabled".to_string(),
        ));
    };
    if !constant_time_compare(&request.secret, &expected) {
        return Err(AppError::Unauthorized("Invalid bootstrap secret".to_string()));
    }

    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    if state.repo.rbm_exists().await? {
        return Err(AppError::Conflict("RBM already exists".to_string()));
    }

    let number = state.repo.next_emp_number(Role::RBM).await?;
    let emp_id = Role::RBM.format_emp_id(number);
    let password_hash = hash_password(&request.password)?;

    let user = state
        .repo
        .create_user(
            &emp_id,
            request.name.trim(),
            Role::RBM,
            request.mobile.as_deref(),
            &password_hash,
            None,
        )
        .await?;

    created(CreatedUser {
        emp_id: user.emp_id,
    })
}

/// Brief manager info joined onto the self view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerInfo {
    pub name: String,
    pub role: Role,
}

/// Self view with the manager's name and role.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<ManagerInfo>,
}

/// GET /api/users/me - The authenticated user.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<MeResponse> {
    let manager = match &user.manager_id {
        Some(manager_id) => state.repo.get_user(manager_id).await?.map(|m| ManagerInfo {
            name: m.name,
            role: m.role,
        }),
        None => None,
    };

    let view = user_view(&state, &user).await;
    success(MeResponse {
        user: view,
        manager,
    })
}

/// PUT /api/users/me - Partial self-update; a present password is
/// re-hashed before storage.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(request): Json<UpdateSelfRequest>,
) -> ApiResult<UserView> {
    let password_hash = match &request.password {
        Some(password) if !password.is_empty() => Some(hash_password(password)?),
        _ => None,
    };

    state
        .repo
        .update_user_profile(
            &user.id,
            request.name.as_deref(),
            request.mobile.as_deref(),
            password_hash.as_deref(),
            request.profile_pic_key.as_deref(),
        )
        .await?;

    let updated = state
        .repo
        .get_user(&user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;

    let view = user_view(&state, &updated).await;
    success(view)
}

/// Query parameters for listing a team.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TeamQuery {
    #[serde(default)]
    pub manager_id: Option<String>,
}

/// GET /api/users/team - Direct reports of a manager (default: self).
pub async fn list_team(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<TeamQuery>,
) -> ApiResult<Vec<UserView>> {
    let manager_id = query.manager_id.unwrap_or_else(|| user.id.clone());
    let reports = state.repo.list_direct_reports(&manager_id).await?;

    let mut views = Vec::with_capacity(reports.len());
    for report in &reports {
        views.push(user_view(&state, report).await);
    }
    success(views)
}

/// GET /api/users/{id} - A single user, visible to self, RBM, or the
/// user's direct manager.
pub async fn get_user(
    State(state): State<AppState>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<UserView> {
    let target = state
        .repo
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

    if !policy::can_view_user_scoped(&requester, &target) {
        return Err(AppError::Forbidden(
            "Not authorized to view this user".to_string(),
        ));
    }

    let view = user_view(&state, &target).await;
    success(view)
}

/// DELETE /api/users/{id} - Cascade-delete a user and their subtree.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    if !policy::can_manage_content(requester.role) {
        return Err(AppError::Forbidden(
            "Only RBM can delete users".to_string(),
        ));
    }

    state
        .repo
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

    hierarchy::delete_user_recursively(&state.repo, state.store.as_ref(), &id).await?;
    success(())
}

/// Project a user for the wire, resolving the profile picture key.
async fn user_view(state: &AppState, user: &User) -> UserView {
    let profile_pic_url = match &user.profile_pic_key {
        Some(key) => match state.store.presign_get(key).await {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!("Failed to sign profile picture URL for {}: {}", user.id, err);
                None
            }
        },
        None => None,
    };
    UserView::from_user(user, profile_pic_url)
}
