//! Administrative integrity-repair endpoints.

use axum::{extract::State, Extension};

use super::{success, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::hierarchy::{self, OrphanReport};
use crate::{policy, AppState};

/// POST /api/admin/cleanup-orphans - Delete every user whose manager no
/// longer exists, together with their subtree. RBM only.
pub async fn cleanup_orphans(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<OrphanReport> {
    if !policy::can_manage_content(user.role) {
        return Err(AppError::Forbidden(
            "Only RBM can run orphan cleanup".to_string(),
        ));
    }

    let report = hierarchy::cleanup_orphans(&state.repo, state.store.as_ref()).await?;
    success(report)
}
