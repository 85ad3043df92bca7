//! Daily plan API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;

use super::{created, success, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{CreatePlanRequest, DailyPlanView, ListPlansQuery};
use crate::{policy, AppState};

/// POST /api/daily-plans - File a plan for today. Several plans on the
/// same day are allowed.
pub async fn create_plan(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(request): Json<CreatePlanRequest>,
) -> ApiResult<DailyPlanView> {
    if request.villages.is_empty() || request.villages.iter().any(|v| v.trim().is_empty()) {
        return Err(AppError::Validation(
            "At least one village is required".to_string(),
        ));
    }

    let today = Utc::now().date_naive().to_string();
    let plan = state
        .repo
        .create_plan(&user.id, &today, &request.villages, request.remarks.as_deref())
        .await?;

    created(DailyPlanView::from(plan))
}

/// GET /api/daily-plans - A user's plans (default: self), most recent
/// date first.
pub async fn list_plans(
    State(state): State<AppState>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Query(query): Query<ListPlansQuery>,
) -> ApiResult<Vec<DailyPlanView>> {
    let user_id = query.user_id.unwrap_or_else(|| requester.id.clone());

    if user_id != requester.id {
        let target = state
            .repo
            .get_user(&user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        if !policy::can_view_user_scoped(&requester, &target) {
            return Err(AppError::Forbidden(
                "Not authorized to view this user's plans".to_string(),
            ));
        }
    }

    let plans = state.repo.list_plans_for_user(&user_id).await?;
    success(plans.into_iter().map(DailyPlanView::from).collect())
}

/// DELETE /api/daily-plans/{id} - Owner-only, regardless of role.
pub async fn delete_plan(
    State(state): State<AppState>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let plan = state
        .repo
        .get_plan(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", id)))?;

    if !policy::can_delete_plan(&requester, &plan) {
        return Err(AppError::Forbidden(
            "Only the owner can delete a plan".to_string(),
        ));
    }

    state.repo.delete_plan(&id).await?;
    success(())
}
