//! Activity API endpoints.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use super::{created, resolve_photos, success, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{
    Activity, ActivityType, ActivityView, CreateActivityRequest, ListActivitiesQuery,
    UpdateActivityRequest, User,
};
use crate::{hierarchy, policy, AppState};

/// POST /api/activities - Log a new activity. Activities are published
/// immediately; there is no draft state.
pub async fn create_activity(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(request): Json<CreateActivityRequest>,
) -> ApiResult<ActivityView> {
    validate_activity(&request)?;

    let activity = state
        .repo
        .create_activity(&user.id, &user.emp_id, &request)
        .await?;

    let view = activity_view(&state, &activity, &user, &user.name).await;
    created(view)
}

fn validate_activity(request: &CreateActivityRequest) -> Result<(), AppError> {
    let required = [
        ("farmerName", &request.farmer_name),
        ("farmerMobile", &request.farmer_mobile),
        ("village", &request.village),
        ("taluka", &request.taluka),
        ("district", &request.district),
        ("cropOrHybrid", &request.crop_or_hybrid),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("Missing field: {}", field)));
        }
    }
    if request.farmers_involved < 1 {
        return Err(AppError::Validation(
            "farmersInvolved must be at least 1".to_string(),
        ));
    }
    match request.activity_type {
        ActivityType::Special => {
            if request.tentative_expense.is_none() {
                return Err(AppError::Validation(
                    "tentativeExpense is required for Special activities".to_string(),
                ));
            }
        }
        ActivityType::General => {
            if request.contact_type.is_none() {
                return Err(AppError::Validation(
                    "contactType is required for General activities".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// GET /api/activities - Own activities by default; `scope=team` widens
/// to the whole subtree, `userId` narrows to one (policy-gated) user.
pub async fn list_activities(
    State(state): State<AppState>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Query(query): Query<ListActivitiesQuery>,
) -> ApiResult<Vec<ActivityView>> {
    let creator_ids: Vec<String> = if query.scope.as_deref() == Some("team") {
        let mut ids = hierarchy::all_subordinate_ids(&state.repo, &requester.id).await?;
        ids.insert(0, requester.id.clone());
        ids
    } else if let Some(user_id) = &query.user_id {
        if user_id != &requester.id {
            let target = state
                .repo
                .get_user(user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
            if !policy::can_view_user_scoped(&requester, &target) {
                return Err(AppError::Forbidden(
                    "Not authorized to view this user's activities".to_string(),
                ));
            }
        }
        vec![user_id.clone()]
    } else {
        vec![requester.id.clone()]
    };

    let activities = state
        .repo
        .list_activities_for_creators(&creator_ids)
        .await?;

    // One lookup per distinct creator for display names.
    let mut names: HashMap<String, String> = HashMap::new();
    for activity in &activities {
        if !names.contains_key(&activity.creator_id) {
            let name = state
                .repo
                .get_user(&activity.creator_id)
                .await?
                .map(|u| u.name)
                .unwrap_or_default();
            names.insert(activity.creator_id.clone(), name);
        }
    }

    let mut views = Vec::with_capacity(activities.len());
    for activity in &activities {
        let creator_name = names.get(&activity.creator_id).cloned().unwrap_or_default();
        views.push(activity_view(&state, activity, &requester, &creator_name).await);
    }
    success(views)
}

/// PUT /api/activities/{id} - RBM-only correction. A photo list in the
/// request replaces the stored set wholesale; dropped photos are the
/// client's to clean up.
pub async fn update_activity(
    State(state): State<AppState>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdateActivityRequest>,
) -> ApiResult<ActivityView> {
    if !policy::can_manage_content(requester.role) {
        return Err(AppError::Forbidden(
            "Only RBM can edit activities".to_string(),
        ));
    }

    let activity = state.repo.update_activity(&id, &request).await?;

    let creator_name = state
        .repo
        .get_user(&activity.creator_id)
        .await?
        .map(|u| u.name)
        .unwrap_or_default();
    let view = activity_view(&state, &activity, &requester, &creator_name).await;
    success(view)
}

/// DELETE /api/activities/{id} - RBM-only; attached photos are released
/// best-effort before the record goes.
pub async fn delete_activity(
    State(state): State<AppState>,
    Extension(CurrentUser(requester)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    if !policy::can_manage_content(requester.role) {
        return Err(AppError::Forbidden(
            "Only RBM can delete activities".to_string(),
        ));
    }

    let activity = state
        .repo
        .get_activity(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))?;

    for key in &activity.photo_keys {
        state.store.release(key).await;
    }

    state.repo.delete_activity(&id).await?;
    success(())
}

/// Project an activity for the wire: signed photo URLs, expense stripped
/// for requesters who are neither RBM nor the creator.
async fn activity_view(
    state: &AppState,
    activity: &Activity,
    requester: &User,
    creator_name: &str,
) -> ActivityView {
    let tentative_expense = if policy::can_see_expense(requester, &activity.creator_id) {
        activity.tentative_expense
    } else {
        None
    };

    ActivityView {
        id: activity.id.clone(),
        creator_id: activity.creator_id.clone(),
        creator_name: creator_name.to_string(),
        emp_id: activity.emp_id.clone(),
        title: activity.title.clone(),
        farmer_name: activity.farmer_name.clone(),
        farmer_mobile: activity.farmer_mobile.clone(),
        village: activity.village.clone(),
        taluka: activity.taluka.clone(),
        district: activity.district.clone(),
        crop_or_hybrid: activity.crop_or_hybrid.clone(),
        farmers_involved: activity.farmers_involved,
        tentative_expense,
        remarks: activity.remarks.clone(),
        activity_type: activity.activity_type,
        contact_type: activity.contact_type,
        photos: resolve_photos(state.store.as_ref(), &activity.photo_keys).await,
        is_published: activity.is_published,
        published_at: activity.published_at.clone(),
        created_at: activity.created_at.clone(),
    }
}
