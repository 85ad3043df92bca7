//! Team roll-up statistics.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Extension,
};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::Role;
use crate::{hierarchy, AppState};

/// Query parameters for team statistics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatsQuery {
    #[serde(default)]
    pub manager_id: Option<String>,
}

/// Activity counts for a manager's subtree.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStats {
    pub total: i64,
    pub breakdown: HashMap<String, i64>,
}

/// GET /api/analytics/team-stats - Activity counts for a manager and
/// every transitive subordinate, grouped by role.
pub async fn team_stats(
    State(state): State<AppState>,
    Extension(CurrentUser(_requester)): Extension<CurrentUser>,
    Query(query): Query<TeamStatsQuery>,
) -> ApiResult<TeamStats> {
    let manager_id = query
        .manager_id
        .ok_or_else(|| AppError::Validation("Manager ID is required".to_string()))?;

    let manager = state
        .repo
        .get_user(&manager_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Manager {} not found", manager_id)))?;

    let mut team_ids = hierarchy::all_subordinate_ids(&state.repo, &manager.id).await?;
    team_ids.insert(0, manager.id.clone());

    // Role per team member, for the breakdown.
    let mut roles: HashMap<String, Role> = HashMap::new();
    roles.insert(manager.id.clone(), manager.role);
    for id in &team_ids[1..] {
        if let Some(user) = state.repo.get_user(id).await? {
            roles.insert(user.id.clone(), user.role);
        }
    }

    let activities = state.repo.list_activities_for_creators(&team_ids).await?;

    let mut breakdown: HashMap<String, i64> = HashMap::new();
    for role in [
        Role::RBM,
        Role::AreaManager,
        Role::TerritoryManager,
        Role::MDO,
    ] {
        breakdown.insert(role.as_str().to_string(), 0);
    }

    let mut total = 0;
    for activity in &activities {
        if let Some(role) = roles.get(&activity.creator_id) {
            *breakdown.entry(role.as_str().to_string()).or_insert(0) += 1;
            total += 1;
        }
    }

    success(TeamStats { total, breakdown })
}
