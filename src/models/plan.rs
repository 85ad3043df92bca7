//! Daily plan model: a user's stated village visits for one day.

use serde::{Deserialize, Serialize};

/// A daily plan as stored. Several plans for the same user and day may
/// coexist; the `(user_id, date)` index is deliberately non-unique.
#[derive(Debug, Clone)]
pub struct DailyPlan {
    pub id: String,
    pub user_id: String,
    /// Day-granularity date, `YYYY-MM-DD`.
    pub date: String,
    pub villages: Vec<String>,
    pub remarks: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Daily plan on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlanView {
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub villages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub created_at: String,
}

impl From<DailyPlan> for DailyPlanView {
    fn from(plan: DailyPlan) -> Self {
        Self {
            id: plan.id,
            user_id: plan.user_id,
            date: plan.date,
            villages: plan.villages,
            remarks: plan.remarks,
            created_at: plan.created_at,
        }
    }
}

/// Request body for filing a plan. The date is always the current day.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    pub villages: Vec<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Query parameters for listing plans.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListPlansQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}
