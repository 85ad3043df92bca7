//! Activity model: a logged farmer-outreach event.

use serde::{Deserialize, Serialize};

/// General = brief contact, Special = resourced event with expense.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivityType {
    General,
    Special,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::General => "General",
            ActivityType::Special => "Special",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "General" => Some(ActivityType::General),
            "Special" => Some(ActivityType::Special),
            _ => None,
        }
    }
}

/// How a General activity reached the farmer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContactType {
    Calling,
    Direct,
}

impl ContactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Calling => "Calling",
            ContactType::Direct => "Direct",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Calling" => Some(ContactType::Calling),
            "Direct" => Some(ContactType::Direct),
            _ => None,
        }
    }
}

/// An activity record as stored. Photos are kept as storage keys only;
/// signed URLs are derived per read and never persisted.
#[derive(Debug, Clone)]
pub struct Activity {
    pub id: String,
    pub creator_id: String,
    pub emp_id: String,
    pub title: Option<String>,
    pub farmer_name: String,
    pub farmer_mobile: String,
    pub village: String,
    pub taluka: String,
    pub district: String,
    pub crop_or_hybrid: String,
    pub farmers_involved: i64,
    pub tentative_expense: Option<f64>,
    pub remarks: Option<String>,
    pub activity_type: ActivityType,
    pub contact_type: Option<ContactType>,
    pub photo_keys: Vec<String>,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A photo reference on the wire: the stored key plus a read URL signed
/// for this response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRef {
    pub key: String,
    pub url: String,
}

/// Activity as returned to clients. `tentative_expense` is omitted for
/// requesters who are neither RBM nor the creator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub id: String,
    pub creator_id: String,
    pub creator_name: String,
    pub emp_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub farmer_name: String,
    pub farmer_mobile: String,
    pub village: String,
    pub taluka: String,
    pub district: String,
    pub crop_or_hybrid: String,
    pub farmers_involved: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tentative_expense: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub activity_type: ActivityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_type: Option<ContactType>,
    pub photos: Vec<PhotoRef>,
    pub is_published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub created_at: String,
}

/// Request body for logging a new activity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub farmer_name: String,
    pub farmer_mobile: String,
    pub village: String,
    pub taluka: String,
    pub district: String,
    pub crop_or_hybrid: String,
    pub farmers_involved: i64,
    #[serde(default)]
    pub tentative_expense: Option<f64>,
    #[serde(default)]
    pub remarks: Option<String>,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub contact_type: Option<ContactType>,
    /// Storage keys of previously uploaded photos.
    #[serde(default)]
    pub photos: Vec<String>,
}

/// RBM-only correction of an activity. A present `photos` list replaces
/// the stored set wholesale.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub farmer_name: Option<String>,
    #[serde(default)]
    pub farmer_mobile: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub taluka: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub crop_or_hybrid: Option<String>,
    #[serde(default)]
    pub farmers_involved: Option<i64>,
    #[serde(default)]
    pub tentative_expense: Option<f64>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub photos: Option<Vec<String>>,
}

/// Query parameters for listing activities.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListActivitiesQuery {
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}
