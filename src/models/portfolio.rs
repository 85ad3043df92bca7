//! Portfolio model: RBM-curated image galleries visible to everyone.

use serde::{Deserialize, Serialize};

use super::PhotoRef;

/// A portfolio as stored. Images are storage keys only.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub id: String,
    pub name: String,
    pub image_keys: Vec<String>,
    pub creator_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Portfolio on the wire, with signed image URLs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioView {
    pub id: String,
    pub name: String,
    pub images: Vec<PhotoRef>,
    pub creator_id: String,
    pub created_at: String,
}

/// Request body for creating a portfolio.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePortfolioRequest {
    pub name: String,
    /// Storage keys of previously uploaded images.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Request body for replacing a portfolio's name and image set. Images
/// omitted from the list are released from storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePortfolioRequest {
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
}
