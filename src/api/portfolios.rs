//! Portfolio API endpoints. Portfolios are curated by RBM and readable
//! by every authenticated user.

use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{created, resolve_photos, success, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{CreatePortfolioRequest, Portfolio, PortfolioView, UpdatePortfolioRequest};
use crate::{policy, AppState};

/// GET /api/portfolios - List all portfolios, newest first.
pub async fn list_portfolios(
    State(state): State<AppState>,
    Extension(CurrentUser(_user)): Extension<CurrentUser>,
) -> ApiResult<Vec<PortfolioView>> {
    let portfolios = state.repo.list_portfolios().await?;

    let mut views = Vec::with_capacity(portfolios.len());
    for portfolio in &portfolios {
        views.push(portfolio_view(&state, portfolio).await);
    }
    success(views)
}

/// POST /api/portfolios - RBM only.
pub async fn create_portfolio(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(request): Json<CreatePortfolioRequest>,
) -> ApiResult<PortfolioView> {
    if !policy::can_manage_content(user.role) {
        return Err(AppError::Forbidden(
            "Only RBM can create portfolios".to_string(),
        ));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Portfolio name is required".to_string(),
        ));
    }

    let portfolio = state
        .repo
        .create_portfolio(&user.id, request.name.trim(), &request.images)
        .await?;

    let view = portfolio_view(&state, &portfolio).await;
    created(view)
}

/// PUT /api/portfolios/{id} - RBM only. Images dropped from the set are
/// released from storage best-effort.
pub async fn update_portfolio(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePortfolioRequest>,
) -> ApiResult<PortfolioView> {
    if !policy::can_manage_content(user.role) {
        return Err(AppError::Forbidden(
            "Only RBM can edit portfolios".to_string(),
        ));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Portfolio name is required".to_string(),
        ));
    }

    let existing = state
        .repo
        .get_portfolio(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Portfolio {} not found", id)))?;

    let kept: HashSet<&str> = request.images.iter().map(|k| k.as_str()).collect();
    for key in &existing.image_keys {
        if !kept.contains(key.as_str()) {
            state.store.release(key).await;
        }
    }

    let portfolio = state
        .repo
        .update_portfolio(&id, request.name.trim(), &request.images)
        .await?;

    let view = portfolio_view(&state, &portfolio).await;
    success(view)
}

/// DELETE /api/portfolios/{id} - RBM only; images released best-effort.
pub async fn delete_portfolio(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    if !policy::can_manage_content(user.role) {
        return Err(AppError::Forbidden(
            "Only RBM can delete portfolios".to_string(),
        ));
    }

    let portfolio = state
        .repo
        .get_portfolio(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Portfolio {} not found", id)))?;

    for key in &portfolio.image_keys {
        state.store.release(key).await;
    }

    state.repo.delete_portfolio(&id).await?;
    success(())
}

async fn portfolio_view(state: &AppState, portfolio: &Portfolio) -> PortfolioView {
    PortfolioView {
        id: portfolio.id.clone(),
        name: portfolio.name.clone(),
        images: resolve_photos(state.store.as_ref(), &portfolio.image_keys).await,
        creator_id: portfolio.creator_id.clone(),
        created_at: portfolio.created_at.clone(),
    }
}
