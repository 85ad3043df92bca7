//! FieldForce Backend
//!
//! A production-grade REST backend for hierarchical field-sales activity
//! reporting, with SQLite persistence and pluggable object storage.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod hierarchy;
mod models;
mod policy;
mod storage;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use storage::ObjectStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FieldForce Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.bootstrap_secret.is_none() {
        tracing::info!("No bootstrap secret configured (FF_BOOTSTRAP_SECRET); bootstrap is disabled");
    }
    match &config.s3_bucket {
        Some(bucket) => tracing::info!("Object storage: S3 bucket {}", bucket),
        None => tracing::info!("Object storage: local directory {:?}", config.storage_dir),
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize object storage
    let store = storage::from_config(&config).await;

    // Create application state
    let state = AppState {
        repo,
        store,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Routes behind the auth middleware
    let protected_routes = Router::new()
        // Users
        .route("/users", post(api::create_user))
        .route("/users/me", get(api::get_me).put(api::update_me))
        .route("/users/team", get(api::list_team))
        .route("/users/{id}", get(api::get_user).delete(api::delete_user))
        // Activities
        .route(
            "/activities",
            get(api::list_activities).post(api::create_activity),
        )
        .route(
            "/activities/{id}",
            put(api::update_activity).delete(api::delete_activity),
        )
        // Daily plans
        .route("/daily-plans", get(api::list_plans).post(api::create_plan))
        .route("/daily-plans/{id}", delete(api::delete_plan))
        // Portfolios
        .route(
            "/portfolios",
            get(api::list_portfolios).post(api::create_portfolio),
        )
        .route(
            "/portfolios/{id}",
            put(api::update_portfolio).delete(api::delete_portfolio),
        )
        // Media
        .route("/uploads/presign", post(api::presign_upload))
        .route("/uploads/direct/{*key}", put(api::direct_upload))
        .route("/images/{*key}", get(api::get_image))
        // Roll-ups and repair
        .route("/analytics/team-stats", get(api::team_stats))
        .route("/admin/cleanup-orphans", post(api::cleanup_orphans))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    // Routes reachable without a session
    let public_routes = Router::new()
        .route("/auth/login", post(api::login))
        .route("/users/bootstrap", post(api::bootstrap));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", protected_routes.merge(public_routes))
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
