//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::models::Role;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            emp_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            mobile TEXT,
            password_hash TEXT NOT NULL,
            manager_id TEXT,
            profile_pic_key TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activities (
            id TEXT PRIMARY KEY,
            creator_id TEXT NOT NULL,
            emp_id TEXT NOT NULL,
            title TEXT,
            farmer_name TEXT NOT NULL,
            farmer_mobile TEXT NOT NULL,
            village TEXT NOT NULL,
            taluka TEXT NOT NULL,
            district TEXT NOT NULL,
            crop_or_hybrid TEXT NOT NULL,
            farmers_involved INTEGER NOT NULL,
            tentative_expense REAL,
            remarks TEXT,
            activity_type TEXT NOT NULL,
            contact_type TEXT,
            photos TEXT NOT NULL DEFAULT '[]',
            is_published INTEGER NOT NULL DEFAULT 1,
            published_at TEXT,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_plans (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            villages TEXT NOT NULL,
            remarks TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS portfolios (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            images TEXT NOT NULL DEFAULT '[]',
            creator_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS emp_counters (
            role TEXT PRIMARY KEY,
            last_number INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries. The (user_id, date) index on
    // daily_plans is non-unique: several plans per user per day are valid.
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_users_manager_id ON users(manager_id);
        CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        CREATE INDEX IF NOT EXISTS idx_activities_creator_id ON activities(creator_id);
        CREATE INDEX IF NOT EXISTS idx_activities_created_at ON activities(created_at);
        CREATE INDEX IF NOT EXISTS idx_daily_plans_user_date ON daily_plans(user_id, date);
        "#,
    )
    .execute(pool)
    .await?;

    // Seed one counter row per role so increments always have a target.
    for role in [
        Role::RBM,
        Role::AreaManager,
        Role::TerritoryManager,
        Role::MDO,
    ] {
        sqlx::query("INSERT OR IGNORE INTO emp_counters (role, last_number) VALUES (?, 0)")
            .bind(role.as_str())
            .execute(pool)
            .await?;
    }

    Ok(())
}
