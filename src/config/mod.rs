//! Configuration module for the field-sales backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Secret used to sign session tokens
    pub auth_secret: String,
    /// Session token lifetime in seconds
    pub token_ttl_secs: u64,
    /// One-time secret allowing the first-RBM bootstrap (disabled if unset)
    pub bootstrap_secret: Option<String>,
    /// S3 bucket for uploaded media; when unset, the local-filesystem
    /// store under `storage_dir` is used instead
    pub s3_bucket: Option<String>,
    /// Directory for the local-filesystem object store
    pub storage_dir: PathBuf,
    /// Externally reachable base URL, used for local-store upload/read URLs
    pub public_base_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("FF_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let bind_addr = env::var("FF_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid FF_BIND_ADDR format");

        let log_level = env::var("FF_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let auth_secret =
            env::var("FF_AUTH_SECRET").unwrap_or_else(|_| "dev-only-insecure-secret".to_string());

        let token_ttl_secs = env::var("FF_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(12 * 60 * 60);

        let bootstrap_secret = env::var("FF_BOOTSTRAP_SECRET").ok();

        let s3_bucket = env::var("FF_S3_BUCKET").ok();

        let storage_dir = env::var("FF_STORAGE_DIR")
            .unwrap_or_else(|_| "./data/storage".to_string())
            .into();

        let public_base_url =
            env::var("FF_PUBLIC_BASE_URL").unwrap_or_else(|_| format!("http://{}", bind_addr));

        Self {
            db_path,
            bind_addr,
            log_level,
            auth_secret,
            token_ttl_secs,
            bootstrap_secret,
            s3_bucket,
            storage_dir,
            public_base_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("FF_DB_PATH");
        env::remove_var("FF_BIND_ADDR");
        env::remove_var("FF_LOG_LEVEL");
        env::remove_var("FF_AUTH_SECRET");
        env::remove_var("FF_TOKEN_TTL_SECS");
        env::remove_var("FF_BOOTSTRAP_SECRET");
        env::remove_var("FF_S3_BUCKET");
        env::remove_var("FF_STORAGE_DIR");
        env::remove_var("FF_PUBLIC_BASE_URL");

        let config = Config::from_env();

        assert_eq!(config.db_path, PathBuf::from("./data/app.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.token_ttl_secs, 12 * 60 * 60);
        assert!(config.bootstrap_secret.is_none());
        assert!(config.s3_bucket.is_none());
        assert_eq!(config.storage_dir, PathBuf::from("./data/storage"));
        assert_eq!(config.public_base_url, "http://127.0.0.1:8080");
    }
}
