//! Object-storage capability: upload targets, signed read URLs, and
//! best-effort release of stored objects.
//!
//! Two backends: S3 for deployments, a local-filesystem store for
//! development and tests. Signed URLs are derived per request and never
//! persisted; records hold storage keys only.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;

use crate::config::Config;
use crate::errors::AppError;

/// Validity window for signed upload and read URLs.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Storage capability used by the API layer and the hierarchy walker.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under `key`.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    /// Fetch an object's bytes and content type. `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, String)>, AppError>;

    /// Short-lived URL a client can PUT the object bytes to.
    async fn presign_put(&self, key: &str, content_type: &str) -> Result<String, AppError>;

    /// Short-lived URL a client can GET the object from.
    async fn presign_get(&self, key: &str) -> Result<String, AppError>;

    /// Remove an object. Absent objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Best-effort delete for cleanup paths: failures are logged and
    /// swallowed so record deletion stays authoritative.
    async fn release(&self, key: &str) {
        if let Err(err) = self.delete(key).await {
            tracing::warn!("Failed to release storage object {}: {}", key, err);
        }
    }
}

/// Build the store selected by configuration.
pub async fn from_config(config: &Config) -> Arc<dyn ObjectStore> {
    match &config.s3_bucket {
        Some(bucket) => Arc::new(S3Store::from_env(bucket.clone()).await),
        None => Arc::new(FsStore::new(
            config.storage_dir.clone(),
            config.public_base_url.clone(),
        )),
    }
}

/// Storage key for an upload, namespaced by uploader and timestamp.
pub fn upload_key(user_id: &str, filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "uploads/{}/{}-{}",
        user_id,
        chrono::Utc::now().timestamp_millis(),
        safe
    )
}

// ==================== S3 BACKEND ====================

/// S3-backed store. Credentials and region come from the standard AWS
/// environment.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    pub async fn from_env(bucket: String) -> Self {
        let aws_config = aws_config::load_from_env().await;
        Self {
            client: aws_sdk_s3::Client::new(&aws_config),
            bucket,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 put failed for {}: {}", key, e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, String)>, AppError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(AppError::Storage(format!(
                    "S3 get failed for {}: {}",
                    key, service_err
                )));
            }
        };

        let content_type = output
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("S3 read failed for {}: {}", key, e)))?;

        Ok(Some((data.into_bytes().to_vec(), content_type)))
    }

    async fn presign_put(&self, key: &str, content_type: &str) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(SIGNED_URL_TTL)
            .map_err(|e| AppError::Storage(format!("Presigning config error: {}", e)))?;
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("S3 presign failed for {}: {}", key, e)))?;
        Ok(request.uri().to_string())
    }

    async fn presign_get(&self, key: &str) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(SIGNED_URL_TTL)
            .map_err(|e| AppError::Storage(format!("Presigning config error: {}", e)))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("S3 presign failed for {}: {}", key, e)))?;
        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 delete failed for {}: {}", key, e)))?;
        Ok(())
    }
}

// ==================== LOCAL FILESYSTEM BACKEND ====================

/// Filesystem-backed store. "Presigned" upload URLs point at this
/// server's direct-upload route; read URLs at the image proxy.
pub struct FsStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsStore {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        if key.is_empty() || Path::new(key).components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        }) {
            return Err(AppError::Validation(format!("Invalid storage key: {}", key)));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Storage write failed: {}", e)))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Storage write failed: {}", e)))
    }

    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, String)>, AppError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some((bytes, guess_content_type(key).to_string()))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::Storage(format!("Storage read failed: {}", err))),
        }
    }

    async fn presign_put(&self, key: &str, _content_type: &str) -> Result<String, AppError> {
        self.resolve(key)?;
        Ok(format!(
            "{}/api/uploads/direct/{}",
            self.public_base_url, key
        ))
    }

    async fn presign_get(&self, key: &str) -> Result<String, AppError> {
        self.resolve(key)?;
        Ok(format!("{}/api/images/{}", self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::Storage(format!("Storage delete failed: {}", err))),
        }
    }
}

/// Content type from the key's file extension.
pub fn guess_content_type(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
