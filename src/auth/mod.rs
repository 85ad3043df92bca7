//! Authentication module: salted password hashing, bearer-token issuance
//! and validation, and the per-request auth middleware.
//!
//! The middleware re-resolves the user from the database on every request,
//! so role changes, deactivation, and cascade deletions take effect
//! immediately instead of at token expiry.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::{Role, User};
use crate::AppState;

/// Authenticated user attached to the request by the middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Session-token claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Role at issue time; authorization re-reads the stored role
    pub role: Role,
    /// Expiration, seconds since UNIX epoch
    pub exp: u64,
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    use argon2::{
        password_hash::{PasswordHasher as _, SaltString},
        Argon2,
    };
    use rand::RngCore;

    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding failed: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored PHC-string hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{
        password_hash::{PasswordHash, PasswordVerifier},
        Argon2,
    };

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Issue a signed session token for a user.
pub fn issue_token(user: &User, secret: &str, ttl_secs: u64) -> Result<String, AppError> {
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| AppError::Internal(format!("Clock error: {}", e)))?
        .as_secs()
        + ttl_secs;

    let claims = Claims {
        sub: user.id.clone(),
        role: user.role,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
}

/// Decode and validate a session token, returning its claims.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Session expired".to_string())
        }
        _ => AppError::Unauthorized("Invalid session token".to_string()),
    })
}

/// Auth middleware: extract the bearer token, validate it, and load the
/// current user from the database.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let Some(token) = token else {
        return AppError::Unauthorized("Missing bearer token".to_string()).into_response();
    };

    let user = match resolve_user(&state, &token).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(CurrentUser(user));
    next.run(request).await
}

async fn resolve_user(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = validate_token(token, &state.config.auth_secret)?;

    let user = state
        .repo
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    if !user.active {
        return Err(AppError::Unauthorized("Account is inactive".to_string()));
    }

    Ok(user)
}

/// Perform constant-time string comparison.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    // Constant-time comparison
    a_bytes.ct_eq(b_bytes).into()
}
