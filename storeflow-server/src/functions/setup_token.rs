//! Password-setup link tokens
//!
//! HS256 token bound to the manager email and store, valid for 24 hours.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use shared::error::{AppError, AppResult, ErrorCode};

pub const SETUP_TOKEN_TTL_HOURS: i64 = 24;

const PURPOSE: &str = "password_setup";

#[derive(Debug, Serialize, Deserialize)]
struct SetupClaims {
    sub: String,
    store_id: String,
    purpose: String,
    exp: usize,
    iat: usize,
}

pub fn issue(secret: &str, email: &str, store_id: &str) -> AppResult<String> {
    let now = chrono::Utc::now();
    let claims = SetupClaims {
        sub: email.to_string(),
        store_id: store_id.to_string(),
        purpose: PURPOSE.to_string(),
        exp: (now + chrono::Duration::hours(SETUP_TOKEN_TTL_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("Failed to sign setup token: {e}")))
}

/// Check that `token` was issued for this email and store
pub fn verify(secret: &str, token: &str, email: &str, store_id: &str) -> AppResult<()> {
    let data = jsonwebtoken::decode::<SetupClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::new(ErrorCode::TokenExpired),
        _ => AppError::token_invalid(e.to_string()),
    })?;

    let claims = data.claims;
    if claims.purpose != PURPOSE || claims.sub != email || claims.store_id != store_id {
        return Err(AppError::token_invalid("Setup link does not match this account"));
    }
    Ok(())
}
