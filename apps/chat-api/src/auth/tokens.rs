//! HS256 bearer tokens: minted at login, validated on every REST request and
//! once per gateway connection.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Token lifetime in days.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Claims embedded in a bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the user's id.
    pub sub: i64,
    pub username: String,
    /// Issued-at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

/// The identity a validated credential resolves to. Attached to a connection
/// or request once and never re-derived.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// Why a presented credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl AuthError {
    /// Client-facing rejection reason. Missing and invalid tokens must stay
    /// distinguishable.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "No token provided",
            AuthError::InvalidToken => "Invalid or expired token",
        }
    }
}

/// Mint a signed bearer token for a user.
pub fn mint_token(
    secret: &str,
    user_id: i64,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate a bearer token and decode the identity it carries.
///
/// Stateless — no side effects, safe to retry. Signature and expiry are both
/// checked; any failure maps to `InvalidToken`.
pub fn authenticate(token: Option<&str>, secret: &str) -> Result<Identity, AuthError> {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return Err(AuthError::MissingToken),
    };

    let validation = Validation::new(Algorithm::HS256);
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthError::InvalidToken)?;

    Ok(Identity {
        user_id: data.claims.sub,
        username: data.claims.username,
    })
}
