use std::sync::Arc;

use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Extension;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db_helpers::get_user_by_id;
use crate::errors::ApiError;
use crate::models::User;
use crate::AppState;

/// Tokens are valid for 24 hours from issuance.
const TOKEN_EXPIRY_DURATION: time::Duration = time::Duration::hours(24);

#[derive(Debug, Serialize, Deserialize)]
struct AuthClaim {
    id: i64,
    exp: i64,
}

/// The three ways a presented token can be bad. They are distinguishable for
/// callers even though the HTTP layer currently maps all of them to 401.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

impl TokenError {
    fn reason(&self) -> &'static str {
        match self {
            TokenError::Malformed => "Invalid token",
            TokenError::InvalidSignature => "Invalid token",
            TokenError::Expired => "Token expired",
        }
    }
}

/// Signs and verifies the identity tokens handed out at registration/login.
/// Holds the shared secret; nothing here touches the environment.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        TokenCodec {
            secret: secret.into(),
        }
    }

    pub fn issue(&self, id: i64) -> Result<String> {
        let expiry_date = OffsetDateTime::now_utc() + TOKEN_EXPIRY_DURATION;
        let claim = AuthClaim {
            id,
            exp: expiry_date.unix_timestamp(),
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claim,
            &jsonwebtoken::EncodingKey::from_secret(self.secret.as_ref()),
        )
        .context("failed to sign auth token")
    }

    pub fn verify(&self, token: &str) -> Result<i64, TokenError> {
        let mut validation = jsonwebtoken::Validation::default();
        validation.leeway = 0;
        let token_data = jsonwebtoken::decode::<AuthClaim>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        })?;
        let claim = token_data.claims;
        if claim.exp < OffsetDateTime::now_utc().unix_timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claim.id)
    }
}

/// An authenticated principal: the verified id, the loaded user row, and the
/// raw token (echoed back in user envelopes).
pub struct AuthUser {
    pub id: i64,
    pub user: User,
    pub token: String,
}

/// Authenticated-or-anonymous. Extraction never rejects: a missing or
/// unverifiable credential resolves to `None` so optional routes fall back to
/// the anonymous view.
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn get_id(&self) -> Option<i64> {
        self.0.as_ref().map(|a| a.id)
    }
}

/// Pulls the credential out of `Authorization: Token <value>` (scheme match
/// is case-insensitive) or, failing that, the `access_token` query parameter.
fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(header) = parts
        .headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
    {
        if header.len() > 6 && header[..6].eq_ignore_ascii_case("token ") {
            return Some(header[6..].trim().to_owned());
        }
    }
    parts.uri.query().and_then(|query| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("access_token="))
            .filter(|value| !value.is_empty())
            .map(|value| value.to_owned())
    })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Extension(app) = Extension::<Arc<AppState>>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Internal)?;

        let token = match extract_token(parts) {
            Some(token) => token,
            None => return Err(ApiError::Unauthenticated("Need to be authorized")),
        };

        let id = app
            .tokens
            .verify(&token)
            .map_err(|e| ApiError::Unauthenticated(e.reason()))?;

        // One store round-trip per authenticated request; no caching.
        let user = match get_user_by_id(&app.pool, id).await? {
            Some(user) => user,
            None => return Err(ApiError::Unauthenticated("User no longer exists")),
        };

        Ok(AuthUser { id, user, token })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

pub async fn verify_password_argon2(password: String, hash: &str) -> Result<bool> {
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow::anyhow!("Failed to verify password"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .context("Failed to verify password")?
}

pub async fn hash_password_argon2(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        let hash = PasswordHash::generate(Argon2::default(), password, salt.as_salt())
            .map_err(|_| anyhow::anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}
