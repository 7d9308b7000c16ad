use std::collections::BTreeMap;

use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

use crate::JsonResponse;

/// Everything a request can fail with. Authentication failures short-circuit
/// in the extractors; the rest bubble up from handlers with `?`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed, expired, or otherwise unverifiable credential.
    #[error("{0}")]
    Unauthenticated(&'static str),
    /// The principal is known but not allowed to perform the mutation.
    #[error("{1}")]
    Forbidden(&'static str, &'static str),
    #[error("{1}")]
    NotFound(&'static str, &'static str),
    /// Field-level failures, accumulated so the client sees them all at once.
    #[error("validation failed")]
    Validation(Vec<(&'static str, String)>),
    /// A unique constraint fired and the operation is not an idempotent
    /// membership insert. The store's message is kept verbatim.
    #[error("{message}")]
    Conflict {
        key: &'static str,
        message: String,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("internal server error")]
    Internal,
}

#[derive(serde::Serialize)]
pub struct ErrorEnvelope {
    errors: BTreeMap<&'static str, String>,
}

impl ErrorEnvelope {
    fn single(key: &'static str, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(key, message.into());
        ErrorEnvelope { errors }
    }
}

impl ApiError {
    pub fn to_json_response(&self) -> JsonResponse<ErrorEnvelope> {
        let (status_code, envelope) = match self {
            ApiError::Unauthenticated(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorEnvelope::single("user", *message),
            ),
            ApiError::Forbidden(key, message) => {
                (StatusCode::FORBIDDEN, ErrorEnvelope::single(key, *message))
            }
            ApiError::NotFound(key, message) => {
                (StatusCode::NOT_FOUND, ErrorEnvelope::single(key, *message))
            }
            ApiError::Validation(fields) => {
                let mut errors = BTreeMap::new();
                for (field, message) in fields {
                    errors.insert(*field, message.clone());
                }
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorEnvelope { errors })
            }
            ApiError::Conflict { key, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorEnvelope::single(key, message.clone()),
            ),
            ApiError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorEnvelope::single("database", "internal server error"),
                )
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorEnvelope::single("server", "internal server error"),
            ),
        };
        (status_code, Json(envelope))
    }

    /// Remaps a unique-constraint violation to `Conflict`; any other store
    /// error passes through untouched.
    pub fn or_conflict(self, key: &'static str) -> ApiError {
        match self {
            ApiError::Database(e) if is_unique_violation(&e) => ApiError::Conflict {
                key,
                message: e
                    .as_database_error()
                    .map(|e| e.message().to_owned())
                    .unwrap_or_default(),
            },
            other => other,
        }
    }
}

pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(e) => e.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        self.to_json_response().into_response()
    }
}
