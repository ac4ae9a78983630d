//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::auth::{AuthError, PersistenceError};

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
    Unavailable(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::IllegalArgument(msg) => ApiError::bad_request(msg),
            AuthError::BadCredentials => ApiError::unauthorized("Invalid username or password"),
            AuthError::AccountDisabled => ApiError::Forbidden("Account is disabled".into()),
            AuthError::InvalidJwt(_) => ApiError::unauthorized("Invalid or expired token"),
            AuthError::UnexpectedJwtType { expected, .. } => {
                ApiError::unauthorized(format!("Expected {} token", expected))
            }
            AuthError::AuthenticationNotFound => {
                ApiError::unauthorized("Session has been revoked")
            }
            AuthError::TokenGeneration(e) => {
                error!(error = %e, "Token generation failed");
                ApiError::internal("Failed to issue token")
            }
            AuthError::Persistence(PersistenceError::Conflict { id }) => {
                tracing::debug!(authentication_id = id, "Concurrent session update");
                ApiError::Conflict("Session was modified concurrently".into())
            }
            AuthError::Persistence(e) => {
                error!(error = %e, "Record store failure");
                ApiError::internal("Database error")
            }
            AuthError::TokenStore(e) => {
                error!(error = %e, "Token store failure");
                ApiError::Unavailable("Token store unavailable".into())
            }
            AuthError::CompensatingTransaction(e) => {
                error!(error = %e, "Session write was compensated");
                ApiError::internal("Failed to store session")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg)
            | ApiError::Unavailable(msg) => msg,
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
