//! Authentication error types.

use crate::jwt::{JwtError, TokenType};

/// Record store failure.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Conditional update lost against a concurrent writer, or the row is gone
    #[error("authentication {id} was modified or removed concurrently")]
    Conflict { id: i64 },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("timestamp {0} does not fit the record store")]
    TimestampOutOfRange(u64),
}

/// Fast-access token store failure.
#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("token store is full ({capacity} entries)")]
    CapacityExceeded { capacity: usize },
    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

/// A fast-store write failed after the record store accepted the session.
/// `rollback` is set when undoing the record store write failed as well,
/// in which case the stores disagree until reconciliation runs.
#[derive(Debug)]
pub struct CompensationError {
    pub authentication_id: i64,
    pub cause: TokenStoreError,
    pub rollback: Option<PersistenceError>,
}

impl CompensationError {
    pub fn rolled_back(&self) -> bool {
        self.rollback.is_none()
    }
}

impl std::fmt::Display for CompensationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.rollback {
            None => write!(
                f,
                "authentication {} rolled back after token store failure: {}",
                self.authentication_id, self.cause
            ),
            Some(rollback) => write!(
                f,
                "authentication {} could not be rolled back after token store failure: {} (rollback: {}); stores require reconciliation",
                self.authentication_id, self.cause, rollback
            ),
        }
    }
}

impl std::error::Error for CompensationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Errors surfaced by the authentication service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("illegal argument: {0}")]
    IllegalArgument(&'static str),
    #[error("bad credentials")]
    BadCredentials,
    #[error("account is disabled")]
    AccountDisabled,
    #[error("invalid token: {0}")]
    InvalidJwt(String),
    #[error("unexpected token type: expected {expected}, got {actual}")]
    UnexpectedJwtType {
        expected: TokenType,
        actual: TokenType,
    },
    #[error("authentication not found")]
    AuthenticationNotFound,
    #[error("token generation failed: {0}")]
    TokenGeneration(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
    #[error(transparent)]
    CompensatingTransaction(#[from] CompensationError),
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Invalid(reason) => AuthError::InvalidJwt(reason),
            JwtError::UnexpectedType { expected, actual } => {
                AuthError::UnexpectedJwtType { expected, actual }
            }
            JwtError::Generation(reason) => AuthError::TokenGeneration(reason),
        }
    }
}
