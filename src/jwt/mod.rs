//! JWT token encoding, issuance and validation.
//!
//! Every session is backed by a pair of tokens:
//! - Access tokens: short-lived (5 minutes by default), presented on API calls
//! - Refresh tokens: long-lived (2 weeks by default), only used to mint a new pair
//!
//! The `typ` claim distinguishes the two and is enforced on every verification.

mod codec;
mod issuer;
mod verifier;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::UserRole;

pub use codec::{JwtCodec, TokenContent};
pub use issuer::{
    ACCESS_TOKEN_DURATION_SECS, MAX_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS, TokenIssuer,
};
pub use verifier::TokenVerifier;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issued token together with the values it encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jwt {
    /// Compact signed form handed to clients
    pub encoded: String,
    pub subject: String,
    pub token_type: TokenType,
    /// Issued at (Unix seconds)
    pub issued_at: u64,
    /// Expiration (Unix seconds)
    pub expires_at: u64,
}

/// Claims recovered from a token whose signature and expiration checked out.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    /// JWT ID (random per token)
    pub id: String,
    pub subject: String,
    pub token_type: TokenType,
    pub issued_at: u64,
    pub expires_at: u64,
    /// Non-registered claims (username, role, ...)
    pub claims: Map<String, Value>,
}

impl DecodedToken {
    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access
    }

    pub fn is_refresh_token(&self) -> bool {
        self.token_type == TokenType::Refresh
    }

    pub fn username(&self) -> Option<&str> {
        self.claims.get("username").and_then(Value::as_str)
    }

    /// Database id of the user the token was issued to.
    pub fn user_id(&self) -> Option<i64> {
        self.claims.get("uid").and_then(Value::as_i64)
    }

    pub fn role(&self) -> UserRole {
        self.claims
            .get("role")
            .and_then(Value::as_str)
            .map(UserRole::from_str)
            .unwrap_or(UserRole::User)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Malformed, badly signed or expired token
    #[error("invalid token: {0}")]
    Invalid(String),
    /// Valid token of the wrong type (e.g., using a refresh token as access token)
    #[error("unexpected token type: expected {expected}, got {actual}")]
    UnexpectedType {
        expected: TokenType,
        actual: TokenType,
    },
    /// Signing failed
    #[error("failed to generate token: {0}")]
    Generation(String),
}
