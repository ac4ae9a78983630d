//! Authentication value types.

use crate::db::UserRole;
use crate::jwt::Jwt;

/// Username/password pair presented at login. Never persisted.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A user whose credentials have been checked. Tokens are issued for principals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Database user ID
    pub user_id: i64,
    /// Token subject (user UUID)
    pub subject: String,
    pub username: String,
    pub role: UserRole,
}

/// A session: one access/refresh token pair belonging to one user.
///
/// `id` is `None` until the record store has persisted the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtAuthentication {
    pub id: Option<i64>,
    pub user_id: i64,
    pub access_token: Jwt,
    pub refresh_token: Jwt,
    /// Optimistic concurrency counter, bumped by the record store on every update
    pub version: i64,
}

impl JwtAuthentication {
    /// Assemble a not-yet-persisted session from a freshly issued pair.
    pub fn unauthenticated(user_id: i64, access_token: Jwt, refresh_token: Jwt) -> Self {
        Self {
            id: None,
            user_id,
            access_token,
            refresh_token,
            version: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }

    /// Same session with a replacement token pair.
    pub fn with_tokens(&self, access_token: Jwt, refresh_token: Jwt) -> Self {
        Self {
            id: self.id,
            user_id: self.user_id,
            access_token,
            refresh_token,
            version: self.version,
        }
    }

    /// Principal the session was issued for, recovered from the stored tokens.
    pub fn subject(&self) -> &str {
        &self.access_token.subject
    }
}

/// Caller identity established from a verified, non-revoked access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub subject: String,
    pub username: String,
    pub role: UserRole,
    /// Access token expiration (Unix seconds)
    pub expires_at: u64,
    /// The raw access token, for follow-up calls such as revocation
    pub token: String,
}
