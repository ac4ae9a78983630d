//! Collaborator interfaces used by the authentication service.
//!
//! The record store is the system of record for sessions. The fast-access
//! store mirrors the active tokens for cheap revocation checks and may lag
//! behind the record store until compensation or reconciliation catches up.

use async_trait::async_trait;

use super::errors::{AuthError, PersistenceError, TokenStoreError};
use super::types::{Credentials, JwtAuthentication, Principal};

/// Checks a username/password pair and resolves the principal behind it.
#[async_trait]
pub trait CredentialAuthenticator: Send + Sync {
    /// Fails with `AuthError::BadCredentials` or `AuthError::AccountDisabled`.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthError>;
}

/// Durable session storage.
#[async_trait]
pub trait AuthenticationRecordStore: Send + Sync {
    /// Insert a session without an id (assigning id and version 1), or update an
    /// existing one. Updates only apply if the stored version still matches
    /// `authentication.version`; otherwise `PersistenceError::Conflict`.
    async fn save(
        &self,
        authentication: JwtAuthentication,
    ) -> Result<JwtAuthentication, PersistenceError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<JwtAuthentication>, PersistenceError>;

    async fn find_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<JwtAuthentication>, PersistenceError>;

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<JwtAuthentication>, PersistenceError>;

    /// Returns the number of rows removed.
    async fn delete_by_id(&self, id: i64) -> Result<u64, PersistenceError>;

    /// Returns the number of rows removed.
    async fn delete_by_user_id(&self, user_id: i64) -> Result<u64, PersistenceError>;

    /// Remove sessions whose refresh token expired at or before `now`.
    async fn delete_expired(&self, now: u64) -> Result<u64, PersistenceError>;
}

/// Low-latency index of active tokens.
#[async_trait]
pub trait FastAccessTokenStore: Send + Sync {
    /// Index both tokens of a persisted session, replacing whatever was stored
    /// for the same authentication id.
    async fn save(&self, authentication: &JwtAuthentication) -> Result<(), TokenStoreError>;

    /// Whether the access token belongs to a live session.
    async fn is_active(&self, access_token: &str) -> Result<bool, TokenStoreError>;

    /// Each delete removes the whole session the key belongs to and returns the
    /// number of token entries dropped.
    async fn delete_by_access_token(&self, access_token: &str) -> Result<u64, TokenStoreError>;

    async fn delete_by_refresh_token(&self, refresh_token: &str) -> Result<u64, TokenStoreError>;

    async fn delete_by_user_id(&self, user_id: i64) -> Result<u64, TokenStoreError>;

    async fn delete_by_authentication_id(&self, id: i64) -> Result<u64, TokenStoreError>;

    /// Ids of every session currently indexed.
    async fn authentication_ids(&self) -> Result<Vec<i64>, TokenStoreError>;

    /// Drop entries whose token expired at or before `now`.
    async fn purge_expired(&self, now: u64) -> Result<u64, TokenStoreError>;
}
