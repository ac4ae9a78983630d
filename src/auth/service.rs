//! Session lifecycle: login, token rotation, revocation and request authorization.
//!
//! The record store is written before the fast-access store when a session is
//! created or rotated, and the fast-access store is cleared before the record
//! store when a session is revoked. A failed fast-store write is compensated by
//! deleting the record again, so a client never holds tokens that only one of
//! the stores knows about.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::errors::{AuthError, CompensationError, PersistenceError, TokenStoreError};
use super::ports::{AuthenticationRecordStore, CredentialAuthenticator, FastAccessTokenStore};
use super::types::{AuthenticatedUser, Credentials, JwtAuthentication, Principal};
use crate::jwt::{TokenIssuer, TokenVerifier};

#[derive(Clone)]
pub struct AuthenticationService {
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    credentials: Arc<dyn CredentialAuthenticator>,
    records: Arc<dyn AuthenticationRecordStore>,
    fast: Arc<dyn FastAccessTokenStore>,
}

impl AuthenticationService {
    pub fn new(
        issuer: TokenIssuer,
        verifier: TokenVerifier,
        credentials: Arc<dyn CredentialAuthenticator>,
        records: Arc<dyn AuthenticationRecordStore>,
        fast: Arc<dyn FastAccessTokenStore>,
    ) -> Self {
        Self {
            issuer,
            verifier,
            credentials,
            records,
            fast,
        }
    }

    /// Check credentials and open a new session.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<JwtAuthentication, AuthError> {
        if credentials.username.trim().is_empty() {
            return Err(AuthError::IllegalArgument("username must not be blank"));
        }
        if credentials.password.trim().is_empty() {
            return Err(AuthError::IllegalArgument("password must not be blank"));
        }

        let principal = self.credentials.authenticate(credentials).await?;
        let (access, refresh) = self.issuer.issue_pair(&principal)?;

        let session = self
            .records
            .save(JwtAuthentication::unauthenticated(
                principal.user_id,
                access,
                refresh,
            ))
            .await?;
        let id = session.id.ok_or_else(|| {
            AuthError::Persistence(PersistenceError::Unavailable(
                "record store returned a session without an id".into(),
            ))
        })?;

        if let Err(cause) = self.fast.save(&session).await {
            return Err(self.compensate(id, cause).await);
        }

        info!(
            user_id = principal.user_id,
            authentication_id = id,
            "Issued token pair"
        );
        Ok(session)
    }

    /// Exchange a refresh token for a new token pair on the same session.
    pub async fn refresh_authentication(
        &self,
        refresh_token: &str,
    ) -> Result<JwtAuthentication, AuthError> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::IllegalArgument("refresh token must not be blank"));
        }

        let decoded = self.verifier.verify_refresh_token(refresh_token)?;

        let existing = self
            .records
            .find_by_refresh_token(refresh_token)
            .await?
            .ok_or(AuthError::AuthenticationNotFound)?;
        if existing.refresh_token.subject != decoded.subject {
            warn!(
                authentication_id = ?existing.id,
                "Stored session subject does not match refresh token"
            );
            return Err(AuthError::AuthenticationNotFound);
        }

        let principal = Principal {
            user_id: existing.user_id,
            subject: decoded.subject.clone(),
            username: decoded.username().unwrap_or_default().to_string(),
            role: decoded.role(),
        };
        let (access, refresh) = self.issuer.issue_pair(&principal)?;

        let rotated = self
            .records
            .save(existing.with_tokens(access, refresh))
            .await?;
        let id = rotated.id.ok_or(AuthError::AuthenticationNotFound)?;

        if let Err(cause) = self.fast.save(&rotated).await {
            let err = self.compensate(id, cause).await;
            // The superseded pair may still be indexed
            if let Err(e) = self.fast.delete_by_authentication_id(id).await {
                warn!(authentication_id = id, error = %e, "Failed to drop superseded fast-store entry");
            }
            return Err(err);
        }

        info!(
            user_id = rotated.user_id,
            authentication_id = id,
            version = rotated.version,
            "Rotated token pair"
        );
        Ok(rotated)
    }

    /// Revoke the session the access token belongs to.
    pub async fn revoke_authentication(&self, access_token: &str) -> Result<(), AuthError> {
        if access_token.trim().is_empty() {
            return Err(AuthError::IllegalArgument("access token must not be blank"));
        }

        self.verifier.verify_access_token(access_token)?;

        let session = self.records.find_by_access_token(access_token).await?;
        let id = session.as_ref().and_then(|s| s.id);

        // By id, so a pair rotated in since the lookup goes too
        let fast_removed = match id {
            Some(id) => self.fast.delete_by_authentication_id(id).await?,
            None => self.fast.delete_by_access_token(access_token).await?,
        };

        let record_removed = match id {
            Some(id) => match self.records.delete_by_id(id).await {
                Ok(count) => count,
                Err(e) => {
                    error!(
                        authentication_id = id,
                        error = %e,
                        "Session removed from token store but not from record store; reconciliation required"
                    );
                    return Err(e.into());
                }
            },
            None => 0,
        };

        if fast_removed == 0 && record_removed == 0 {
            return Err(AuthError::AuthenticationNotFound);
        }
        if record_removed == 0 {
            warn!("Revoked a token store entry with no matching record");
        }

        info!(
            user_id = ?session.map(|s| s.user_id),
            "Revoked session"
        );
        Ok(())
    }

    /// Revoke every session of a user. Returns the number of records removed.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AuthError> {
        self.fast.delete_by_user_id(user_id).await?;

        let removed = self.records.delete_by_user_id(user_id).await.map_err(|e| {
            error!(
                user_id,
                error = %e,
                "Sessions removed from token store but not from record store; reconciliation required"
            );
            e
        })?;

        info!(user_id, removed, "Revoked all sessions");
        Ok(removed)
    }

    /// Resolve the caller behind an access token, rejecting revoked sessions.
    pub async fn authorize(&self, access_token: &str) -> Result<AuthenticatedUser, AuthError> {
        if access_token.trim().is_empty() {
            return Err(AuthError::IllegalArgument("access token must not be blank"));
        }

        let decoded = self.verifier.verify_access_token(access_token)?;

        let active = match self.fast.is_active(access_token).await {
            Ok(active) => active,
            Err(e) => {
                warn!(error = %e, "Token store lookup failed, falling back to record store");
                self.records
                    .find_by_access_token(access_token)
                    .await?
                    .is_some()
            }
        };
        // A miss is final, even for sessions the record store still holds
        if !active {
            debug!(subject = %decoded.subject, "Access token is not backed by a live session");
            return Err(AuthError::AuthenticationNotFound);
        }

        let user_id = decoded
            .user_id()
            .ok_or_else(|| AuthError::InvalidJwt("missing uid claim".into()))?;

        Ok(AuthenticatedUser {
            user_id,
            username: decoded.username().unwrap_or_default().to_string(),
            role: decoded.role(),
            expires_at: decoded.expires_at,
            subject: decoded.subject,
            token: access_token.to_string(),
        })
    }

    /// Undo a record store write after the fast-access store refused the session.
    async fn compensate(&self, id: i64, cause: TokenStoreError) -> AuthError {
        warn!(
            authentication_id = id,
            error = %cause,
            "Token store write failed, rolling back session record"
        );

        let rollback = match self.records.delete_by_id(id).await {
            Ok(_) => None,
            Err(e) => {
                error!(
                    authentication_id = id,
                    error = %e,
                    "Rollback of session record failed; reconciliation required"
                );
                Some(e)
            }
        };

        CompensationError {
            authentication_id: id,
            cause,
            rollback,
        }
        .into()
    }
}
