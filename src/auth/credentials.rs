//! Username/password verification against the users table.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use tracing::{debug, error};

use super::errors::AuthError;
use super::ports::CredentialAuthenticator;
use super::types::{Credentials, Principal};
use crate::db::UserStore;

/// Hash a password with Argon2id. Returns the PHC string.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// Check a password against a PHC hash. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

/// Credential check backed by the user store.
#[derive(Clone)]
pub struct DatabaseCredentialAuthenticator {
    users: UserStore,
}

impl DatabaseCredentialAuthenticator {
    pub fn new(users: UserStore) -> Self {
        Self { users }
    }
}

#[async_trait]
impl CredentialAuthenticator for DatabaseCredentialAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        let user = self
            .users
            .get_by_username(&credentials.username)
            .await
            .map_err(|e| AuthError::Persistence(e.into()))?;

        let Some(user) = user else {
            debug!(username = %credentials.username, "Login attempt for unknown user");
            return Err(AuthError::BadCredentials);
        };

        if !verify_password(&credentials.password, &user.password_hash) {
            debug!(user_id = user.id, "Login attempt with wrong password");
            return Err(AuthError::BadCredentials);
        }

        if !user.active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(Principal {
            user_id: user.id,
            subject: user.uuid,
            username: user.username,
            role: user.role,
        })
    }
}
