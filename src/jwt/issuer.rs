//! Access/refresh token issuance.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Jwt, JwtCodec, JwtError, TokenContent, TokenType};
use crate::auth::Principal;
use crate::clock::Clock;

/// Access token duration: 5 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 5 * 60;

/// Refresh token duration: 2 weeks
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 14 * 24 * 60 * 60;

/// Longest accepted token lifetime: 10 years
pub const MAX_TOKEN_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Issues signed tokens for authenticated principals.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<JwtCodec>,
    clock: Arc<dyn Clock>,
    access_ttl: u64,
    refresh_ttl: u64,
}

impl TokenIssuer {
    pub fn new(codec: Arc<JwtCodec>, clock: Arc<dyn Clock>) -> Self {
        Self {
            codec,
            clock,
            access_ttl: ACCESS_TOKEN_DURATION_SECS,
            refresh_ttl: REFRESH_TOKEN_DURATION_SECS,
        }
    }

    /// Override the default lifetimes (seconds).
    pub fn with_ttls(mut self, access_ttl: u64, refresh_ttl: u64) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn issue_access_token(&self, principal: &Principal) -> Result<Jwt, JwtError> {
        self.issue(principal, TokenType::Access, self.access_ttl)
    }

    pub fn issue_refresh_token(&self, principal: &Principal) -> Result<Jwt, JwtError> {
        self.issue(principal, TokenType::Refresh, self.refresh_ttl)
    }

    /// Issue an access and a refresh token sharing the same issue time.
    pub fn issue_pair(&self, principal: &Principal) -> Result<(Jwt, Jwt), JwtError> {
        let now = self.clock.now();
        let access = self.issue_at(principal, TokenType::Access, now, self.access_ttl)?;
        let refresh = self.issue_at(principal, TokenType::Refresh, now, self.refresh_ttl)?;
        Ok((access, refresh))
    }

    fn issue(&self, principal: &Principal, token_type: TokenType, ttl: u64) -> Result<Jwt, JwtError> {
        self.issue_at(principal, token_type, self.clock.now(), ttl)
    }

    fn issue_at(
        &self,
        principal: &Principal,
        token_type: TokenType,
        now: u64,
        ttl: u64,
    ) -> Result<Jwt, JwtError> {
        let expires_at = now
            .checked_add(ttl)
            .filter(|t| i64::try_from(*t).is_ok())
            .ok_or_else(|| {
                JwtError::Generation(format!("lifetime of {}s is out of range", ttl))
            })?;

        let mut claims = Map::new();
        claims.insert("username".into(), Value::from(principal.username.as_str()));
        claims.insert("role".into(), Value::from(principal.role.as_str()));
        claims.insert("uid".into(), Value::from(principal.user_id));

        let content = TokenContent {
            subject: principal.subject.clone(),
            token_type,
            issued_at: now,
            expires_at,
            claims,
        };
        let encoded = self.codec.encode(&content)?;

        Ok(Jwt {
            encoded,
            subject: content.subject,
            token_type,
            issued_at: content.issued_at,
            expires_at: content.expires_at,
        })
    }
}
