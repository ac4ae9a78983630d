//! In-process fast-access token store.
//!
//! Sessions are indexed by authentication id, with secondary indexes from each
//! token string back to its session. Index hits are always checked against the
//! session entry, so a stale index slot never reports a token as active.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::auth::{FastAccessTokenStore, JwtAuthentication, TokenStoreError};

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: i64,
    access_token: Option<String>,
    access_expires_at: u64,
    refresh_token: String,
    refresh_expires_at: u64,
}

impl SessionEntry {
    fn token_count(&self) -> u64 {
        1 + self.access_token.is_some() as u64
    }
}

#[derive(Default)]
struct Inner {
    sessions: DashMap<i64, SessionEntry>,
    access_index: DashMap<String, i64>,
    refresh_index: DashMap<String, i64>,
    capacity: Option<usize>,
}

/// Cloneable handle to a shared in-memory token index.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<Inner>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses to index more than `capacity` sessions.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity: Some(capacity),
                ..Inner::default()
            }),
        }
    }

    /// Number of indexed sessions.
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Whether the refresh token belongs to an indexed session.
    pub fn contains_refresh_token(&self, refresh_token: &str) -> bool {
        self.lookup(&self.inner.refresh_index, refresh_token, |entry| {
            entry.refresh_token == refresh_token
        })
        .is_some()
    }

    fn lookup(
        &self,
        index: &DashMap<String, i64>,
        token: &str,
        matches: impl Fn(&SessionEntry) -> bool,
    ) -> Option<i64> {
        let id = *index.get(token)?;
        let entry = self.inner.sessions.get(&id)?;
        matches(entry.value()).then_some(id)
    }

    fn remove_session(&self, id: i64) -> u64 {
        let Some((_, entry)) = self.inner.sessions.remove(&id) else {
            return 0;
        };
        if let Some(access) = &entry.access_token {
            self.inner.access_index.remove_if(access, |_, owner| *owner == id);
        }
        self.inner
            .refresh_index
            .remove_if(&entry.refresh_token, |_, owner| *owner == id);
        entry.token_count()
    }
}

#[async_trait]
impl FastAccessTokenStore for MemoryTokenStore {
    async fn save(&self, authentication: &JwtAuthentication) -> Result<(), TokenStoreError> {
        let id = authentication.id.ok_or_else(|| {
            TokenStoreError::Unavailable("cannot index a session without an id".into())
        })?;

        if let Some(capacity) = self.inner.capacity {
            if !self.inner.sessions.contains_key(&id) && self.inner.sessions.len() >= capacity {
                return Err(TokenStoreError::CapacityExceeded { capacity });
            }
        }

        // Drop the superseded pair before indexing the new one
        self.remove_session(id);

        let entry = SessionEntry {
            user_id: authentication.user_id,
            access_token: Some(authentication.access_token.encoded.clone()),
            access_expires_at: authentication.access_token.expires_at,
            refresh_token: authentication.refresh_token.encoded.clone(),
            refresh_expires_at: authentication.refresh_token.expires_at,
        };
        self.inner
            .access_index
            .insert(authentication.access_token.encoded.clone(), id);
        self.inner
            .refresh_index
            .insert(authentication.refresh_token.encoded.clone(), id);
        self.inner.sessions.insert(id, entry);
        Ok(())
    }

    async fn is_active(&self, access_token: &str) -> Result<bool, TokenStoreError> {
        Ok(self
            .lookup(&self.inner.access_index, access_token, |entry| {
                entry.access_token.as_deref() == Some(access_token)
            })
            .is_some())
    }

    async fn delete_by_access_token(&self, access_token: &str) -> Result<u64, TokenStoreError> {
        let id = self.lookup(&self.inner.access_index, access_token, |entry| {
            entry.access_token.as_deref() == Some(access_token)
        });
        Ok(id.map(|id| self.remove_session(id)).unwrap_or(0))
    }

    async fn delete_by_refresh_token(&self, refresh_token: &str) -> Result<u64, TokenStoreError> {
        let id = self.lookup(&self.inner.refresh_index, refresh_token, |entry| {
            entry.refresh_token == refresh_token
        });
        Ok(id.map(|id| self.remove_session(id)).unwrap_or(0))
    }

    async fn delete_by_user_id(&self, user_id: i64) -> Result<u64, TokenStoreError> {
        let ids: Vec<i64> = self
            .inner
            .sessions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| *entry.key())
            .collect();
        Ok(ids.into_iter().map(|id| self.remove_session(id)).sum())
    }

    async fn delete_by_authentication_id(&self, id: i64) -> Result<u64, TokenStoreError> {
        Ok(self.remove_session(id))
    }

    async fn authentication_ids(&self) -> Result<Vec<i64>, TokenStoreError> {
        Ok(self.inner.sessions.iter().map(|entry| *entry.key()).collect())
    }

    async fn purge_expired(&self, now: u64) -> Result<u64, TokenStoreError> {
        let mut expired_sessions = Vec::new();
        let mut expired_access = Vec::new();
        for entry in self.inner.sessions.iter() {
            if entry.refresh_expires_at <= now {
                expired_sessions.push(*entry.key());
            } else if entry.access_token.is_some() && entry.access_expires_at <= now {
                expired_access.push(*entry.key());
            }
        }

        let mut purged: u64 = expired_sessions
            .into_iter()
            .map(|id| self.remove_session(id))
            .sum();

        for id in expired_access {
            let removed = self
                .inner
                .sessions
                .get_mut(&id)
                .and_then(|mut entry| entry.access_token.take());
            if let Some(access) = removed {
                self.inner.access_index.remove_if(&access, |_, owner| *owner == id);
                purged += 1;
            }
        }

        Ok(purged)
    }
}
