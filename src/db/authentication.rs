//! Durable session storage (the record store).
//!
//! One row per session holding both tokens. Updates are conditional on the
//! row's `version` so that two concurrent refreshes of the same session cannot
//! both win.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use crate::auth::{AuthenticationRecordStore, JwtAuthentication, PersistenceError};
use crate::jwt::{Jwt, TokenType};

#[derive(Clone)]
pub struct SqliteAuthenticationStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct AuthenticationRow {
    id: i64,
    user_id: i64,
    subject: String,
    access_token: String,
    access_issued_at: i64,
    access_expires_at: i64,
    refresh_token: String,
    refresh_issued_at: i64,
    refresh_expires_at: i64,
    version: i64,
}

impl From<AuthenticationRow> for JwtAuthentication {
    fn from(row: AuthenticationRow) -> Self {
        Self {
            id: Some(row.id),
            user_id: row.user_id,
            access_token: Jwt {
                encoded: row.access_token,
                subject: row.subject.clone(),
                token_type: TokenType::Access,
                issued_at: row.access_issued_at as u64,
                expires_at: row.access_expires_at as u64,
            },
            refresh_token: Jwt {
                encoded: row.refresh_token,
                subject: row.subject,
                token_type: TokenType::Refresh,
                issued_at: row.refresh_issued_at as u64,
                expires_at: row.refresh_expires_at as u64,
            },
            version: row.version,
        }
    }
}

fn timestamp(value: u64) -> Result<i64, PersistenceError> {
    i64::try_from(value).map_err(|_| PersistenceError::TimestampOutOfRange(value))
}

impl SqliteAuthenticationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert(
        &self,
        authentication: JwtAuthentication,
    ) -> Result<JwtAuthentication, PersistenceError> {
        let access = &authentication.access_token;
        let refresh = &authentication.refresh_token;

        let result = sqlx::query(
            "INSERT INTO authentications (user_id, subject, access_token, access_issued_at, access_expires_at, refresh_token, refresh_issued_at, refresh_expires_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(authentication.user_id)
        .bind(&access.subject)
        .bind(&access.encoded)
        .bind(timestamp(access.issued_at)?)
        .bind(timestamp(access.expires_at)?)
        .bind(&refresh.encoded)
        .bind(timestamp(refresh.issued_at)?)
        .bind(timestamp(refresh.expires_at)?)
        .execute(&self.pool)
        .await?;

        Ok(JwtAuthentication {
            id: Some(result.last_insert_rowid()),
            version: 1,
            ..authentication
        })
    }

    async fn update(
        &self,
        id: i64,
        authentication: JwtAuthentication,
    ) -> Result<JwtAuthentication, PersistenceError> {
        let access = &authentication.access_token;
        let refresh = &authentication.refresh_token;

        let result = sqlx::query(
            "UPDATE authentications SET subject = ?, access_token = ?, access_issued_at = ?, access_expires_at = ?, refresh_token = ?, refresh_issued_at = ?, refresh_expires_at = ?, version = version + 1, updated_at = datetime('now') WHERE id = ? AND version = ?",
        )
        .bind(&access.subject)
        .bind(&access.encoded)
        .bind(timestamp(access.issued_at)?)
        .bind(timestamp(access.expires_at)?)
        .bind(&refresh.encoded)
        .bind(timestamp(refresh.issued_at)?)
        .bind(timestamp(refresh.expires_at)?)
        .bind(id)
        .bind(authentication.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::Conflict { id });
        }

        Ok(JwtAuthentication {
            version: authentication.version + 1,
            ..authentication
        })
    }

    async fn find_one(
        &self,
        query: &'static str,
        key: &str,
    ) -> Result<Option<JwtAuthentication>, PersistenceError> {
        let row: Option<AuthenticationRow> = sqlx::query_as(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(JwtAuthentication::from))
    }

    /// List live sessions for a user, newest first.
    pub async fn list_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<JwtAuthentication>, PersistenceError> {
        let rows: Vec<AuthenticationRow> = sqlx::query_as(
            "SELECT id, user_id, subject, access_token, access_issued_at, access_expires_at, refresh_token, refresh_issued_at, refresh_expires_at, version FROM authentications WHERE user_id = ? ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(JwtAuthentication::from).collect())
    }
}

#[async_trait]
impl AuthenticationRecordStore for SqliteAuthenticationStore {
    async fn save(
        &self,
        authentication: JwtAuthentication,
    ) -> Result<JwtAuthentication, PersistenceError> {
        match authentication.id {
            None => self.insert(authentication).await,
            Some(id) => self.update(id, authentication).await,
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<JwtAuthentication>, PersistenceError> {
        let row: Option<AuthenticationRow> = sqlx::query_as(
            "SELECT id, user_id, subject, access_token, access_issued_at, access_expires_at, refresh_token, refresh_issued_at, refresh_expires_at, version FROM authentications WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(JwtAuthentication::from))
    }

    async fn find_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<JwtAuthentication>, PersistenceError> {
        self.find_one(
            "SELECT id, user_id, subject, access_token, access_issued_at, access_expires_at, refresh_token, refresh_issued_at, refresh_expires_at, version FROM authentications WHERE access_token = ?",
            access_token,
        )
        .await
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<JwtAuthentication>, PersistenceError> {
        self.find_one(
            "SELECT id, user_id, subject, access_token, access_issued_at, access_expires_at, refresh_token, refresh_issued_at, refresh_expires_at, version FROM authentications WHERE refresh_token = ?",
            refresh_token,
        )
        .await
    }

    async fn delete_by_id(&self, id: i64) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM authentications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_user_id(&self, user_id: i64) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM authentications WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: u64) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM authentications WHERE refresh_expires_at <= ?")
            .bind(timestamp(now)?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
