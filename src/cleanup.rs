//! Scheduled cleanup of expired sessions and store reconciliation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::auth::{AuthenticationRecordStore, FastAccessTokenStore};
use crate::clock::Clock;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// What a cleanup run removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired_records: u64,
    pub expired_tokens: u64,
    pub orphaned_sessions: u64,
}

/// Run all cleanup tasks once.
pub async fn run_cleanup(
    records: &dyn AuthenticationRecordStore,
    fast: &dyn FastAccessTokenStore,
    clock: &dyn Clock,
) -> CleanupReport {
    let now = clock.now();
    let mut report = CleanupReport::default();

    // Expired sessions in the record store
    match records.delete_expired(now).await {
        Ok(count) => {
            report.expired_records = count;
            if count > 0 {
                info!("Cleaned up {} expired sessions", count);
            }
        }
        Err(e) => error!("Failed to clean up expired sessions: {}", e),
    }

    // Expired tokens in the fast-access store
    match fast.purge_expired(now).await {
        Ok(count) => {
            report.expired_tokens = count;
            if count > 0 {
                info!("Purged {} expired tokens from token store", count);
            }
        }
        Err(e) => error!("Failed to purge token store: {}", e),
    }

    match reconcile(records, fast).await {
        Ok(count) => {
            report.orphaned_sessions = count;
            if count > 0 {
                warn!("Reconciled {} token store sessions with no record", count);
            }
        }
        Err(e) => error!("Failed to reconcile token store: {}", e),
    }

    report
}

/// Drop fast-access entries whose session no longer exists in the record store.
/// Returns the number of sessions removed.
async fn reconcile(
    records: &dyn AuthenticationRecordStore,
    fast: &dyn FastAccessTokenStore,
) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
    let ids: HashSet<i64> = fast.authentication_ids().await?.into_iter().collect();

    let mut removed = 0;
    for id in ids {
        if records.find_by_id(id).await?.is_none()
            && fast.delete_by_authentication_id(id).await? > 0
        {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(
    records: Arc<dyn AuthenticationRecordStore>,
    fast: Arc<dyn FastAccessTokenStore>,
    clock: Arc<dyn Clock>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(records.as_ref(), fast.as_ref(), clock.as_ref()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtAuthentication;
    use crate::clock::ManualClock;
    use crate::db::{Database, UserRole};
    use crate::jwt::{Jwt, TokenType};
    use crate::store::MemoryTokenStore;

    fn jwt(encoded: &str, token_type: TokenType, expires_at: u64) -> Jwt {
        Jwt {
            encoded: encoded.into(),
            subject: "uuid-1".into(),
            token_type,
            issued_at: 0,
            expires_at,
        }
    }

    async fn setup() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = db
            .users()
            .create("uuid-1", "alice@example.com", "hash", UserRole::User)
            .await
            .unwrap();
        (db, user_id)
    }

    #[tokio::test]
    async fn test_expired_sessions_are_removed() {
        let (db, user_id) = setup().await;
        let records = db.authentications();
        let fast = MemoryTokenStore::new();

        let short = records
            .save(JwtAuthentication::unauthenticated(
                user_id,
                jwt("a1", TokenType::Access, 50),
                jwt("r1", TokenType::Refresh, 100),
            ))
            .await
            .unwrap();
        let long = records
            .save(JwtAuthentication::unauthenticated(
                user_id,
                jwt("a2", TokenType::Access, 50),
                jwt("r2", TokenType::Refresh, 10_000),
            ))
            .await
            .unwrap();
        fast.save(&short).await.unwrap();
        fast.save(&long).await.unwrap();

        let clock = ManualClock::new(100);
        let report = run_cleanup(&records, &fast, &clock).await;

        assert_eq!(report.expired_records, 1);
        // Whole short session plus the long session's access token
        assert_eq!(report.expired_tokens, 2);
        assert_eq!(report.orphaned_sessions, 0);
        assert!(records.find_by_refresh_token("r1").await.unwrap().is_none());
        assert!(fast.contains_refresh_token("r2"));
        assert!(!fast.is_active("a2").await.unwrap());
    }

    #[tokio::test]
    async fn test_reconcile_drops_orphaned_fast_entries() {
        let (db, user_id) = setup().await;
        let records = db.authentications();
        let fast = MemoryTokenStore::new();

        let kept = records
            .save(JwtAuthentication::unauthenticated(
                user_id,
                jwt("a1", TokenType::Access, 10_000),
                jwt("r1", TokenType::Refresh, 20_000),
            ))
            .await
            .unwrap();
        fast.save(&kept).await.unwrap();

        // Indexed in the fast store but never made it into the record store
        let orphan = JwtAuthentication {
            id: Some(999),
            ..JwtAuthentication::unauthenticated(
                user_id,
                jwt("a2", TokenType::Access, 10_000),
                jwt("r2", TokenType::Refresh, 20_000),
            )
        };
        fast.save(&orphan).await.unwrap();

        let report = run_cleanup(&records, &fast, &ManualClock::new(1)).await;

        assert_eq!(report.orphaned_sessions, 1);
        assert!(fast.is_active("a1").await.unwrap());
        assert!(!fast.is_active("a2").await.unwrap());
    }
}
