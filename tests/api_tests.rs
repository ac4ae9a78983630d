mod common;

use axum::http::StatusCode;
use common::{PASSWORD, USERNAME, create_user, test_app, test_app_with};
use serde_json::json;
use uaa::db::UserRole;
use uaa::store::MemoryTokenStore;

#[tokio::test]
async fn test_login_returns_token_pair() {
    let ctx = test_app().await;

    let (status, json) = ctx
        .request(
            "POST",
            "/auth/token",
            Some(json!({ "username": USERNAME, "password": PASSWORD })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 300);
    assert!(json["access_token"].as_str().is_some());
    assert!(json["refresh_token"].as_str().is_some());
    assert_ne!(json["access_token"], json["refresh_token"]);
    assert_eq!(ctx.fast_store.len(), 1);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let ctx = test_app().await;

    let (status, json) = ctx
        .request(
            "POST",
            "/auth/token",
            Some(json!({ "username": USERNAME, "password": "wrong" })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().is_some());
    assert!(ctx.fast_store.is_empty());
}

#[tokio::test]
async fn test_login_unknown_user() {
    let ctx = test_app().await;

    let (status, _) = ctx
        .request(
            "POST",
            "/auth/token",
            Some(json!({ "username": "mallory@example.com", "password": PASSWORD })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_blank_username() {
    let ctx = test_app().await;

    let (status, _) = ctx
        .request(
            "POST",
            "/auth/token",
            Some(json!({ "username": "  ", "password": PASSWORD })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_whitespace_password() {
    let ctx = test_app().await;

    let (status, body) = ctx
        .request(
            "POST",
            "/auth/token",
            Some(json!({ "username": USERNAME, "password": "   " })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn test_login_disabled_account() {
    let ctx = test_app().await;
    ctx.db.users().set_active(ctx.user_id, false).await.unwrap();

    let (status, _) = ctx
        .request(
            "POST",
            "/auth/token",
            Some(json!({ "username": USERNAME, "password": PASSWORD })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_verify_describes_caller() {
    let ctx = test_app().await;
    let admin_id = create_user(&ctx.db, "root@example.com", "hunter22", UserRole::Admin).await;
    let admin = ctx.db.users().get_by_id(admin_id).await.unwrap().unwrap();
    let (access, _) = ctx.login("root@example.com", "hunter22").await;

    let (status, json) = ctx.request("GET", "/auth/verify", None, Some(&access)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subject"], admin.uuid.as_str());
    assert_eq!(json["username"], "root@example.com");
    assert_eq!(json["role"], "admin");
    assert_eq!(json["expires_at"], common::START + 300);
}

#[tokio::test]
async fn test_verify_requires_bearer_token() {
    let ctx = test_app().await;

    let (status, _) = ctx.request("GET", "/auth/verify", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .request("GET", "/auth/verify", None, Some("not-a-token"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_rejects_refresh_token() {
    let ctx = test_app().await;
    let (_, refresh) = ctx.login(USERNAME, PASSWORD).await;

    let (status, _) = ctx.request("GET", "/auth/verify", None, Some(&refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_access_token_rejected_until_refreshed() {
    let ctx = test_app().await;
    let (access, refresh) = ctx.login(USERNAME, PASSWORD).await;

    ctx.clock.advance(300);
    let (status, _) = ctx.request("GET", "/auth/verify", None, Some(&access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = ctx
        .request(
            "POST",
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let new_access = json["access_token"].as_str().unwrap();
    let (status, _) = ctx
        .request("GET", "/auth/verify", None, Some(new_access))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rotates_both_tokens() {
    let ctx = test_app().await;
    let (access, refresh) = ctx.login(USERNAME, PASSWORD).await;

    let (status, json) = ctx
        .request(
            "POST",
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(json["access_token"], access.as_str());
    assert_ne!(json["refresh_token"], refresh.as_str());

    // The superseded pair is dead
    let (status, _) = ctx.request("GET", "/auth/verify", None, Some(&access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .request(
            "POST",
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(ctx.fast_store.len(), 1);
}

#[tokio::test]
async fn test_refresh_with_access_token_rejected() {
    let ctx = test_app().await;
    let (access, _) = ctx.login(USERNAME, PASSWORD).await;

    let (status, _) = ctx
        .request(
            "POST",
            "/auth/refresh",
            Some(json!({ "refresh_token": access })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Session is untouched
    let (status, _) = ctx.request("GET", "/auth/verify", None, Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_revoke_session() {
    let ctx = test_app().await;
    let (access, refresh) = ctx.login(USERNAME, PASSWORD).await;

    let (status, json) = ctx
        .request(
            "POST",
            "/auth/revoke",
            Some(json!({ "access_token": access })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(json, serde_json::Value::Null);

    let (status, _) = ctx.request("GET", "/auth/verify", None, Some(&access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .request(
            "POST",
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Second revoke finds nothing
    let (status, _) = ctx
        .request(
            "POST",
            "/auth/revoke",
            Some(json!({ "access_token": access })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revoke_with_refresh_token_rejected() {
    let ctx = test_app().await;
    let (access, refresh) = ctx.login(USERNAME, PASSWORD).await;

    let (status, _) = ctx
        .request(
            "POST",
            "/auth/revoke",
            Some(json!({ "access_token": refresh })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx.request("GET", "/auth/verify", None, Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_revoke_blank_token() {
    let ctx = test_app().await;

    let (status, _) = ctx
        .request("POST", "/auth/revoke", Some(json!({ "access_token": "" })), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_revoke_all_logs_out_everywhere() {
    let ctx = test_app().await;
    let (laptop, _) = ctx.login(USERNAME, PASSWORD).await;
    let (phone, _) = ctx.login(USERNAME, PASSWORD).await;

    let other_id = create_user(&ctx.db, "bob@example.com", "b0bpassword", UserRole::User).await;
    let (bob, _) = ctx.login("bob@example.com", "b0bpassword").await;

    let (status, json) = ctx
        .request("POST", "/auth/revoke-all", None, Some(&laptop))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["revoked"], 2);

    let (status, _) = ctx.request("GET", "/auth/verify", None, Some(&phone)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Other users keep their sessions
    let (status, _) = ctx.request("GET", "/auth/verify", None, Some(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        ctx.db.authentications().list_by_user(other_id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_full_token_store_rolls_back_login() {
    let ctx = test_app_with(|config| {
        config.fast_store = MemoryTokenStore::with_capacity(1);
    })
    .await;

    ctx.login(USERNAME, PASSWORD).await;

    let (status, _) = ctx
        .request(
            "POST",
            "/auth/token",
            Some(json!({ "username": USERNAME, "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // Only the first session survives in either store
    let sessions = ctx
        .db
        .authentications()
        .list_by_user(ctx.user_id)
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(ctx.fast_store.len(), 1);
}

#[tokio::test]
async fn test_login_rate_limited() {
    let ctx = test_app_with(|config| config.rate_limit = true).await;

    // Blank usernames fail before any password check
    for _ in 0..5 {
        let (status, _) = ctx
            .request(
                "POST",
                "/auth/token",
                Some(json!({ "username": "", "password": "guess" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = ctx
        .request(
            "POST",
            "/auth/token",
            Some(json!({ "username": USERNAME, "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Only the login endpoint is limited
    let (status, _) = ctx.request("GET", "/auth/verify", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
