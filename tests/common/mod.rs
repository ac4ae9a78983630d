#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;
use uaa::auth::hash_password;
use uaa::clock::ManualClock;
use uaa::db::{Database, UserRole};
use uaa::store::MemoryTokenStore;
use uaa::{ServerConfig, create_app};

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";
pub const START: u64 = 1_700_000_000;
pub const USERNAME: &str = "alice@example.com";
pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub fast_store: MemoryTokenStore,
    pub clock: Arc<ManualClock>,
    pub user_id: i64,
}

/// App with one active user and rate limiting disabled.
pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

pub async fn test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let user_id = create_user(&db, USERNAME, PASSWORD, UserRole::User).await;

    let clock = Arc::new(ManualClock::new(START));
    let mut config = ServerConfig::new(db.clone(), TEST_SECRET.to_vec());
    config.clock = clock.clone();
    config.rate_limit = false;
    configure(&mut config);

    TestApp {
        app: create_app(&config),
        db,
        fast_store: config.fast_store.clone(),
        clock,
        user_id,
    }
}

pub async fn create_user(db: &Database, username: &str, password: &str, role: UserRole) -> i64 {
    let hash = hash_password(password).expect("Failed to hash password");
    db.users()
        .create(&uuid::Uuid::new_v4().to_string(), username, &hash, role)
        .await
        .expect("Failed to create user")
}

impl TestApp {
    /// Send a request and return the status with the JSON body (`Null` if empty).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Log in and return (access_token, refresh_token).
    pub async fn login(&self, username: &str, password: &str) -> (String, String) {
        let (status, json) = self
            .request(
                "POST",
                "/auth/token",
                Some(serde_json::json!({ "username": username, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", json);
        (
            json["access_token"].as_str().unwrap().to_string(),
            json["refresh_token"].as_str().unwrap().to_string(),
        )
    }
}
