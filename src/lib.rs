pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod clock;
pub mod db;
pub mod jwt;
pub mod rate_limit;
pub mod store;

use api::create_api_router;
use auth::{AuthenticationService, DatabaseCredentialAuthenticator};
use axum::Router;
use clock::{Clock, SystemClock};
use db::Database;
use jwt::{
    ACCESS_TOKEN_DURATION_SECS, JwtCodec, REFRESH_TOKEN_DURATION_SECS, TokenIssuer, TokenVerifier,
};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use store::MemoryTokenStore;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime (seconds)
    pub access_token_ttl: u64,
    /// Refresh token lifetime (seconds)
    pub refresh_token_ttl: u64,
    /// Fast-access token index shared by every request
    pub fast_store: MemoryTokenStore,
    /// Whether to rate limit the login endpoint per client IP
    pub rate_limit: bool,
    /// Time source for issuing and verifying tokens
    pub clock: Arc<dyn Clock>,
}

impl ServerConfig {
    /// Configuration with default token lifetimes, an unbounded token store and rate limiting on.
    pub fn new(db: Database, jwt_secret: Vec<u8>) -> Self {
        Self {
            db,
            jwt_secret,
            access_token_ttl: ACCESS_TOKEN_DURATION_SECS,
            refresh_token_ttl: REFRESH_TOKEN_DURATION_SECS,
            fast_store: MemoryTokenStore::new(),
            rate_limit: true,
            clock: Arc::new(SystemClock),
        }
    }

    /// Wire the authentication service over the configured stores.
    pub fn auth_service(&self) -> AuthenticationService {
        let codec = Arc::new(JwtCodec::new(&self.jwt_secret));
        let issuer = TokenIssuer::new(codec.clone(), self.clock.clone())
            .with_ttls(self.access_token_ttl, self.refresh_token_ttl);
        let verifier = TokenVerifier::new(codec, self.clock.clone());

        AuthenticationService::new(
            issuer,
            verifier,
            Arc::new(DatabaseCredentialAuthenticator::new(self.db.users())),
            Arc::new(self.db.authentications()),
            Arc::new(self.fast_store.clone()),
        )
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let rate_limit = config
        .rate_limit
        .then(|| Arc::new(RateLimitConfig::new()));

    Router::new().nest("/auth", create_api_router(config.auth_service(), rate_limit))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(config: &ServerConfig) -> tokio::task::JoinHandle<()> {
    let records = Arc::new(config.db.authentications());
    let fast = Arc::new(config.fast_store.clone());

    cleanup::run_cleanup(records.as_ref(), fast.as_ref(), config.clock.as_ref()).await;
    cleanup::spawn_cleanup_scheduler(records, fast, config.clock.clone())
}

/// Serve on the given listener until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
