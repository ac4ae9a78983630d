mod error;
mod tokens;

use axum::Router;
use std::sync::Arc;

use crate::auth::AuthenticationService;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;

/// Create the API router. Routes are relative to the mount point (`/auth`).
pub fn create_api_router(
    auth: AuthenticationService,
    rate_limit: Option<Arc<RateLimitConfig>>,
) -> Router {
    tokens::router(tokens::TokensState { auth }, rate_limit)
}
