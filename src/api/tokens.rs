//! Token API endpoints.
//!
//! - POST `/token` - Exchange username/password for a token pair
//! - POST `/refresh` - Exchange a refresh token for a new pair
//! - POST `/revoke` - Revoke the session an access token belongs to
//! - GET `/verify` - Describe the caller behind a bearer token
//! - POST `/revoke-all` - Revoke every session of the caller

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::auth::{AuthenticationService, BearerAuth, Credentials, JwtAuthentication};
use crate::db::UserRole;
use crate::impl_has_auth_service;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

#[derive(Clone)]
pub struct TokensState {
    pub auth: AuthenticationService,
}

impl_has_auth_service!(TokensState);

pub fn router(state: TokensState, rate_limit: Option<Arc<RateLimitConfig>>) -> Router {
    let mut login = Router::new().route("/token", post(issue_token));
    if let Some(config) = rate_limit {
        login = login.layer(middleware::from_fn_with_state(config, rate_limit_login));
    }

    Router::new()
        .merge(login)
        .route("/refresh", post(refresh_token))
        .route("/revoke", post(revoke_token))
        .route("/revoke-all", post(revoke_all))
        .route("/verify", get(verify_token))
        .with_state(state)
}

#[derive(Deserialize)]
struct TokenRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
struct RevokeRequest {
    access_token: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    /// Seconds until the access token expires
    expires_in: u64,
}

impl From<JwtAuthentication> for TokenResponse {
    fn from(session: JwtAuthentication) -> Self {
        let expires_in = session
            .access_token
            .expires_at
            .saturating_sub(session.access_token.issued_at);
        Self {
            access_token: session.access_token.encoded,
            refresh_token: session.refresh_token.encoded,
            token_type: "Bearer",
            expires_in,
        }
    }
}

#[derive(Serialize)]
struct VerifyResponse {
    subject: String,
    username: String,
    role: UserRole,
    expires_at: u64,
}

#[derive(Serialize)]
struct RevokeAllResponse {
    revoked: u64,
}

async fn issue_token(
    State(state): State<TokensState>,
    Json(body): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let credentials = Credentials::new(body.username, body.password);
    let session = state.auth.authenticate(&credentials).await?;
    Ok(Json(session.into()))
}

async fn refresh_token(
    State(state): State<TokensState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let session = state.auth.refresh_authentication(&body.refresh_token).await?;
    Ok(Json(session.into()))
}

async fn revoke_token(
    State(state): State<TokensState>,
    Json(body): Json<RevokeRequest>,
) -> Result<StatusCode, ApiError> {
    state.auth.revoke_authentication(&body.access_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lightweight check that the bearer token is valid and not revoked.
async fn verify_token(BearerAuth(user): BearerAuth) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        subject: user.subject,
        username: user.username,
        role: user.role,
        expires_at: user.expires_at,
    })
}

/// Log out everywhere.
async fn revoke_all(
    State(state): State<TokensState>,
    BearerAuth(user): BearerAuth,
) -> Result<Json<RevokeAllResponse>, ApiError> {
    let revoked = state.auth.revoke_all_for_user(user.user_id).await?;
    Ok(Json(RevokeAllResponse { revoked }))
}
