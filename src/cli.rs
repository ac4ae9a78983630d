//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::hash_password;
use crate::db::{Database, UserRole};
use crate::store::MemoryTokenStore;
use clap::Parser;
use tracing::{error, info};
use uuid::Uuid;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Environment variable holding the password for `--create-admin`.
const ADMIN_PASSWORD_ENV: &str = "UAA_ADMIN_PASSWORD";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "uaa",
    about = "User authentication and authorization with JWT sessions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "uaa.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = crate::jwt::ACCESS_TOKEN_DURATION_SECS, value_parser = validate_ttl)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = crate::jwt::REFRESH_TOKEN_DURATION_SECS, value_parser = validate_ttl)]
    pub refresh_token_ttl: u64,

    /// Maximum number of sessions held in the fast-access token store (unbounded if unset)
    #[arg(long)]
    pub fast_store_capacity: Option<usize>,

    /// Disable per-IP rate limiting of the login endpoint
    #[arg(long)]
    pub no_rate_limit: bool,

    /// Create an admin user with this username on startup (password read from UAA_ADMIN_PASSWORD)
    #[arg(long)]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_ttl(s: &str) -> Result<u64, String> {
    let ttl: u64 = s
        .parse()
        .map_err(|e| format!("Invalid lifetime '{}': {}", s, e))?;
    if ttl == 0 {
        return Err("Token lifetime must be at least one second".to_string());
    }
    if ttl > crate::jwt::MAX_TOKEN_DURATION_SECS {
        return Err(format!(
            "Token lifetime must not exceed {} seconds",
            crate::jwt::MAX_TOKEN_DURATION_SECS
        ));
    }
    Ok(ttl)
}

/// Check that the refresh token outlives the access token it renews.
pub fn validate_ttls(access_token_ttl: u64, refresh_token_ttl: u64) -> bool {
    if refresh_token_ttl <= access_token_ttl {
        error!(
            access_token_ttl,
            refresh_token_ttl, "Refresh token lifetime must exceed access token lifetime"
        );
        return false;
    }
    true
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    check_secret_length(secret)
}

fn check_secret_length(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Handle the --create-admin flag: create the admin account unless one with
/// that username already exists. Returns false if startup should abort.
pub async fn handle_create_admin(db: &Database, username: &str) -> bool {
    match db.users().get_by_username(username).await {
        Ok(Some(existing)) => {
            info!(username = %existing.username, "Admin user already exists");
            return true;
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            return false;
        }
    }

    let password = match std::env::var(ADMIN_PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => {
            // SAFETY: single-threaded startup, nothing else reads this variable.
            unsafe { std::env::remove_var(ADMIN_PASSWORD_ENV) };
            password
        }
        _ => {
            error!("{} must be set to create an admin user", ADMIN_PASSWORD_ENV);
            return false;
        }
    };

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash admin password");
            return false;
        }
    };

    let uuid = Uuid::new_v4().to_string();
    match db
        .users()
        .create(&uuid, username, &password_hash, UserRole::Admin)
        .await
    {
        Ok(id) => {
            info!(user_id = id, username = %username, "Admin user created");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    let fast_store = match args.fast_store_capacity {
        Some(capacity) => MemoryTokenStore::with_capacity(capacity),
        None => MemoryTokenStore::new(),
    };

    ServerConfig {
        access_token_ttl: args.access_token_ttl,
        refresh_token_ttl: args.refresh_token_ttl,
        fast_store,
        rate_limit: !args.no_rate_limit,
        ..ServerConfig::new(db, jwt_secret.into_bytes())
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
