//! Session-based JWT authentication.
//!
//! A login opens a session holding an access/refresh token pair. Sessions are
//! persisted in the record store and mirrored into the fast-access store, which
//! answers revocation checks on every authenticated request.

mod credentials;
mod errors;
mod extractors;
mod ports;
mod service;
mod state;
mod types;

pub use credentials::{DatabaseCredentialAuthenticator, hash_password, verify_password};
pub use errors::{AuthError, CompensationError, PersistenceError, TokenStoreError};
pub use extractors::{BearerAuth, bearer_token};
pub use ports::{AuthenticationRecordStore, CredentialAuthenticator, FastAccessTokenStore};
pub use service::AuthenticationService;
pub use state::HasAuthService;
pub use types::{AuthenticatedUser, Credentials, JwtAuthentication, Principal};
