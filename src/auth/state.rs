//! Authentication state trait and macro.

use super::service::AuthenticationService;

/// Trait for state types that can authorize bearer tokens.
pub trait HasAuthService {
    fn auth(&self) -> &AuthenticationService;
}

/// Macro to implement `HasAuthService` for state structs with the standard field.
///
/// The struct must have an `auth: AuthenticationService` field.
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_service;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub auth: AuthenticationService,
///     // ... other fields
/// }
///
/// impl_has_auth_service!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_service {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthService for $state_type {
            fn auth(&self) -> &$crate::auth::AuthenticationService {
                &self.auth
            }
        }
    };
}
