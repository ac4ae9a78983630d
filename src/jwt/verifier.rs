//! Token verification with type enforcement.

use std::sync::Arc;

use super::{DecodedToken, JwtCodec, JwtError, TokenType};
use crate::clock::Clock;

#[derive(Clone)]
pub struct TokenVerifier {
    codec: Arc<JwtCodec>,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    pub fn new(codec: Arc<JwtCodec>, clock: Arc<dyn Clock>) -> Self {
        Self { codec, clock }
    }

    /// Check signature and expiration, then require the given token type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<DecodedToken, JwtError> {
        let decoded = self.codec.decode(token, self.clock.now())?;

        if decoded.token_type != expected {
            return Err(JwtError::UnexpectedType {
                expected,
                actual: decoded.token_type,
            });
        }

        Ok(decoded)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<DecodedToken, JwtError> {
        self.verify(token, TokenType::Access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<DecodedToken, JwtError> {
        self.verify(token, TokenType::Refresh)
    }
}
