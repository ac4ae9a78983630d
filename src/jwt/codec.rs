//! Compact JWT encoding and decoding (HS256).

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DecodedToken, JwtError, TokenType};

/// Claim names owned by the codec. Custom claims may not reuse them.
const RESERVED_CLAIMS: &[&str] = &["jti", "sub", "typ", "iat", "exp"];

/// Wire form of the token payload.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    jti: String,
    sub: String,
    #[serde(rename = "typ")]
    token_type: TokenType,
    iat: u64,
    exp: u64,
    #[serde(flatten)]
    custom: Map<String, Value>,
}

/// Everything a token carries apart from its nonce and signature.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenContent {
    pub subject: String,
    pub token_type: TokenType,
    pub issued_at: u64,
    pub expires_at: u64,
    pub claims: Map<String, Value>,
}

/// Signs and verifies tokens with a process-wide symmetric key.
#[derive(Clone)]
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCodec {
    /// Create a codec for the given secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiration is checked against the injected clock in `decode`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign `content` into a compact token. A fresh `jti` is embedded each call.
    pub fn encode(&self, content: &TokenContent) -> Result<String, JwtError> {
        if let Some(key) = content
            .claims
            .keys()
            .find(|key| RESERVED_CLAIMS.contains(&key.as_str()))
        {
            return Err(JwtError::Generation(format!("claim '{}' is reserved", key)));
        }

        let claims = Claims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: content.subject.clone(),
            token_type: content.token_type,
            iat: content.issued_at,
            exp: content.expires_at,
            custom: content.claims.clone(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Generation(e.to_string()))
    }

    /// Verify the signature and decode the payload.
    /// Tokens with `exp <= now` are rejected.
    pub fn decode(&self, token: &str, now: u64) -> Result<DecodedToken, JwtError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;
        let claims = data.claims;

        if claims.exp <= now {
            return Err(JwtError::Invalid("token has expired".into()));
        }

        Ok(DecodedToken {
            id: claims.jti,
            subject: claims.sub,
            token_type: claims.token_type,
            issued_at: claims.iat,
            expires_at: claims.exp,
            claims: claims.custom,
        })
    }
}
