//! Bearer-token validation.
//!
//! Campaign launches are gated on a role claim, so the validator
//! requires `exp` and decodes the `roles` array along with the standard
//! claims. The HTTP layer hands the raw `Authorization` header value to
//! [`JwtValidator::validate_bearer`]; a missing or malformed header
//! yields an anonymous caller upstream, never a panic.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::config::JwtConfig;
use crate::error::AppError;

use super::Claims;

pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(ref audience) = config.audience {
            validation.set_audience(&[audience]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Validate a raw token string and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Validate an `Authorization` header value. Only the `Bearer`
    /// scheme is accepted.
    pub fn validate_bearer(&self, header: &str) -> Result<Claims, AppError> {
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Auth("Expected Bearer authorization scheme".into()))?;
        self.validate(token.trim())
    }
}
