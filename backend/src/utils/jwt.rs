//! JWT token utilities for authentication and authorization.
//!
//! Mints and verifies the access/refresh token pair. Each token kind is
//! signed with its own secret and carries its own expiry; rotation is the
//! session service's responsibility, not the issuer's.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use jsonwebtoken::errors::ErrorKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::database::models::User;
use crate::errors::{ServiceError, ServiceResult};

/// Why a token was rejected. Callers only learn that verification failed;
/// the taxonomy exists for logging.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("signature mismatch")]
    BadSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// User ID
    pub sub: String,
    /// Display name
    pub username: String,
    /// Account email
    pub email: String,
    /// Token expiration timestamp
    pub exp: usize,
    /// Token issued at timestamp
    pub iat: usize,
}

/// Claims carried by a refresh token. Only the subject is needed; the
/// authoritative copy of the token lives on the user record.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// JWT token utility for creating and validating the token pair
pub struct JwtUtils {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_expires_in_seconds: u64,
    refresh_expires_in_seconds: u64,
    validation: Validation,
}

impl JwtUtils {
    /// Create a JwtUtils instance from an already-loaded configuration
    pub fn from_config(config: &Config) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        JwtUtils {
            access_encoding_key: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_expires_in_seconds: config.access_token_expires_in_seconds,
            refresh_expires_in_seconds: config.refresh_token_expires_in_seconds,
            validation,
        }
    }

    /// Signed access-token lifetime, for response payloads.
    pub fn access_expires_in_seconds(&self) -> u64 {
        self.access_expires_in_seconds
    }

    /// Generate a new access token carrying the user's identity snapshot
    pub fn generate_access_token(&self, user: &User) -> ServiceResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_expires_in_seconds as i64);

        let claims = AccessClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.access_encoding_key)
            .map_err(|e| ServiceError::internal(format!("Token generation failed: {e}")))
    }

    /// Generate a new refresh token for the given user id
    pub fn generate_refresh_token(&self, user_id: &str) -> ServiceResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.refresh_expires_in_seconds as i64);

        let claims = RefreshClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.refresh_encoding_key).map_err(|e| {
            ServiceError::internal(format!("Refresh token generation failed: {e}"))
        })
    }

    /// Validate and decode an access token
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.access_decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(classify)
    }

    /// Validate and decode a refresh token
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(classify)
    }
}

fn classify(error: jsonwebtoken::errors::Error) -> TokenError {
    match error.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        _ => TokenError::Malformed(error.to_string()),
    }
}
