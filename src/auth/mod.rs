/*!
 * # Authentication Module
 *
 * JWT issuance and validation for customer sessions, plus Argon2 password
 * hashing. Tokens are HS256, carry issuer and audience claims, and expire
 * after the configured lifetime. The `AuthenticatedCustomer` extractor
 * guards every route that acts on a customer's own data.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{config::AppConfig, errors::ErrorResponse, AppState};

/// Claim structure for customer JWTs
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authentication token provided")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Failed to create token: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken | Self::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::TokenCreation(_) | Self::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn response_message(&self) -> String {
        match self {
            // Internal failures must not leak hashing or signing details
            Self::TokenCreation(_) | Self::Hashing(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for crate::errors::ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hashing(msg) => crate::errors::ServiceError::HashError(msg),
            AuthError::TokenCreation(msg) => crate::errors::ServiceError::InternalError(msg),
            other => crate::errors::ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Signing material and validation rules shared by all token operations.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    expiration_secs: usize,
}

impl AuthKeys {
    pub fn new(secret: &str, issuer: &str, audience: &str, expiration_secs: usize) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            expiration_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            &config.auth_issuer,
            &config.auth_audience,
            config.jwt_expiration,
        )
    }

    /// Issues a signed token for the given customer.
    pub fn issue_token(&self, customer_id: Uuid, email: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::seconds(self.expiration_secs as i64);

        let claims = Claims {
            sub: customer_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Decodes and validates a token, checking signature, expiry, issuer
    /// and audience.
    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }

    pub fn expiration_secs(&self) -> usize {
        self.expiration_secs
    }
}

impl std::fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeys")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiration_secs", &self.expiration_secs)
            .finish_non_exhaustive()
    }
}

/// Hashes a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verifies a password against a stored hash.
///
/// A wrong password is `Ok(false)`; `Err` is reserved for malformed hashes
/// and other hashing failures.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Hashing(e.to_string())),
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Customer identity extracted from a validated bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedCustomer {
    pub customer_id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedCustomer {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.auth.decode_token(token)?;
        let customer_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthenticatedCustomer {
            customer_id,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const TEST_SECRET: &str =
        "storefront_wallet_checkout_jwt_rotation_key_v3_qwertyuiop_zxcvbnm_13579_xK";

    fn test_keys() -> AuthKeys {
        AuthKeys::new(TEST_SECRET, "storefront-api", "storefront-clients", 3600)
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2"));

        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("same password").unwrap();
        let second = hash_password("same password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        let result = verify_password("anything", "not-an-argon2-hash");
        assert!(matches!(result, Err(AuthError::Hashing(_))));
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let keys = test_keys();
        let customer_id = Uuid::new_v4();

        let token = keys.issue_token(customer_id, "jo@example.com").unwrap();
        let claims = keys.decode_token(&token).unwrap();

        assert_eq!(claims.sub, customer_id.to_string());
        assert_eq!(claims.email, "jo@example.com");
        assert_eq!(claims.iss, "storefront-api");
        assert_eq!(claims.aud, "storefront-clients");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn decode_rejects_token_signed_with_other_secret() {
        let keys = test_keys();
        let other = AuthKeys::new(
            "a_completely_different_signing_secret_for_the_negative_case_0987654321_Qq",
            "storefront-api",
            "storefront-clients",
            3600,
        );

        let token = other.issue_token(Uuid::new_v4(), "jo@example.com").unwrap();
        assert!(matches!(
            keys.decode_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn decode_rejects_wrong_issuer() {
        let keys = test_keys();
        let other = AuthKeys::new(TEST_SECRET, "someone-else", "storefront-clients", 3600);

        let token = other.issue_token(Uuid::new_v4(), "jo@example.com").unwrap();
        assert!(matches!(
            keys.decode_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn decode_rejects_expired_token() {
        let keys = test_keys();
        let now = Utc::now();

        // Expired well past the default validation leeway.
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "jo@example.com".to_string(),
            iat: (now - ChronoDuration::hours(2)).timestamp(),
            exp: (now - ChronoDuration::hours(1)).timestamp(),
            iss: "storefront-api".to_string(),
            aud: "storefront-clients".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            keys.decode_token(&token),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MissingToken)
        ));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MissingToken)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MissingToken)
        ));
    }
}
