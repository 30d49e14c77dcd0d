use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::models::{Role, User};

pub mod password;
pub mod permissions;

pub use permissions::{can_manage_course, require_role};
pub use password::{generate_password, hash_password, hash_password_async, verify_password, verify_password_async};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user: &User, token_type: TokenType, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            token_type,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Expected a {expected:?} token")]
    WrongTokenType { expected: TokenType },

    #[error("Invalid JWT secret")]
    MissingSecret,

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Access/refresh pair handed out on login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub fn generate_jwt(claims: &Claims, security: &SecurityConfig) -> Result<String, AuthError> {
    if security.jwt_secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(security.jwt_secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Decode a token, checking signature, expiry and that it is of the expected type
pub fn validate_jwt(token: &str, expected: TokenType, security: &SecurityConfig) -> Result<Claims, AuthError> {
    if security.jwt_secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    if token_data.claims.token_type != expected {
        return Err(AuthError::WrongTokenType { expected });
    }
    Ok(token_data.claims)
}

pub fn issue_access_token(user: &User, security: &SecurityConfig) -> Result<String, AuthError> {
    let claims = Claims::new(user, TokenType::Access, Duration::minutes(security.jwt_access_minutes));
    generate_jwt(&claims, security)
}

pub fn issue_token_pair(user: &User, security: &SecurityConfig) -> Result<TokenPair, AuthError> {
    let refresh = Claims::new(user, TokenType::Refresh, Duration::hours(security.jwt_refresh_hours));
    Ok(TokenPair {
        access: issue_access_token(user, security)?,
        refresh: generate_jwt(&refresh, security)?,
    })
}
