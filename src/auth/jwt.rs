//! JWT token issuing and validation (HS256)

use crate::{config::AppConfig, error::AppError};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,

    pub email: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl Claims {
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

/// Why a presented token was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token malformed or signature invalid")]
    Malformed,
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AppError::unauthenticated("Token expired"),
            TokenError::Malformed => AppError::unauthenticated("Invalid token"),
        }
    }
}

/// Signs and verifies bearer tokens
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_exp_secs: u64,
}

impl JwtService {
    pub fn new(secret: &str, token_exp_secs: u64) -> Result<Self, AppError> {
        // HS256 needs a reasonably long key
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_exp_secs,
        })
    }

    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            config.security.jwt_secret.expose_secret(),
            config.security.token_exp_secs,
        )
    }

    /// Issue a signed token for an account
    pub fn issue(&self, account_id: Uuid, email: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.token_exp_secs as i64);

        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {:?}", e);
            AppError::Internal(format!("Failed to encode token: {}", e))
        })
    }

    /// Validate signature and expiry; return the claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_32_characters_long!";

    #[test]
    fn test_issue_and_verify() {
        let service = JwtService::new(SECRET, 900).unwrap();
        let account_id = Uuid::new_v4();

        let token = service.issue(account_id, "a@x.com").unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.account_id().unwrap(), account_id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_tokens_are_unique() {
        let service = JwtService::new(SECRET, 900).unwrap();
        let account_id = Uuid::new_v4();

        let t1 = service.issue(account_id, "a@x.com").unwrap();
        let t2 = service.issue(account_id, "a@x.com").unwrap();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_wrong_secret_is_malformed() {
        let issuer = JwtService::new(SECRET, 900).unwrap();
        let other = JwtService::new("another_secret_key_32_characters_long", 900).unwrap();

        let token = issuer.issue(Uuid::new_v4(), "a@x.com").unwrap();
        assert_eq!(other.verify(&token).unwrap_err(), TokenError::Malformed);
        assert_eq!(issuer.verify("garbage").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_expired_token() {
        let service = JwtService::new(SECRET, 900).unwrap();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "a@x.com".to_string(),
            iat: now - 120,
            exp: now - 60,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(service.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtService::new("short", 900).is_err());
    }
}
