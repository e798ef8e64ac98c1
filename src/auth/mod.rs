pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::types::Role;

/// Longest token lifetime we are willing to sign
pub const MAX_EXPIRY_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: Uuid,
}

/// The authenticated caller, attached to a request for its lifetime only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub subject_id: String,
    pub role: Role,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.sub,
            role: claims.role,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingCredential,

    #[error("{0}")]
    MalformedCredential(&'static str),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Role '{role}' is not permitted to perform this operation")]
    Forbidden { role: Role },

    #[error("Invalid username or password")]
    InvalidLogin,

    #[error("JWT secret not configured")]
    SecretNotConfigured,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
}

/// A freshly signed credential
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
    pub expires_in: i64,
}

/// Signs and verifies bearer credentials (HS256)
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(security: &SecurityConfig) -> Result<Self, AuthError> {
        if security.jwt_secret.is_empty() {
            return Err(AuthError::SecretNotConfigured);
        }
        if security.jwt_secret.len() < 32 {
            tracing::warn!("JWT secret is shorter than recommended (32 bytes)");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[security.jwt_issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = security.jwt_leeway_secs;

        let hours = security.jwt_expiry_hours.min(MAX_EXPIRY_HOURS) as i64;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(security.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(security.jwt_secret.as_bytes()),
            validation,
            issuer: security.jwt_issuer.clone(),
            ttl: Duration::hours(hours),
        })
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, subject: &str, role: Role) -> Result<IssuedToken, AuthError> {
        self.issue_with_ttl(subject, role, self.ttl)
    }

    /// Sign a token valid for `ttl` from now; a negative ttl yields an expired token
    pub fn issue_with_ttl(&self, subject: &str, role: Role, ttl: Duration) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let ttl = ttl.min(Duration::hours(MAX_EXPIRY_HOURS as i64));
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::TokenGeneration("token lifetime out of range".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;

        Ok(IssuedToken {
            token,
            claims,
            expires_in: ttl.num_seconds(),
        })
    }

    /// Check signature, issuer and expiry and return the embedded claims
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn service() -> TokenService {
        TokenService::new(&AppConfig::development().security).unwrap()
    }

    #[test]
    fn issued_tokens_verify() {
        let tokens = service();
        let issued = tokens.issue("42", Role::Admin).unwrap();
        let claims = tokens.verify(&issued.token).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, "crud-api-rust");
        assert_eq!(issued.expires_in, tokens.ttl_secs());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let tokens = service();
        let issued = tokens
            .issue_with_ttl("42", Role::User, Duration::hours(-2))
            .unwrap();
        assert!(matches!(tokens.verify(&issued.token), Err(AuthError::Expired)));
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let tokens = service();
        let user = tokens.issue("42", Role::User).unwrap().token;
        let admin = tokens.issue("42", Role::Admin).unwrap().token;

        // admin payload under the user token's signature
        let user_parts: Vec<&str> = user.split('.').collect();
        let admin_parts: Vec<&str> = admin.split('.').collect();
        let forged = format!("{}.{}.{}", user_parts[0], admin_parts[1], user_parts[2]);

        assert!(matches!(tokens.verify(&forged), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn foreign_secret_or_issuer_is_rejected() {
        let mut other = AppConfig::development().security;
        other.jwt_secret = "some-completely-different-secret-value".to_string();
        let foreign = TokenService::new(&other).unwrap().issue("1", Role::Admin).unwrap();
        assert!(service().verify(&foreign.token).is_err());

        let mut renamed = AppConfig::development().security;
        renamed.jwt_issuer = "someone-else".to_string();
        let foreign = TokenService::new(&renamed).unwrap().issue("1", Role::Admin).unwrap();
        assert!(service().verify(&foreign.token).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        let mut security = AppConfig::development().security;
        security.jwt_secret.clear();
        assert!(matches!(TokenService::new(&security), Err(AuthError::SecretNotConfigured)));
    }

    #[test]
    fn garbage_is_not_a_token() {
        assert!(matches!(service().verify("not.a.jwt"), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn lifetimes_are_capped() {
        let issued = service()
            .issue_with_ttl("1", Role::User, Duration::weeks(52 * 1000))
            .unwrap();
        assert_eq!(issued.expires_in, (MAX_EXPIRY_HOURS * 3600) as i64);
        assert!(service().verify(&issued.token).is_ok());
    }
}
