//! Signed access/refresh token pairs.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use trade_core::config::JwtSettings;
use trade_core::{Actor, Role};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Which half of a pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub uid: Uuid,
    pub role: Role,
    pub iss: String,
    /// Subject, the user ID as a string.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub typ: TokenType,
    /// Unique token ID.
    pub jti: String,
}

impl Claims {
    fn new(uid: Uuid, role: Role, issuer: &str, typ: TokenType, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            uid,
            role,
            iss: issuer.to_string(),
            sub: uid.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            typ,
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.uid, self.role)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// A freshly issued token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Configuration for JWT authentication.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl From<&JwtSettings> for JwtConfig {
    fn from(settings: &JwtSettings) -> Self {
        Self {
            secret: settings.secret.clone(),
            issuer: settings.issuer.clone(),
            access_ttl: Duration::seconds(settings.access_ttl_secs),
            refresh_ttl: Duration::seconds(settings.refresh_ttl_secs),
        }
    }
}

/// Issues and validates HS256 tokens.
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: JwtConfig,
    validation: Validation,
}

impl JwtAuth {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        Self {
            encoding_key,
            decoding_key,
            config,
            validation,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    /// Issue an access + refresh pair for an identity.
    pub fn issue_pair(&self, uid: Uuid, role: Role) -> AuthResult<TokenPair> {
        let access = Claims::new(
            uid,
            role,
            &self.config.issuer,
            TokenType::Access,
            self.config.access_ttl,
        );
        let refresh = Claims::new(
            uid,
            role,
            &self.config.issuer,
            TokenType::Refresh,
            self.config.refresh_ttl,
        );

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            expires_in: self.config.access_ttl.num_seconds(),
        })
    }

    fn sign(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {}", e)))
    }

    /// Validate a token and require the given type. Every failure collapses to
    /// `InvalidToken`; the cause is only logged.
    pub fn validate(&self, token: &str, expected: TokenType) -> AuthResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                AuthError::InvalidToken
            })?
            .claims;

        if claims.typ != expected {
            tracing::debug!(expected = ?expected, actual = ?claims.typ, "Token type mismatch");
            return Err(AuthError::InvalidToken);
        }
        if claims.sub != claims.uid.to_string() {
            tracing::debug!("Token subject does not match uid");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    pub fn validate_access(&self, token: &str) -> AuthResult<Claims> {
        self.validate(token, TokenType::Access)
    }

    pub fn validate_refresh(&self, token: &str) -> AuthResult<Claims> {
        self.validate(token, TokenType::Refresh)
    }

    #[cfg(test)]
    fn sign_claims(&self, claims: &Claims) -> String {
        self.sign(claims).unwrap()
    }
}
