//! Session token minting and verification.
//!
//! Tokens are HS256 JWTs bound to the account id and role. They are checked
//! when a persisted Identity is restored; a token that does not verify makes
//! the record unusable.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use storefront_core::{Account, Identity, Role};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// JWT claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id
    pub sub: String,

    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Unique per login
    pub jti: String,
}

/// Mints and checks session tokens with one shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        TokenIssuer {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for a freshly authenticated account.
    pub fn issue(&self, account: &Account) -> ClientResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: account.id.to_string(),
            role: account.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ClientError::Internal(format!("Failed to sign session token: {e}")))
    }

    /// Decodes a token without tying it to an identity.
    pub fn decode(&self, token: &str) -> ClientResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| ClientError::MalformedPersisted(format!("session token rejected: {e}")))
    }

    /// Checks that `identity` carries a live token issued for it.
    pub fn verify(&self, identity: &Identity) -> ClientResult<SessionClaims> {
        let claims = self.decode(&identity.session_token)?;

        if claims.sub != identity.id.as_str() {
            return Err(ClientError::MalformedPersisted(format!(
                "session token belongs to {}, record is {}",
                claims.sub, identity.id
            )));
        }
        if claims.role != identity.role {
            return Err(ClientError::MalformedPersisted(format!(
                "session token role {} does not match record role {}",
                claims.role, identity.role
            )));
        }
        Ok(claims)
    }
}
