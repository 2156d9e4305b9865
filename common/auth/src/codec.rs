use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use tracing::debug;

use crate::claims::SessionClaims;
use crate::config::TokenConfig;
use crate::error::{AuthError, AuthResult};

/// Issues and verifies HS256 session tokens signed with the process secret.
///
/// Tokens are self-contained: subject, issue time, absolute expiry and any
/// custom claims. There is no server-side revocation; expiry is the only
/// termination mechanism.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: TokenConfig,
}

impl TokenCodec {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            encoding_key,
            decoding_key,
            config,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue a token for `subject` with the configured default lifetime.
    pub fn issue(&self, subject: &str, extra: Map<String, Value>) -> AuthResult<String> {
        self.issue_with_ttl(
            subject,
            extra,
            Duration::seconds(self.config.access_ttl_seconds),
        )
    }

    /// Issue a token expiring `ttl` from now.
    pub fn issue_with_ttl(
        &self,
        subject: &str,
        extra: Map<String, Value>,
        ttl: Duration,
    ) -> AuthResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: subject.to_owned(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            extra,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    /// Verify signature and expiry, returning the embedded claims.
    ///
    /// Expiry is checked with zero leeway: a token is invalid the moment
    /// `exp` passes. Callers that need skew tolerance must mint with a
    /// longer ttl instead.
    pub fn verify(&self, token: &str) -> AuthResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?;
        debug!(sub = %data.claims.sub, "verified session token");
        Ok(data.claims)
    }
}
