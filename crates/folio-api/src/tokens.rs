//! Signed, time-bound access and refresh tokens (JWT, HS256).
//!
//! Each kind has its own signing key and an embedded `type` claim. A token
//! only verifies when both the key and the tag match the requested kind.
//! Tokens are stateless: expiry is the only way one stops being valid
//! short of rotating the secrets.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;
use uuid::Uuid;

use folio_types::api::Claims;
use folio_types::models::TokenKind;

use crate::config::TokenConfig;

/// Access token lifetime: 60 minutes.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand against the caller's clock reading.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: SigningKeys::from_secret(&config.access_secret),
            refresh: SigningKeys::from_secret(&config.refresh_secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            validation,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(&self, subject: Uuid) -> Result<String> {
        self.issue_access_at(subject, Utc::now())
    }

    pub fn issue_access_at(&self, subject: Uuid, now: DateTime<Utc>) -> Result<String> {
        self.issue(TokenKind::Access, subject, now)
    }

    pub fn issue_refresh(&self, subject: Uuid) -> Result<String> {
        self.issue_refresh_at(subject, Utc::now())
    }

    pub fn issue_refresh_at(&self, subject: Uuid, now: DateTime<Utc>) -> Result<String> {
        self.issue(TokenKind::Refresh, subject, now)
    }

    /// Fresh access + refresh tokens for a login or refresh.
    pub fn issue_pair(&self, subject: Uuid) -> Result<TokenPair> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.issue_access_at(subject, now)?,
            refresh_token: self.issue_refresh_at(subject, now)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Option<Uuid> {
        self.verify_access_at(token, Utc::now())
    }

    pub fn verify_access_at(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
        self.verify(TokenKind::Access, token, now)
    }

    pub fn verify_refresh(&self, token: &str) -> Option<Uuid> {
        self.verify_refresh_at(token, Utc::now())
    }

    pub fn verify_refresh_at(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
        self.verify(TokenKind::Refresh, token, now)
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn issue(&self, kind: TokenKind, subject: Uuid, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: subject,
            iat: now.timestamp(),
            exp: (now + self.ttl(kind)).timestamp(),
            kind,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding)
            .map_err(|e| anyhow!("Failed to sign {} token: {}", kind, e))
    }

    /// All-or-nothing: any failure yields `None`.
    fn verify(&self, kind: TokenKind, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
        let claims = match decode::<Claims>(token, &self.keys(kind).decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(%kind, error = %e, "Token rejected");
                return None;
            }
        };

        if claims.kind != kind {
            debug!(%kind, found = %claims.kind, "Token rejected: wrong kind");
            return None;
        }

        if claims.exp <= now.timestamp() {
            debug!(%kind, exp = claims.exp, "Token rejected: expired");
            return None;
        }

        Some(claims.sub)
    }
}
