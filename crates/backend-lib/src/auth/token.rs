// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
/** Signed access and refresh tokens
Each token kind has its own secret and lifetime. Tokens are HS256 JWTs carrying
the identity id as subject plus the kind they were minted for, so a token of
one kind never verifies as the other even if the secrets were configured equal. */
use chrono::Utc;
use identity_common::IdentityId;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::TokenSettings;

/// The two token kinds handed out per session
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Why a token failed to verify
///
/// Callers reject on every variant; the distinction exists for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token was issued as a different kind")]
    WrongKind,

    #[error("token could not be signed: {0}")]
    Signing(String),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Claims {
    sub: String,
    kind: TokenKind,
    iat: i64,
    exp: i64,
    jti: String,
}

struct TokenKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKey {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Stateless signer/verifier for both token kinds
pub struct TokenCodec {
    access: TokenKey,
    refresh: TokenKey,
    validation: Validation,
}

impl TokenCodec {
    /** Create a codec
    # Arguments
    * `access_secret` / `access_ttl` - key and lifetime of access tokens
    * `refresh_secret` / `refresh_ttl` - key and lifetime of refresh tokens */
    pub fn new(
        access_secret: &str,
        access_ttl: Duration,
        refresh_secret: &str,
        refresh_ttl: Duration,
    ) -> Result<Self, TokenError> {
        if access_secret.is_empty() || refresh_secret.is_empty() {
            return Err(TokenError::Signing("token secrets must not be empty".to_string()));
        }
        if access_ttl.is_zero() || refresh_ttl.is_zero() {
            return Err(TokenError::Signing("token lifetimes must be non-zero".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            access: TokenKey::new(access_secret, access_ttl),
            refresh: TokenKey::new(refresh_secret, refresh_ttl),
            validation,
        })
    }

    pub fn from_settings(settings: &TokenSettings) -> Result<Self, TokenError> {
        Self::new(
            &settings.access_secret,
            settings.access_ttl(),
            &settings.refresh_secret,
            settings.refresh_ttl(),
        )
    }

    fn key(&self, kind: TokenKind) -> &TokenKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens of the given kind
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        self.key(kind).ttl
    }

    /// Mint a token of `kind` for `id`, valid from now
    pub fn issue(&self, kind: TokenKind, id: IdentityId) -> Result<String, TokenError> {
        self.issue_at(kind, id, Utc::now().timestamp())
    }

    /// Mint a token as if it had been issued at `issued_at` (unix seconds)
    pub fn issue_at(&self, kind: TokenKind, id: IdentityId, issued_at: i64) -> Result<String, TokenError> {
        let key = self.key(kind);
        let ttl = i64::try_from(key.ttl.as_secs())
            .map_err(|_| TokenError::Signing("token lifetime overflows".to_string()))?;
        let claims = Claims {
            sub: id.to_string(),
            kind,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature, expiry and kind; return the subject
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<IdentityId, TokenError> {
        let data = decode::<Claims>(token, &self.key(kind).decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            },
        )?;

        if data.claims.kind != kind {
            return Err(TokenError::WrongKind);
        }

        data.claims
            .sub
            .parse::<IdentityId>()
            .map_err(|_| TokenError::Malformed)
    }
}
