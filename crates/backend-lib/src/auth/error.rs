//! Error taxonomy of the session/token lifecycle.
use thiserror::Error;

use crate::storage::StoreError;

/// Structured failure kinds returned by the session manager, the gate and the
/// account flows built on top of them. The transport layer picks status codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was presented
    #[error("no credential presented")]
    Unauthenticated,

    /// Malformed, wrongly signed, expired, or its subject no longer exists
    #[error("invalid access token")]
    InvalidAccessToken,

    /// Malformed, wrongly signed, expired, or its subject no longer exists
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Correctly signed but not the currently stored refresh token: a stale client or a replay
    #[error("refresh token is expired or used")]
    RefreshTokenReused,

    /// Unknown selector or wrong password at login
    #[error("invalid user credentials")]
    InvalidCredentials,

    /// Old password did not verify during a password change
    #[error("invalid old password")]
    IncorrectPassword,

    /// The identity vanished between authentication and persistence
    #[error("identity {0} not found")]
    IdentityNotFound(String),

    #[error("identity store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("token issuance failed: {0}")]
    TokenIssue(String),
}

impl AuthError {
    /// Map a storage failure that happened while serving a token operation
    pub(crate) fn from_store(err: StoreError) -> Self {
        AuthError::StoreUnavailable(err.to_string())
    }
}
