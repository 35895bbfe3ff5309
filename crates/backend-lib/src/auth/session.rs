// ============================
// identity-backend-lib/src/auth/session.rs
// ============================
//! Session issuance, rotation and revocation.
//!
//! Each identity has at most one live refresh token: the value stored in its
//! `current_refresh_token` field. Issuing a new pair overwrites it, so a fresh
//! login anywhere invalidates refresh tokens handed out elsewhere.
use identity_common::{IdentityId, TokenPair};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{AuthError, TokenCodec, TokenKind};
use crate::metrics::{SESSION_CREATED, SESSION_REUSE_DETECTED, SESSION_REVOKED, SESSION_ROTATED};
use crate::storage::IdentityStore;

/// Session manager enforcing the single-active-refresh-token invariant
pub struct SessionManager<S> {
    store: Arc<S>,
    codec: Arc<TokenCodec>,
}

impl<S> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<S: IdentityStore> SessionManager<S> {
    pub fn new(store: Arc<S>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    fn issue_pair(&self, id: IdentityId) -> Result<TokenPair, AuthError> {
        let access_token = self
            .codec
            .issue(TokenKind::Access, id)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))?;
        let refresh_token = self
            .codec
            .issue(TokenKind::Refresh, id)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Issue a new pair and persist its refresh token, overwriting any prior one
    #[instrument(skip_all, fields(identity_id = %id))]
    pub async fn create_session(&self, id: IdentityId) -> Result<TokenPair, AuthError> {
        let pair = self.issue_pair(id)?;

        let stored = self
            .store
            .set_refresh_token(id, &pair.refresh_token)
            .await
            .map_err(AuthError::from_store)?;
        if !stored {
            warn!("identity vanished before its session could be stored");
            return Err(AuthError::IdentityNotFound(id.to_string()));
        }

        counter!(SESSION_CREATED).increment(1);
        info!("session created");
        Ok(pair)
    }

    /// Exchange the presented refresh token for a new pair
    ///
    /// The stored token is replaced with a compare-and-set keyed on the
    /// presented value, so of two concurrent rotations with the same token
    /// exactly one succeeds.
    #[instrument(skip_all)]
    pub async fn rotate_session(&self, presented: &str) -> Result<TokenPair, AuthError> {
        let id = match self.codec.verify(TokenKind::Refresh, presented) {
            Ok(id) => id,
            Err(reason) => {
                debug!(%reason, "refresh token rejected");
                return Err(AuthError::InvalidRefreshToken);
            },
        };

        let identity = self
            .store
            .find_by_id(id)
            .await
            .map_err(AuthError::from_store)?;
        let Some(identity) = identity else {
            debug!(identity_id = %id, "refresh token subject does not exist");
            return Err(AuthError::InvalidRefreshToken);
        };

        if identity.current_refresh_token.as_deref() != Some(presented) {
            counter!(SESSION_REUSE_DETECTED).increment(1);
            warn!(
                identity_id = %id,
                has_session = identity.current_refresh_token.is_some(),
                "stale or replayed refresh token presented"
            );
            return Err(AuthError::RefreshTokenReused);
        }

        let pair = self.issue_pair(id)?;
        let swapped = self
            .store
            .conditional_update_refresh_token(id, presented, &pair.refresh_token)
            .await
            .map_err(AuthError::from_store)?;
        if !swapped {
            counter!(SESSION_REUSE_DETECTED).increment(1);
            warn!(identity_id = %id, "refresh token rotated concurrently; rejecting");
            return Err(AuthError::RefreshTokenReused);
        }

        counter!(SESSION_ROTATED).increment(1);
        info!(identity_id = %id, "session rotated");
        Ok(pair)
    }

    /// Clear the stored refresh token. Revoking an already revoked session is a no-op.
    #[instrument(skip_all, fields(identity_id = %id))]
    pub async fn revoke_session(&self, id: IdentityId) -> Result<(), AuthError> {
        self.store
            .clear_refresh_token(id)
            .await
            .map_err(AuthError::from_store)?;
        counter!(SESSION_REVOKED).increment(1);
        info!("session revoked");
        Ok(())
    }
}
