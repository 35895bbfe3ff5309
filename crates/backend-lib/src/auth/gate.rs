//! Request-time access token guard.
use identity_common::PublicIdentity;
use metrics::counter;
use std::sync::Arc;
use tracing::debug;

use super::{AuthError, TokenCodec, TokenKind};
use crate::metrics::GATE_REJECTED;
use crate::storage::IdentityStore;

/// Validates access tokens and resolves them to identities.
/// Read-only: never rotates or writes anything.
pub struct AuthGate<S> {
    store: Arc<S>,
    codec: Arc<TokenCodec>,
}

impl<S> Clone for AuthGate<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<S: IdentityStore> AuthGate<S> {
    pub fn new(store: Arc<S>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    pub async fn authenticate(&self, presented: Option<&str>) -> Result<PublicIdentity, AuthError> {
        let Some(token) = presented.map(str::trim).filter(|t| !t.is_empty()) else {
            return Err(AuthError::Unauthenticated);
        };

        let id = match self.codec.verify(TokenKind::Access, token) {
            Ok(id) => id,
            Err(reason) => {
                counter!(GATE_REJECTED).increment(1);
                debug!(%reason, "access token rejected");
                return Err(AuthError::InvalidAccessToken);
            },
        };

        match self.store.find_by_id(id).await.map_err(AuthError::from_store)? {
            Some(identity) => Ok(identity.to_public()),
            None => {
                counter!(GATE_REJECTED).increment(1);
                debug!(identity_id = %id, "access token subject does not exist");
                Err(AuthError::InvalidAccessToken)
            },
        }
    }
}
