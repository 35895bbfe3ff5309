// ============================
// identity-backend-lib/src/storage/mod.rs
// ============================
//! Identity store abstraction with in-memory and flat-file implementations.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use identity_common::{IdentityId, PublicIdentity};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::media::StoredMedia;

mod flat_file;
mod memory;

pub use flat_file::FlatFileIdentityStore;
pub use memory::MemoryIdentityStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Timeout or connection failure; fatal for the current request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A unique credential selector is already taken
    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable identity record
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: IdentityId,
    /// Unique, stored lowercase
    pub username: String,
    /// Unique, stored lowercase
    pub email: String,
    pub full_name: String,
    pub avatar: StoredMedia,
    #[serde(default)]
    pub cover_image: Option<StoredMedia>,
    /// Opaque to the session core
    pub password_verifier: String,
    /// The single outstanding refresh token, if any
    #[serde(default)]
    pub current_refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Projection without the password verifier and refresh token
    pub fn to_public(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.url.clone(),
            cover_image: self
                .cover_image
                .as_ref()
                .map(|media| media.url.clone())
                .unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn matches(&self, selector: &CredentialSelector) -> bool {
        match selector {
            CredentialSelector::Username(name) => self.username == name.to_lowercase(),
            CredentialSelector::Email(email) => self.email == email.to_lowercase(),
        }
    }

    fn apply(&mut self, update: ProfileUpdate) {
        if let Some(full_name) = update.full_name {
            self.full_name = full_name;
        }
        if let Some(email) = update.email {
            self.email = email.to_lowercase();
        }
        if let Some(avatar) = update.avatar {
            self.avatar = avatar;
        }
        if let Some(cover_image) = update.cover_image {
            self.cover_image = Some(cover_image);
        }
        self.updated_at = Utc::now();
    }
}

/// Unique field an identity can be looked up by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSelector {
    Username(String),
    Email(String),
}

/// Profile fields to overwrite; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<StoredMedia>,
    pub cover_image: Option<StoredMedia>,
}

/// Trait for identity store backends
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Persist a new identity; fails with `Duplicate` if username or email is taken
    async fn insert(&self, identity: Identity) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError>;

    async fn find_by_credential_selector(
        &self,
        selector: &CredentialSelector,
    ) -> Result<Option<Identity>, StoreError>;

    /// Unconditionally overwrite the stored refresh token. Returns false if the identity is missing.
    async fn set_refresh_token(&self, id: IdentityId, token: &str) -> Result<bool, StoreError>;

    /// Replace the stored refresh token only if it still equals `expected_old`.
    /// Atomic per identity; returns false when the stored value did not match.
    async fn conditional_update_refresh_token(
        &self,
        id: IdentityId,
        expected_old: &str,
        new_value: &str,
    ) -> Result<bool, StoreError>;

    /// Clear the stored refresh token. Idempotent.
    async fn clear_refresh_token(&self, id: IdentityId) -> Result<(), StoreError>;

    /// Apply a profile update and return the updated record, or `None` if the identity is missing
    async fn update_profile(
        &self,
        id: IdentityId,
        update: ProfileUpdate,
    ) -> Result<Option<Identity>, StoreError>;

    /// Returns false if the identity is missing
    async fn update_password_verifier(&self, id: IdentityId, verifier: &str) -> Result<bool, StoreError>;
}

/// Decorator bounding every call of the wrapped store by a timeout
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(op, timeout_ms, "identity store call timed out");
                Err(StoreError::Unavailable(format!(
                    "{op} timed out after {timeout_ms}ms"
                )))
            },
        }
    }
}

#[async_trait]
impl<S: IdentityStore> IdentityStore for TimeoutStore<S> {
    async fn insert(&self, identity: Identity) -> Result<(), StoreError> {
        self.bounded("insert", self.inner.insert(identity)).await
    }

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        self.bounded("find_by_id", self.inner.find_by_id(id)).await
    }

    async fn find_by_credential_selector(
        &self,
        selector: &CredentialSelector,
    ) -> Result<Option<Identity>, StoreError> {
        self.bounded(
            "find_by_credential_selector",
            self.inner.find_by_credential_selector(selector),
        )
        .await
    }

    async fn set_refresh_token(&self, id: IdentityId, token: &str) -> Result<bool, StoreError> {
        self.bounded("set_refresh_token", self.inner.set_refresh_token(id, token))
            .await
    }

    async fn conditional_update_refresh_token(
        &self,
        id: IdentityId,
        expected_old: &str,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        self.bounded(
            "conditional_update_refresh_token",
            self.inner
                .conditional_update_refresh_token(id, expected_old, new_value),
        )
        .await
    }

    async fn clear_refresh_token(&self, id: IdentityId) -> Result<(), StoreError> {
        self.bounded("clear_refresh_token", self.inner.clear_refresh_token(id))
            .await
    }

    async fn update_profile(
        &self,
        id: IdentityId,
        update: ProfileUpdate,
    ) -> Result<Option<Identity>, StoreError> {
        self.bounded("update_profile", self.inner.update_profile(id, update))
            .await
    }

    async fn update_password_verifier(&self, id: IdentityId, verifier: &str) -> Result<bool, StoreError> {
        self.bounded(
            "update_password_verifier",
            self.inner.update_password_verifier(id, verifier),
        )
        .await
    }
}
