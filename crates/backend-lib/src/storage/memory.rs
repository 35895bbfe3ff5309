//! In-memory identity store.
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use identity_common::IdentityId;
use parking_lot::Mutex;
use std::sync::Arc;

use super::{CredentialSelector, Identity, IdentityStore, ProfileUpdate, StoreError};

/// `DashMap`-backed store. Refresh-token writes run under the entry's shard
/// lock, so the compare-and-set is atomic per identity.
#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    identities: Arc<DashMap<IdentityId, Identity>>,
    usernames: Arc<DashMap<String, IdentityId>>,
    emails: Arc<DashMap<String, IdentityId>>,
    /// Serializes changes to the unique selector indexes
    index_lock: Arc<Mutex<()>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    fn lookup(&self, selector: &CredentialSelector) -> Option<IdentityId> {
        match selector {
            CredentialSelector::Username(name) => {
                self.usernames.get(&name.to_lowercase()).map(|id| *id)
            },
            CredentialSelector::Email(email) => self.emails.get(&email.to_lowercase()).map(|id| *id),
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn insert(&self, identity: Identity) -> Result<(), StoreError> {
        let _guard = self.index_lock.lock();

        if self.usernames.contains_key(&identity.username) {
            return Err(StoreError::Duplicate("username".to_string()));
        }
        if self.emails.contains_key(&identity.email) {
            return Err(StoreError::Duplicate("email".to_string()));
        }

        self.usernames.insert(identity.username.clone(), identity.id);
        self.emails.insert(identity.email.clone(), identity.id);
        self.identities.insert(identity.id, identity);
        Ok(())
    }

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        Ok(self.identities.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_credential_selector(
        &self,
        selector: &CredentialSelector,
    ) -> Result<Option<Identity>, StoreError> {
        let Some(id) = self.lookup(selector) else {
            return Ok(None);
        };
        Ok(self.identities.get(&id).map(|entry| entry.value().clone()))
    }

    async fn set_refresh_token(&self, id: IdentityId, token: &str) -> Result<bool, StoreError> {
        match self.identities.get_mut(&id) {
            Some(mut entry) => {
                entry.current_refresh_token = Some(token.to_string());
                entry.updated_at = Utc::now();
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn conditional_update_refresh_token(
        &self,
        id: IdentityId,
        expected_old: &str,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        let Some(mut entry) = self.identities.get_mut(&id) else {
            return Ok(false);
        };
        if entry.current_refresh_token.as_deref() != Some(expected_old) {
            return Ok(false);
        }
        entry.current_refresh_token = Some(new_value.to_string());
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn clear_refresh_token(&self, id: IdentityId) -> Result<(), StoreError> {
        if let Some(mut entry) = self.identities.get_mut(&id) {
            if entry.current_refresh_token.take().is_some() {
                entry.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: IdentityId,
        update: ProfileUpdate,
    ) -> Result<Option<Identity>, StoreError> {
        let _guard = self.index_lock.lock();

        let new_email = update.email.as_ref().map(|email| email.to_lowercase());
        if let Some(email) = &new_email {
            if let Some(owner) = self.emails.get(email) {
                if *owner != id {
                    return Err(StoreError::Duplicate("email".to_string()));
                }
            }
        }

        let Some(mut entry) = self.identities.get_mut(&id) else {
            return Ok(None);
        };
        let old_email = entry.email.clone();
        entry.apply(update);
        let updated = entry.value().clone();
        drop(entry);

        if let Some(email) = new_email {
            if email != old_email {
                self.emails.remove(&old_email);
                self.emails.insert(email, id);
            }
        }
        Ok(Some(updated))
    }

    async fn update_password_verifier(&self, id: IdentityId, verifier: &str) -> Result<bool, StoreError> {
        match self.identities.get_mut(&id) {
            Some(mut entry) => {
                entry.password_verifier = verifier.to_string();
                entry.updated_at = Utc::now();
                Ok(true)
            },
            None => Ok(false),
        }
    }
}
