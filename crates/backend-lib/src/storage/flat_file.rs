//! Flat-file identity store: one JSON document per identity.
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use identity_common::IdentityId;
use std::{fs, path::{Path, PathBuf}, sync::Arc};
use tokio::{fs as tokio_fs, sync::Mutex};
use tracing::debug;

use super::{CredentialSelector, Identity, IdentityStore, ProfileUpdate, StoreError};

/// Flat-file implementation of the `IdentityStore` trait
///
/// Every read-modify-write of a record runs under that identity's async mutex,
/// which makes the refresh-token compare-and-set atomic within this process.
#[derive(Clone)]
pub struct FlatFileIdentityStore {
    root: PathBuf,
    locks: Arc<DashMap<IdentityId, Arc<Mutex<()>>>>,
    /// Serializes inserts and email changes so unique selectors stay unique
    index_lock: Arc<Mutex<()>>,
}

impl FlatFileIdentityStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().join("identities");
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Arc::new(DashMap::new()),
            index_lock: Arc::new(Mutex::new(())),
        })
    }

    fn path(&self, id: IdentityId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn lock_for(&self, id: IdentityId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    async fn read(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        let path = self.path(id);
        if !tokio_fs::try_exists(&path).await? {
            return Ok(None);
        }
        let content = tokio_fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write through a temp file so readers never observe a half-written record
    async fn write(&self, identity: &Identity) -> Result<(), StoreError> {
        let path = self.path(identity.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(identity)?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn scan(&self, selector: &CredentialSelector) -> Result<Option<Identity>, StoreError> {
        let mut entries = tokio_fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let content = tokio_fs::read_to_string(&path).await?;
            let identity: Identity = serde_json::from_str(&content)?;
            if identity.matches(selector) {
                return Ok(Some(identity));
            }
        }
        Ok(None)
    }

    /// Read-modify-write a record under its lock. `None` if the identity is missing.
    async fn modify<F>(&self, id: IdentityId, f: F) -> Result<Option<Identity>, StoreError>
    where
        F: FnOnce(&mut Identity) -> bool + Send,
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(mut identity) = self.read(id).await? else {
            return Ok(None);
        };
        if f(&mut identity) {
            identity.updated_at = Utc::now();
            self.write(&identity).await?;
        }
        Ok(Some(identity))
    }
}

#[async_trait]
impl IdentityStore for FlatFileIdentityStore {
    async fn insert(&self, identity: Identity) -> Result<(), StoreError> {
        let _index = self.index_lock.lock().await;

        let by_name = CredentialSelector::Username(identity.username.clone());
        if self.scan(&by_name).await?.is_some() {
            return Err(StoreError::Duplicate("username".to_string()));
        }
        let by_email = CredentialSelector::Email(identity.email.clone());
        if self.scan(&by_email).await?.is_some() {
            return Err(StoreError::Duplicate("email".to_string()));
        }

        self.write(&identity).await?;
        debug!(identity_id = %identity.id, "identity stored");
        Ok(())
    }

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        self.read(id).await
    }

    async fn find_by_credential_selector(
        &self,
        selector: &CredentialSelector,
    ) -> Result<Option<Identity>, StoreError> {
        self.scan(selector).await
    }

    async fn set_refresh_token(&self, id: IdentityId, token: &str) -> Result<bool, StoreError> {
        let updated = self
            .modify(id, |identity| {
                identity.current_refresh_token = Some(token.to_string());
                true
            })
            .await?;
        Ok(updated.is_some())
    }

    async fn conditional_update_refresh_token(
        &self,
        id: IdentityId,
        expected_old: &str,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        let mut swapped = false;
        self.modify(id, |identity| {
            if identity.current_refresh_token.as_deref() == Some(expected_old) {
                identity.current_refresh_token = Some(new_value.to_string());
                swapped = true;
            }
            swapped
        })
        .await?;
        Ok(swapped)
    }

    async fn clear_refresh_token(&self, id: IdentityId) -> Result<(), StoreError> {
        self.modify(id, |identity| identity.current_refresh_token.take().is_some())
            .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: IdentityId,
        update: ProfileUpdate,
    ) -> Result<Option<Identity>, StoreError> {
        let _index = self.index_lock.lock().await;

        if let Some(email) = &update.email {
            if let Some(owner) = self.scan(&CredentialSelector::Email(email.clone())).await? {
                if owner.id != id {
                    return Err(StoreError::Duplicate("email".to_string()));
                }
            }
        }

        self.modify(id, |identity| {
            identity.apply(update);
            true
        })
        .await
    }

    async fn update_password_verifier(&self, id: IdentityId, verifier: &str) -> Result<bool, StoreError> {
        let updated = self
            .modify(id, |identity| {
                identity.password_verifier = verifier.to_string();
                true
            })
            .await?;
        Ok(updated.is_some())
    }
}
