// ============================
// identity-backend-lib/src/profile.rs
// ============================
//! Profile maintenance for an authenticated identity.
use identity_common::{IdentityId, PublicIdentity, UpdateAccountRequest};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::media::{BlobStore, LocalUpload, StoredMedia};
use crate::storage::{IdentityStore, ProfileUpdate, StoreError};
use crate::validation;

/// Which image slot an upload replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageSlot {
    Avatar,
    CoverImage,
}

pub struct ProfileService<S> {
    store: Arc<S>,
    blobs: Arc<dyn BlobStore>,
}

impl<S> Clone for ProfileService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            blobs: self.blobs.clone(),
        }
    }
}

impl<S: IdentityStore> ProfileService<S> {
    pub fn new(store: Arc<S>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    pub async fn update_account_details(
        &self,
        id: IdentityId,
        input: UpdateAccountRequest,
    ) -> Result<PublicIdentity, AppError> {
        let full_name = validation::validate_full_name(&input.full_name)?;
        let email = validation::validate_email(&input.email)?;

        let update = ProfileUpdate {
            full_name: Some(full_name),
            email: Some(email),
            ..Default::default()
        };
        let updated = match self.store.update_profile(id, update).await {
            Ok(updated) => updated,
            Err(StoreError::Duplicate(_)) => {
                return Err(AppError::Conflict("Email is already in use".to_string()))
            },
            Err(err) => return Err(err.into()),
        };
        let identity = updated.ok_or_else(|| AppError::NotFound(format!("identity {id}")))?;

        info!(identity_id = %id, "account details updated");
        Ok(identity.to_public())
    }

    pub async fn update_avatar(&self, id: IdentityId, upload: LocalUpload) -> Result<PublicIdentity, AppError> {
        self.replace_image(id, upload, ImageSlot::Avatar).await
    }

    pub async fn update_cover_image(
        &self,
        id: IdentityId,
        upload: LocalUpload,
    ) -> Result<PublicIdentity, AppError> {
        self.replace_image(id, upload, ImageSlot::CoverImage).await
    }

    async fn replace_image(
        &self,
        id: IdentityId,
        upload: LocalUpload,
        slot: ImageSlot,
    ) -> Result<PublicIdentity, AppError> {
        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("identity {id}")))?;

        let media = self.blobs.upload(&upload).await?;

        let previous = match slot {
            ImageSlot::Avatar => Some(current.avatar),
            ImageSlot::CoverImage => current.cover_image,
        };
        let update = match slot {
            ImageSlot::Avatar => ProfileUpdate {
                avatar: Some(media.clone()),
                ..Default::default()
            },
            ImageSlot::CoverImage => ProfileUpdate {
                cover_image: Some(media.clone()),
                ..Default::default()
            },
        };

        // The record must never point at deleted media: persist first, clean up after.
        let persisted = match self.store.update_profile(id, update).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                self.destroy_quietly(&media).await;
                return Err(AppError::NotFound(format!("identity {id}")));
            },
            Err(err) => {
                self.destroy_quietly(&media).await;
                return Err(err.into());
            },
        };
        if let Some(previous) = previous {
            self.destroy_quietly(&previous).await;
        }

        info!(identity_id = %id, ?slot, "profile image replaced");
        Ok(persisted.to_public())
    }

    async fn destroy_quietly(&self, media: &StoredMedia) {
        if let Err(err) = self.blobs.destroy(&media.public_id).await {
            warn!(public_id = %media.public_id, error = %err, "failed to delete media");
        }
    }
}
