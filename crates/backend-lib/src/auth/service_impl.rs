use async_trait::async_trait;
use chrono::Utc;
use identity_common::{ChangePasswordRequest, IdentityId, LoginRequest, PublicIdentity, TokenPair};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, warn};

use super::password::hash_password_secure;
use super::service::{LoginOutcome, RegisterInput};
use super::{AuthError, AuthService, PasswordRequirements, PasswordScheme, SessionManager};
use crate::error::AppError;
use crate::media::{BlobStore, StoredMedia};
use crate::metrics::LOGIN_FAILED;
use crate::storage::{CredentialSelector, Identity, IdentityStore, StoreError};
use crate::validation::{self, ValidationError};

pub struct DefaultAuth<S> {
    store: Arc<S>,
    sessions: SessionManager<S>,
    blobs: Arc<dyn BlobStore>,
    passwords: Arc<dyn PasswordScheme>,
    requirements: PasswordRequirements,
    /// Verified against on unknown selectors so both login failures cost one hash
    decoy_verifier: Option<String>,
}

impl<S: IdentityStore> DefaultAuth<S> {
    pub fn new(
        store: Arc<S>,
        sessions: SessionManager<S>,
        blobs: Arc<dyn BlobStore>,
        passwords: Arc<dyn PasswordScheme>,
        requirements: PasswordRequirements,
    ) -> Self {
        let decoy_verifier = match passwords.hash(&IdentityId::new().to_string()) {
            Ok(hash) => Some(hash),
            Err(err) => {
                warn!(error = %err, "could not prepare decoy password verifier");
                None
            },
        };
        Self {
            store,
            sessions,
            blobs,
            passwords,
            requirements,
            decoy_verifier,
        }
    }

    async fn selector_taken(&self, selector: CredentialSelector) -> Result<bool, AppError> {
        Ok(self
            .store
            .find_by_credential_selector(&selector)
            .await?
            .is_some())
    }

    async fn discard(&self, media: &StoredMedia) {
        if let Err(err) = self.blobs.destroy(&media.public_id).await {
            warn!(public_id = %media.public_id, error = %err, "failed to discard uploaded media");
        }
    }
}

#[async_trait]
impl<S: IdentityStore + 'static> AuthService for DefaultAuth<S> {
    async fn register(&self, input: RegisterInput) -> Result<PublicIdentity, AppError> {
        let RegisterInput {
            full_name,
            email,
            username,
            mut password,
            avatar,
            cover_image,
        } = input;

        let full_name = validation::validate_full_name(&full_name)?;
        let email = validation::validate_email(&email)?;
        let username = validation::validate_username(&username)?;
        validation::validate_new_password(&password, &self.requirements)?;
        let avatar = avatar.ok_or(ValidationError::MissingFile("avatar"))?;

        if self.selector_taken(CredentialSelector::Username(username.clone())).await?
            || self.selector_taken(CredentialSelector::Email(email.clone())).await?
        {
            return Err(AppError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        let password_verifier = hash_password_secure(self.passwords.as_ref(), &mut password)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let avatar = self.blobs.upload(&avatar).await?;
        let cover_image = match cover_image {
            Some(upload) => match self.blobs.upload(&upload).await {
                Ok(media) => Some(media),
                Err(err) => {
                    warn!(error = %err, "cover image upload failed; registering without one");
                    None
                },
            },
            None => None,
        };

        let now = Utc::now();
        let identity = Identity {
            id: IdentityId::new(),
            username,
            email,
            full_name,
            avatar,
            cover_image,
            password_verifier,
            current_refresh_token: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.store.insert(identity.clone()).await {
            self.discard(&identity.avatar).await;
            if let Some(cover) = &identity.cover_image {
                self.discard(cover).await;
            }
            return Err(match err {
                StoreError::Duplicate(_) => AppError::Conflict(
                    "User with email or username already exists".to_string(),
                ),
                other => other.into(),
            });
        }

        info!(identity_id = %identity.id, username = %identity.username, "identity registered");
        Ok(identity.to_public())
    }

    async fn login(&self, input: LoginRequest) -> Result<LoginOutcome, AppError> {
        let selector = match (
            input.username.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            input.email.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        ) {
            (Some(username), _) => CredentialSelector::Username(username.to_string()),
            (None, Some(email)) => CredentialSelector::Email(email.to_string()),
            (None, None) => return Err(ValidationError::MissingField("username or email").into()),
        };
        if input.password.is_empty() {
            return Err(ValidationError::MissingField("password").into());
        }

        let Some(identity) = self.store.find_by_credential_selector(&selector).await? else {
            if let Some(decoy) = &self.decoy_verifier {
                self.passwords.verify(decoy, &input.password);
            }
            counter!(LOGIN_FAILED).increment(1);
            info!(?selector, "login for unknown identity");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !self.passwords.verify(&identity.password_verifier, &input.password) {
            counter!(LOGIN_FAILED).increment(1);
            info!(identity_id = %identity.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.sessions.create_session(identity.id).await?;
        Ok(LoginOutcome {
            user: identity.to_public(),
            tokens,
        })
    }

    async fn refresh(&self, presented: Option<String>) -> Result<TokenPair, AppError> {
        let Some(token) = presented.filter(|t| !t.trim().is_empty()) else {
            return Err(AuthError::Unauthenticated.into());
        };
        Ok(self.sessions.rotate_session(token.trim()).await?)
    }

    async fn logout(&self, id: IdentityId) -> Result<(), AppError> {
        Ok(self.sessions.revoke_session(id).await?)
    }

    async fn change_password(&self, id: IdentityId, input: ChangePasswordRequest) -> Result<(), AppError> {
        let ChangePasswordRequest {
            old_password,
            mut new_password,
        } = input;
        if old_password.is_empty() {
            return Err(ValidationError::MissingField("oldPassword").into());
        }
        validation::validate_new_password(&new_password, &self.requirements)?;

        let identity = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::IdentityNotFound(id.to_string()))?;

        if !self.passwords.verify(&identity.password_verifier, &old_password) {
            return Err(AuthError::IncorrectPassword.into());
        }

        let verifier = hash_password_secure(self.passwords.as_ref(), &mut new_password)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        // Revoke before the verifier is replaced so a failed revoke leaves the old password in force.
        self.sessions.revoke_session(id).await?;
        if !self.store.update_password_verifier(id, &verifier).await? {
            return Err(AuthError::IdentityNotFound(id.to_string()).into());
        }
        info!(identity_id = %id, "password changed; session revoked");
        Ok(())
    }
}
