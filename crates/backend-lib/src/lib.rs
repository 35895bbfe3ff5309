// ============================
// identity-backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the identity service.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod media;
pub mod metrics;
pub mod profile;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use crate::auth::{
    AuthGate, AuthService, DefaultAuth, PasswordRequirements, PasswordScheme, ScryptScheme,
    SessionManager, TokenCodec,
};
use crate::config::Settings;
use crate::error::AppError;
use crate::media::BlobStore;
use crate::profile::ProfileService;
use crate::storage::IdentityStore;

/// Application state shared across all handlers
pub struct AppState<S> {
    /// Account flows
    pub auth: Arc<dyn AuthService>,
    /// Session manager
    pub sessions: SessionManager<S>,
    /// Access token gate used by the `CurrentIdentity` extractor
    pub gate: AuthGate<S>,
    pub profiles: ProfileService<S>,
    /// Identity store backend
    pub store: Arc<S>,
    /// Settings manager
    pub settings: Arc<Settings>,
}

impl<S: IdentityStore + 'static> AppState<S> {
    /// Create a new application state using the configured scrypt cost
    pub fn new(store: S, blobs: Arc<dyn BlobStore>, settings: Settings) -> Result<Self, AppError> {
        let passwords = ScryptScheme::new(settings.password.scrypt_log_n)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Self::with_password_scheme(store, blobs, settings, Arc::new(passwords))
    }

    /// Create a new application state with an explicit password scheme
    pub fn with_password_scheme(
        store: S,
        blobs: Arc<dyn BlobStore>,
        settings: Settings,
        passwords: Arc<dyn PasswordScheme>,
    ) -> Result<Self, AppError> {
        let codec = TokenCodec::from_settings(&settings.tokens)
            .map_err(|e| AppError::Internal(format!("token codec: {e}")))?;
        let codec = Arc::new(codec);
        let store = Arc::new(store);

        let sessions = SessionManager::new(store.clone(), codec.clone());
        let gate = AuthGate::new(store.clone(), codec);
        let requirements = PasswordRequirements::from(&settings.password);
        let auth = Arc::new(DefaultAuth::new(
            store.clone(),
            sessions.clone(),
            blobs.clone(),
            passwords,
            requirements,
        ));
        let profiles = ProfileService::new(store.clone(), blobs);

        Ok(Self {
            auth,
            sessions,
            gate,
            profiles,
            store,
            settings: Arc::new(settings),
        })
    }
}
