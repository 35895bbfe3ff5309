use async_trait::async_trait;
use identity_common::{ChangePasswordRequest, IdentityId, LoginRequest, PublicIdentity, TokenPair};

use crate::error::AppError;
use crate::media::LocalUpload;

/// Registration input; files are already staged on local disk
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub avatar: Option<LocalUpload>,
    pub cover_image: Option<LocalUpload>,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicIdentity,
    pub tokens: TokenPair,
}

/// Account flows layered over the session manager
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, input: RegisterInput) -> Result<PublicIdentity, AppError>;
    async fn login(&self, input: LoginRequest) -> Result<LoginOutcome, AppError>;
    async fn refresh(&self, presented: Option<String>) -> Result<TokenPair, AppError>;
    async fn logout(&self, id: IdentityId) -> Result<(), AppError>;
    /// Replace the password and end the current session
    async fn change_password(&self, id: IdentityId, input: ChangePasswordRequest) -> Result<(), AppError>;
}
