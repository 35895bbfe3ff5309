// ============================
// identity-backend-lib/src/auth/mod.rs
// ============================
//! Authentication: token codec, session lifecycle, request gate and account flows.

mod error;
pub mod gate;
pub mod password;
pub mod session;
pub mod token;
mod service;
mod service_impl;

pub use error::AuthError;
pub use gate::AuthGate;
pub use password::{hash_password_secure, validate_password_strength, PasswordRequirements, PasswordScheme, ScryptScheme};
pub use session::SessionManager;
pub use token::{TokenCodec, TokenError, TokenKind};
pub use service::{AuthService, LoginOutcome, RegisterInput};
pub use service_impl::DefaultAuth;
