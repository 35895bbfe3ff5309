// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers.
pub mod extract;
pub mod users;

pub use extract::{CurrentIdentity, ACCESS_COOKIE, REFRESH_COOKIE};
