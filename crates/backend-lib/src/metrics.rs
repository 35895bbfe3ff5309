// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_ROTATED: &str = "session.rotated";
pub const SESSION_REUSE_DETECTED: &str = "session.reuse_detected";
pub const SESSION_REVOKED: &str = "session.revoked";
pub const GATE_REJECTED: &str = "gate.rejected";
pub const LOGIN_FAILED: &str = "login.failed";
