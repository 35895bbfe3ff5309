// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for account operations.
//!
//! Every operation receives an explicit input struct that is checked here
//! before any store access happens.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::auth::{validate_password_strength, PasswordRequirements};

// Common validation constants
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MAX_FULL_NAME_LENGTH: usize = 100;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

// Regex patterns for validation
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.]+$").expect("username regex"));
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex")
});
static FULL_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^<>/\\{}\[\];]*$").expect("full name regex"));

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid full name: {0}")]
    InvalidFullName(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("{0} file is required")]
    MissingFile(&'static str),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trim a required field, rejecting blanks
pub fn require<'a>(field: &'static str, value: &'a str) -> ValidationResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed)
}

/// Validate a username and return its canonical (lowercase) form
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = require("username", username)?.to_lowercase();

    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }

    if !USERNAME_REGEX.is_match(&username) {
        return Err(ValidationError::InvalidUsername(
            "Username may only contain letters, digits, '_' and '.'".to_string(),
        ));
    }

    Ok(username)
}

/// Validate an email address and return its canonical (lowercase) form
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = require("email", email)?;

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email address cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Invalid email address format".to_string(),
        ));
    }

    Ok(email.to_lowercase())
}

pub fn validate_full_name(full_name: &str) -> ValidationResult<String> {
    let full_name = require("fullName", full_name)?;

    if full_name.chars().count() > MAX_FULL_NAME_LENGTH {
        return Err(ValidationError::InvalidFullName(format!(
            "Full name cannot exceed {MAX_FULL_NAME_LENGTH} characters"
        )));
    }

    if !FULL_NAME_REGEX.is_match(full_name) {
        return Err(ValidationError::InvalidFullName(
            "Full name contains invalid characters".to_string(),
        ));
    }

    Ok(full_name.to_string())
}

/// Validate a new password against the configured requirements
pub fn validate_new_password(password: &str, requirements: &PasswordRequirements) -> ValidationResult<()> {
    if password.trim().is_empty() {
        return Err(ValidationError::MissingField("password"));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    if !validate_password_strength(password, requirements) {
        return Err(ValidationError::InvalidPassword(requirements.describe()));
    }

    Ok(())
}
