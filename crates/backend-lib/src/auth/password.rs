// ============================
// identity-backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng}, Params, Scrypt};
use zeroize::Zeroize;

use crate::config::PasswordSettings;

/// Opaque hash/verify capability used by the account flows
pub trait PasswordScheme: Send + Sync {
    fn hash(&self, plain: &str) -> anyhow::Result<String>;
    fn verify(&self, hash: &str, plain: &str) -> bool;
}

/// scrypt in PHC string format
pub struct ScryptScheme {
    params: Params,
}

impl ScryptScheme {
    /// `log_n` is the scrypt cost parameter; verification reads cost from the stored hash
    pub fn new(log_n: u8) -> anyhow::Result<Self> {
        let params = Params::new(log_n, Params::RECOMMENDED_R, Params::RECOMMENDED_P, Params::RECOMMENDED_LEN)
            .map_err(|e| anyhow::anyhow!("invalid scrypt parameters: {e}"))?;
        Ok(Self { params })
    }
}

impl Default for ScryptScheme {
    fn default() -> Self {
        Self {
            params: Params::recommended(),
        }
    }
}

impl PasswordScheme for ScryptScheme {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Scrypt
            .hash_password_customized(plain.as_bytes(), None, None, self.params, &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, hash: &str, plain: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
    }
}

/// Password complexity requirements
#[derive(Debug, Clone)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self::from(&PasswordSettings::default())
    }
}

impl From<&PasswordSettings> for PasswordRequirements {
    fn from(settings: &PasswordSettings) -> Self {
        Self {
            min_length: settings.min_length,
            require_uppercase: settings.require_uppercase,
            require_lowercase: settings.require_lowercase,
            require_digit: settings.require_digit,
            require_special: settings.require_special,
        }
    }
}

impl PasswordRequirements {
    /// Human-readable summary used in validation errors
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("at least {} characters", self.min_length)];
        if self.require_uppercase {
            parts.push("an uppercase letter".to_string());
        }
        if self.require_lowercase {
            parts.push("a lowercase letter".to_string());
        }
        if self.require_digit {
            parts.push("a digit".to_string());
        }
        if self.require_special {
            parts.push("a special character".to_string());
        }
        format!("Password must contain {}", parts.join(", "))
    }
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    if password.chars().count() < requirements.min_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}

/// Hash a password and zeroize the plaintext
pub fn hash_password_secure(scheme: &dyn PasswordScheme, plain: &mut String) -> anyhow::Result<String> {
    let hash = scheme.hash(plain);
    plain.zeroize();
    hash
}
