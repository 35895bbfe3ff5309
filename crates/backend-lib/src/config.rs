// ============================
// identity-backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use figment::{Figment, providers::{Env, Format, Json, Serialized, Toml, Yaml}};
use thiserror::Error;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Upper bound for token lifetimes (one year)
const MAX_TOKEN_TTL_SECS: u64 = 60 * 60 * 24 * 365;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub tokens: TokenSettings,
    pub storage: StorageSettings,
    pub media: MediaSettings,
    pub cookies: CookieSettings,
    pub password: PasswordSettings,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Secrets and lifetimes of the two token kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    pub access_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_secret: String,
    pub refresh_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Root directory of the flat-file identity store
    pub path: PathBuf,
    /// Upper bound on every identity store call
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    pub path: PathBuf,
    /// Prefix of the URLs handed out for uploaded media
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieSettings {
    /// Mark session cookies `Secure`. Only disable for plain-HTTP development.
    pub secure: bool,
}

/// Password complexity requirements and hashing cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordSettings {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
    /// scrypt cost parameter (log2 of N)
    pub scrypt_log_n: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            tokens: TokenSettings::default(),
            storage: StorageSettings::default(),
            media: MediaSettings::default(),
            cookies: CookieSettings { secure: true },
            password: PasswordSettings::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for TokenSettings {
    // Secrets are intentionally blank so a deployment cannot start without them.
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            access_ttl_secs: 60 * 60, // 1 hour
            refresh_secret: String::new(),
            refresh_ttl_secs: 60 * 60 * 24 * 10, // 10 days
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data"),
            timeout_ms: 5_000,
        }
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/media"),
            base_url: "/media".to_string(),
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            min_length: 10,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            scrypt_log_n: 15,
        }
    }
}

impl TokenSettings {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

impl StorageSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    /// Load settings from `config.{toml,yaml,json}` in the working directory and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(
            Self::base()
                .merge(Toml::file("config.toml"))
                .merge(Yaml::file("config.yaml"))
                .merge(Json::file("config.json")),
        )
    }

    /// Load settings from an explicit TOML file, still honouring the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Invalid(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Self::extract(Self::base().merge(Toml::file(path)))
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let settings: Settings = figment
            .merge(Env::prefixed("IDENTITY_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tokens = &self.tokens;
        if tokens.access_secret.is_empty() || tokens.refresh_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "tokens.access_secret and tokens.refresh_secret must be set".to_string(),
            ));
        }
        if tokens.access_secret == tokens.refresh_secret {
            return Err(ConfigError::Invalid(
                "access and refresh tokens must use different secrets".to_string(),
            ));
        }
        if tokens.access_ttl_secs == 0 || tokens.refresh_ttl_secs == 0 {
            return Err(ConfigError::Invalid("token lifetimes must be non-zero".to_string()));
        }
        if tokens.refresh_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "token lifetimes must not exceed {MAX_TOKEN_TTL_SECS} seconds"
            )));
        }
        if tokens.access_ttl_secs >= tokens.refresh_ttl_secs {
            return Err(ConfigError::Invalid(
                "access token lifetime must be shorter than refresh token lifetime".to_string(),
            ));
        }
        if self.storage.timeout_ms == 0 {
            return Err(ConfigError::Invalid("storage.timeout_ms must be non-zero".to_string()));
        }
        if self.password.min_length < 8 {
            return Err(ConfigError::Invalid(
                "password.min_length must be at least 8".to_string(),
            ));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }
        if self.log_format != "pretty" && self.log_format != "json" {
            return Err(ConfigError::Invalid(format!(
                "unknown log format '{}'",
                self.log_format
            )));
        }
        Ok(())
    }

    /// Socket address the HTTP server binds to
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid bind address: {e}")))
    }
}
