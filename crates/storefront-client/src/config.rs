//! # Client Configuration
//!
//! Configuration for the remote store connection, sessions and local storage.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     STOREFRONT_API_URL=http://localhost:3001                            │
//! │     STOREFRONT_REQUEST_TIMEOUT_MS=10000                                 │
//! │     STOREFRONT_DB_PATH=/tmp/client.db                                   │
//! │     STOREFRONT_TOKEN_SECRET=...                                         │
//! │     STOREFRONT_SESSION_TTL_SECS=86400                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/storefront-client/client.toml (Linux)                     │
//! │     ~/Library/Application Support/com.storefront.client/client.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     http://localhost:3001, 10s timeout, generated token secret          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! base_url = "http://localhost:3001"
//! request_timeout_ms = 10000
//!
//! [session]
//! storage_key = "user"
//! token_secret = "6f1c..."
//! ttl_secs = 86400
//!
//! [storage]
//! database_path = "/var/lib/storefront/client.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

// =============================================================================
// API Settings
// =============================================================================

/// Where the remote resource store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the store; collections hang off it (`/users`, `/carts`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (milliseconds). A call that exceeds it is rolled
    /// back like any other failure.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Session persistence and token settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Key of the persisted Identity record.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// HMAC secret for session tokens.
    /// Auto-generated on first run; must stay stable or restored sessions
    /// are discarded.
    #[serde(default = "generate_secret")]
    pub token_secret: String,

    /// Session lifetime (seconds).
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

fn default_storage_key() -> String {
    "user".to_string()
}

fn generate_secret() -> String {
    Uuid::new_v4().simple().to_string()
}

fn default_ttl() -> u64 {
    86_400
}

/// Longest session lifetime honoured (ten years).
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 86_400;

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            storage_key: default_storage_key(),
            token_secret: generate_secret(),
            ttl_secs: default_ttl(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Local storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file holding the persisted session.
    /// `None` uses the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Client Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (client.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Like `load`, but writes a default file first when none exists so the
    /// generated token secret survives restarts.
    pub fn load_or_init(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigLoadFailed("No config path available".into()))?;

        if !path.exists() {
            info!(?path, "Writing initial client config");
            Self::default().save(Some(path.clone()))?;
        }
        Self::load(Some(path))
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        let url = &self.api.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ClientError::InvalidConfig(format!(
                "API URL must start with http:// or https://, got: {}",
                url
            )));
        }
        url::Url::parse(url)
            .map_err(|e| ClientError::InvalidConfig(format!("API URL is invalid: {e}")))?;

        if self.api.request_timeout_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "request_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.session.token_secret.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "token_secret must not be empty".into(),
            ));
        }

        if self.session.ttl_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "ttl_secs must be greater than 0".into(),
            ));
        }

        if self.session.storage_key.is_empty() {
            return Err(ClientError::InvalidConfig(
                "storage_key must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("STOREFRONT_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Ok(timeout) = std::env::var("STOREFRONT_REQUEST_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.api.request_timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Ignoring unparsable request timeout"),
            }
        }

        if let Ok(path) = std::env::var("STOREFRONT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Ok(secret) = std::env::var("STOREFRONT_TOKEN_SECRET") {
            self.session.token_secret = secret;
        }

        if let Ok(ttl) = std::env::var("STOREFRONT_SESSION_TTL_SECS") {
            if let Ok(secs) = ttl.parse::<u64>() {
                self.session.ttl_secs = secs;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "storefront", "client")
            .map(|dirs| dirs.config_dir().join("client.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms)
    }

    /// Session lifetime, capped at `MAX_SESSION_TTL_SECS`.
    pub fn session_ttl(&self) -> chrono::Duration {
        let secs = self.session.ttl_secs.min(MAX_SESSION_TTL_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    /// Configured database file, or `client.db` in the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "storefront", "client")
                .map(|dirs| dirs.data_dir().join("client.db"))
        })
    }
}
