//! Configuration file, environment overrides, and constants for the Ping World API.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://ping-world-api-prod-150424932423.europe-west1.run.app";

/// Default timeout for a single request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "auth_token";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Storage key of the cached user profile.
pub const USER_DATA_KEY: &str = "user_data";

/// Storage key of the last push token uploaded to the backend.
pub const FCM_TOKEN_KEY: &str = "fcm_token";

/// Prefix shared by every API route.
pub const API_PREFIX: &str = "/api/v1";

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const SIGNUP_PATH: &str = "/api/v1/auth/signup";
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";
pub const LOGOUT_PATH: &str = "/api/v1/auth/logout";

/// Default page size of the leaderboard.
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 20;

/// Default page size of received pings.
pub const DEFAULT_PINGS_PAGE_SIZE: u32 = 10;

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Where credentials are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
    Keyring,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Memory => write!(f, "memory"),
            Self::Keyring => write!(f, "keyring"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            "keyring" => Ok(Self::Keyring),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

impl StorageConfig {
    /// Storage path with a leading `~/` expanded to the home directory.
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.path)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}
fn default_user_agent() -> String {
    format!("pingworld-client/{}", env!("CARGO_PKG_VERSION"))
}
fn default_storage_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("pingworld").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("pingworld-session.json"))
}
fn default_log_level() -> String {
    "info".to_string()
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply `PINGWORLD_*`
    /// environment overrides. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::storage_io(parent, e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| Error::storage_io(path, e.to_string()))?;
        Ok(())
    }

    /// Reject values the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        let base = self.api.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api.base_url must start with http:// or https:// (got '{}')",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::Config("api.timeout_secs must be greater than zero".into()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        macro_rules! env_str {
            ($env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                }
            };
        }
        macro_rules! env_bool {
            ($env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                }
            };
        }
        macro_rules! env_parse {
            ($env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    match val.parse() {
                        Ok(parsed) => $field = parsed,
                        Err(_) => tracing::warn!(var = $env, value = %val, "Ignoring unparsable env override"),
                    }
                }
            };
        }

        env_str!("PINGWORLD_API_BASE_URL", self.api.base_url);
        env_parse!("PINGWORLD_API_TIMEOUT_SECS", self.api.timeout_secs);
        env_parse!("PINGWORLD_API_CONNECT_TIMEOUT_SECS", self.api.connect_timeout_secs);
        env_parse!("PINGWORLD_STORAGE_BACKEND", self.storage.backend);
        if let Ok(val) = std::env::var("PINGWORLD_STORAGE_PATH") {
            self.storage.path = PathBuf::from(val);
        }
        env_str!("PINGWORLD_LOG_LEVEL", self.logging.level);
        env_bool!("PINGWORLD_LOG_JSON", self.logging.json);
    }
}
