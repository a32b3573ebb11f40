//! Runtime configuration
//!
//! `AppConfig` is assembled once at startup from the process environment
//! (after `.env` has been loaded), with the API key falling back to the
//! secrets file. It is then handed to the components that need it; nothing
//! reads the environment after startup.

mod providers;
mod secrets;

pub use providers::{
    default_provider_preset, get_provider_preset, ProviderPreset, DEFAULT_PROVIDER_ID, PROVIDERS,
};
pub use secrets::SecretsConfig;

use crate::batch::RowFailurePolicy;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable names
pub mod env_keys {
    pub const API_KEY: &str = "PARENT_FINDER_API_KEY";
    pub const PROVIDER: &str = "PARENT_FINDER_PROVIDER";
    pub const BASE_URL: &str = "PARENT_FINDER_BASE_URL";
    pub const MODEL: &str = "PARENT_FINDER_MODEL";
    pub const UPLOAD_DIR: &str = "PARENT_FINDER_UPLOAD_DIR";
    pub const OUTPUT_DIR: &str = "PARENT_FINDER_OUTPUT_DIR";
    pub const MAX_UPLOAD_MB: &str = "PARENT_FINDER_MAX_UPLOAD_MB";
    pub const REQUEST_DELAY_MS: &str = "PARENT_FINDER_REQUEST_DELAY_MS";
    pub const ABORT_ON_ROW_ERROR: &str = "PARENT_FINDER_ABORT_ON_ROW_ERROR";
    pub const REQUEST_TIMEOUT_SECS: &str = "PARENT_FINDER_REQUEST_TIMEOUT_SECS";
}

pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 16;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 500;

/// Errors raised while assembling the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Application configuration shared by the server and the CLI
#[derive(Clone)]
pub struct AppConfig {
    /// Provider preset ID
    pub provider_id: String,
    /// Base URL of the chat-completions API
    pub base_url: String,
    /// Model identifier sent with every completion request
    pub model: String,
    /// API key; `None` disables lookups for the whole process lifetime
    pub api_key: Option<String>,
    /// Directory holding uploaded spreadsheets
    pub upload_dir: PathBuf,
    /// Directory holding processed spreadsheets
    pub output_dir: PathBuf,
    /// Upload size cap in bytes
    pub max_upload_bytes: u64,
    /// Pause between consecutive upstream calls in a batch
    pub request_delay: Duration,
    /// What a batch does when a single row lookup fails
    pub row_failure_policy: RowFailurePolicy,
    /// Optional transport timeout for upstream calls
    pub request_timeout: Option<Duration>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider_id", &self.provider_id)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("request_delay", &self.request_delay)
            .field("row_failure_policy", &self.row_failure_policy)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let preset = default_provider_preset();
        Self {
            provider_id: preset.id.to_string(),
            base_url: preset.base_url.to_string(),
            model: preset.default_model.to_string(),
            api_key: None,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            row_failure_policy: RowFailurePolicy::default(),
            request_timeout: None,
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// Call `load_dotenv()` first if `.env` support is wanted.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secrets = match SecretsConfig::load() {
            Ok(secrets) => secrets,
            Err(e) => {
                log::warn!("Ignoring unreadable secrets file: {}", e);
                SecretsConfig::default()
            }
        };
        Self::from_lookup(|key| std::env::var(key).ok(), &secrets)
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F, secrets: &SecretsConfig) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let preset = match get(env_keys::PROVIDER) {
            Some(id) => get_provider_preset(&id).ok_or(ConfigError::UnknownProvider(id))?,
            None => default_provider_preset(),
        };

        let api_key = get(env_keys::API_KEY)
            .or_else(|| get(preset.api_key_env))
            .or_else(|| secrets.api_key().map(str::to_string));

        let defaults = Self::default();

        let max_upload_bytes = match get(env_keys::MAX_UPLOAD_MB) {
            Some(v) => parse_u64(env_keys::MAX_UPLOAD_MB, &v)? * 1024 * 1024,
            None => defaults.max_upload_bytes,
        };

        let request_delay = match get(env_keys::REQUEST_DELAY_MS) {
            Some(v) => Duration::from_millis(parse_u64(env_keys::REQUEST_DELAY_MS, &v)?),
            None => defaults.request_delay,
        };

        let row_failure_policy = match get(env_keys::ABORT_ON_ROW_ERROR) {
            Some(v) if parse_bool(env_keys::ABORT_ON_ROW_ERROR, &v)? => RowFailurePolicy::Abort,
            _ => RowFailurePolicy::Record,
        };

        let request_timeout = get(env_keys::REQUEST_TIMEOUT_SECS)
            .map(|v| parse_u64(env_keys::REQUEST_TIMEOUT_SECS, &v))
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            provider_id: preset.id.to_string(),
            base_url: get(env_keys::BASE_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| preset.base_url.to_string()),
            model: get(env_keys::MODEL).unwrap_or_else(|| preset.default_model.to_string()),
            api_key,
            upload_dir: get(env_keys::UPLOAD_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: get(env_keys::OUTPUT_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_upload_bytes,
            request_delay,
            row_failure_policy,
            request_timeout,
        })
    }

    /// Whether an API key is available
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// What happened to the `.env` file at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotenvStatus {
    Loaded(PathBuf),
    NotFound,
    Failed(String),
}

impl DotenvStatus {
    fn from_result(result: Result<PathBuf, dotenvy::Error>) -> Self {
        match result {
            Ok(path) => Self::Loaded(path),
            Err(e) if e.not_found() => Self::NotFound,
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    /// Report the status; call once the logger is running
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => log::debug!("Loaded environment from {}", path.display()),
            Self::NotFound => log::debug!("No .env file found"),
            Self::Failed(e) => log::warn!("Failed to load .env file: {}", e),
        }
    }
}

/// Load `.env` from the working directory without overriding set variables
pub fn load_dotenv() -> DotenvStatus {
    DotenvStatus::from_result(dotenvy::dotenv())
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
