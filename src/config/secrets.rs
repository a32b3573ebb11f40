// Fallback storage for the API key
//
// The key normally comes from the environment (or `.env`). When it is absent,
// ~/.parent-finder/secrets.toml is consulted:
//
//     api_key = "gsk_..."

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Secrets stored in ~/.parent-finder/secrets.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// API key for the configured provider
    #[serde(default)]
    pub api_key: Option<String>,
}

impl SecretsConfig {
    /// Get the secrets file path (~/.parent-finder/secrets.toml)
    pub fn get_secrets_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".parent-finder").join("secrets.toml"))
    }

    /// Load secrets from the default location.
    /// A missing home directory or file yields empty secrets.
    pub fn load() -> Result<Self> {
        match Self::get_secrets_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load secrets from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read secrets file '{}': {}", path.display(), e))?;

        let config: SecretsConfig = toml::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse secrets file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// The API key, if one is set and not blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}
