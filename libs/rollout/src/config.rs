//! Deployment configuration and platform connection settings.
//!
//! The deployment config is a small TOML file:
//!
//! ```toml
//! name = "storefront"
//!
//! [hooks]
//! before_pre = "./scripts/warmup.sh"
//! after_swap = "curl -fsS https://storefront.example.com/health"
//! ```
//!
//! Lookup order: explicit path, `./bluegreen.toml`, then the per-user
//! config directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hooks::HookMap;

/// Config file name.
pub const CONFIG_FILE: &str = "bluegreen.toml";

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only configuration for one rollout run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Base application name; the environments are `{name}-blue` and `{name}-green`.
    pub name: String,

    #[serde(default)]
    pub hooks: HookMap,
}

impl DeploymentConfig {
    pub fn new(name: impl Into<String>, hooks: HookMap) -> Result<Self, ConfigError> {
        let config = Self {
            name: name.into(),
            hooks,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from TOML text.
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents, path)
    }

    /// Load the config from an explicit path or the first default location that exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidates = default_locations();
        match candidates.iter().find(|path| path.exists()) {
            Some(path) => Self::load(path),
            None => Err(ConfigError::NotFound(candidates)),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        Ok(())
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dirs) = ProjectDirs::from("io", "bluegreen", "bluegreen") {
        paths.push(dirs.config_dir().join(CONFIG_FILE));
    }
    paths
}

/// Where and how to reach the platform API.
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    /// Host, with or without scheme (`platform.example.com` or `https://...`).
    pub host: String,
    pub token: String,
    pub timeout: Duration,
}

impl PlatformSettings {
    pub fn new(host: Option<String>, token: Option<String>) -> Result<Self, ConfigError> {
        let host = host
            .filter(|h| !h.trim().is_empty())
            .ok_or(ConfigError::MissingHost)?;
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        Ok(Self {
            host,
            token,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL with scheme and without a trailing slash.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        }
    }
}
