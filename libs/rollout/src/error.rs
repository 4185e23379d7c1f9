//! Error types for the rollout engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the platform transport and client.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The platform answered with a non-success status.
    #[error("platform returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl PlatformError {
    pub(crate) fn decode(path: &str, message: impl ToString) -> Self {
        Self::Decode {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Errors loading the deployment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found (looked in {0:?})")]
    NotFound(Vec<PathBuf>),

    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config is missing an application name")]
    MissingName,

    #[error("platform host is not set")]
    MissingHost,

    #[error("platform token is not set")]
    MissingToken,
}

/// Errors resolving the blue and green applications before a rollout.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("neither {blue} nor {green} has a cname bound")]
    NoLiveEnvironment { blue: String, green: String },

    #[error("{app} already runs {current} units (target {target})")]
    AlreadyScaled {
        app: String,
        current: usize,
        target: usize,
    },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}
