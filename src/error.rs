use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// A fetch against the download API failed.</br>
/// The dashboard treats every variant the same way; the variants only exist so the cause can be logged.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to fetch data")]
    Status { status: StatusCode },

    #[error("request to download API failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    pub fn status(&self) -> Option<StatusCode> {
        return match self {
            FetchError::Status { status } => Some(*status),
            FetchError::Transport(e) => e.status(),
        };
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid API url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("poll interval must be at least {min_ms} ms, got {actual_ms} ms")]
    IntervalTooShort { min_ms: u64, actual_ms: u64 },

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open log file {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("logging is already initialised: {0}")]
    AlreadyInitialised(#[from] tracing_subscriber::util::TryInitError),
}
