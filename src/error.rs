//! Error types shared across the viewer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures at one of the two background service boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service panicked while handling a request
    #[error("{service} service failed: {message}")]
    Panicked {
        service: &'static str,
        message: String,
    },

    /// The worker thread is gone and can no longer accept requests
    #[error("{service} service is not running")]
    Disconnected { service: &'static str },
}

/// Document load/save failures.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("document has no path to save to")]
    NoPath,
}

/// Scroll-offset store failures. Never shown to the user.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("scroll store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("scroll store encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
