//! Top-level error type for starting and running the guard.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start metrics exporter on {addr}: {message}")]
    Metrics { addr: String, message: String },
}

pub type Result<T> = std::result::Result<T, GuardError>;
