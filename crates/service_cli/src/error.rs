//! CLI error types

use pricer_observable::{ConfigError, NotifyError, UpdateError};
use thiserror::Error;

/// Errors surfaced by CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or validated
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A notification or deferred flush failed
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// An observer refused an explicit update
    #[error("Update error: {0}")]
    Update(#[from] UpdateError),

    /// Invalid command-line argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Worker thread pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// A post-run consistency check failed
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Output could not be serialised
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

/// Result alias for CLI commands
pub type Result<T> = std::result::Result<T, CliError>;
