//! Error types for structured error handling.
//!
//! This module provides:
//! - `UpdateError`: Failure raised by an observer's `update()` callback
//! - `UpdateFailure`: One failed delivery inside an aggregated flush
//! - `NotifyError`: Errors surfaced by notification and deferred flush
//! - `ConfigError`: Errors from configuration loading and parsing

use std::fmt;
use thiserror::Error;

use crate::id::ObserverId;

/// Failure reported by an observer while reacting to a notification.
///
/// Observers typically only mark cached values stale, so a failure here is
/// local to the observer: the link graph is never affected by it.
///
/// # Examples
/// ```
/// use pricer_observable::UpdateError;
///
/// let err = UpdateError::new("curve bootstrap failed");
/// assert_eq!(format!("{}", err), "curve bootstrap failed");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UpdateError {
    message: String,
}

impl UpdateError {
    /// Creates a new update error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for UpdateError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for UpdateError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// A single failed delivery recorded during a deferred flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFailure {
    /// Observer whose `update()` failed
    pub observer: ObserverId,
    /// The error it returned
    pub error: UpdateError,
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.observer, self.error)
    }
}

/// Errors surfaced by `notify_observers()` and `enable_updates()`.
///
/// # Variants
/// - `Update`: An observer failed during immediate delivery
/// - `DeferredFlush`: One or more observers failed while pending
///   notifications were being flushed
///
/// # Examples
/// ```
/// use pricer_observable::{NotifyError, UpdateError, UpdateFailure, ObserverId};
///
/// let err = NotifyError::DeferredFlush {
///     attempted: 3,
///     failures: vec![UpdateFailure {
///         observer: ObserverId::from_raw(7),
///         error: UpdateError::new("stale fixing"),
///     }],
/// };
/// assert_eq!(
///     format!("{}", err),
///     "could not notify one or more observers (1 of 3 failed): stale fixing"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Immediate delivery to an observer failed.
    #[error("observer {observer} failed to update: {source}")]
    Update {
        /// Observer whose `update()` failed first
        observer: ObserverId,
        /// The error it returned
        source: UpdateError,
    },

    /// One or more deferred deliveries failed during `enable_updates()`.
    #[error(
        "could not notify one or more observers ({} of {attempted} failed): {}",
        .failures.len(),
        first_message(.failures)
    )]
    DeferredFlush {
        /// Number of pending observers that were attempted
        attempted: usize,
        /// Every failed delivery, in attempt order
        failures: Vec<UpdateFailure>,
    },
}

impl NotifyError {
    /// Returns the number of observers that failed.
    pub fn failure_count(&self) -> usize {
        match self {
            NotifyError::Update { .. } => 1,
            NotifyError::DeferredFlush { failures, .. } => failures.len(),
        }
    }
}

fn first_message(failures: &[UpdateFailure]) -> &str {
    failures
        .first()
        .map(|failure| failure.error.message())
        .unwrap_or("unknown error")
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unrecognised update mode string.
    #[error("Invalid update mode: {0}. Must be one of: enabled, dropping, deferring")]
    InvalidUpdateMode(String),

    /// Unrecognised re-entrancy policy string.
    #[error("Invalid reentrancy policy: {0}. Must be one of: allow, suppress")]
    InvalidReentrancy(String),

    /// Unrecognised log level string.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Configuration file could not be read or parsed.
    #[error("Configuration file error: {0}")]
    FileError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_error_conversions() {
        let from_str: UpdateError = "boom".into();
        let from_string: UpdateError = String::from("boom").into();
        assert_eq!(from_str, from_string);
        assert_eq!(from_str.message(), "boom");
    }

    #[test]
    fn test_update_variant_display() {
        let err = NotifyError::Update {
            observer: ObserverId::from_raw(3),
            source: UpdateError::new("negative discount factor"),
        };
        assert_eq!(
            format!("{}", err),
            "observer observer#3 failed to update: negative discount factor"
        );
        assert_eq!(err.failure_count(), 1);
    }

    #[test]
    fn test_deferred_flush_counts_every_failure() {
        let failures = (0..2)
            .map(|i| UpdateFailure {
                observer: ObserverId::from_raw(i),
                error: UpdateError::new(format!("failure {}", i)),
            })
            .collect();
        let err = NotifyError::DeferredFlush {
            attempted: 5,
            failures,
        };
        assert_eq!(err.failure_count(), 2);
        assert!(format!("{}", err).contains("2 of 5 failed"));
        assert!(format!("{}", err).ends_with("failure 0"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidUpdateMode("paused".to_string());
        assert_eq!(
            format!("{}", err),
            "Invalid update mode: paused. Must be one of: enabled, dropping, deferring"
        );
    }
}
