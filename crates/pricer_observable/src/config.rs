//! Notification engine configuration
//!
//! Handles loading configuration from environment variables, TOML files, and
//! CLI arguments. The resulting [`ObservableConfig`] seeds an
//! [`ObservableSettings`](crate::sync::ObservableSettings) via `from_config`.
//!
//! | Field          | TOML key       | Environment variable            |
//! |----------------|----------------|---------------------------------|
//! | `initial_mode` | `initial_mode` | `NEUTRYX_OBSERVABLE_MODE`       |
//! | `reentrancy`   | `reentrancy`   | `NEUTRYX_OBSERVABLE_REENTRANCY` |
//! | `log_level`    | `log_level`    | `NEUTRYX_LOG_LEVEL`             |

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::mode::{ReentrancyPolicy, UpdateMode};

/// Environment variable for the initial update mode.
pub const ENV_MODE: &str = "NEUTRYX_OBSERVABLE_MODE";
/// Environment variable for the re-entrancy policy.
pub const ENV_REENTRANCY: &str = "NEUTRYX_OBSERVABLE_REENTRANCY";
/// Environment variable for the log level.
pub const ENV_LOG_LEVEL: &str = "NEUTRYX_LOG_LEVEL";

/// Log levels supported by the engine's consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Every notification, including dropped and deferred ones
    Trace,
    /// Link changes and flushes
    Debug,
    /// Default level
    #[default]
    Info,
    /// Observer failures
    Warn,
    /// Errors only
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Convert log level to tracing filter string
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

/// Engine configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ObservableConfig {
    /// Mode the settings start in
    pub initial_mode: UpdateMode,
    /// Behaviour of re-entrant notifications
    pub reentrancy: ReentrancyPolicy,
    /// Log level
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    LogLevel::from_str(&s).map_err(serde::de::Error::custom)
}

impl ObservableConfig {
    /// Create a new ObservableConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(mode) = std::env::var(ENV_MODE) {
            config.initial_mode = UpdateMode::from_str(&mode)?;
        }

        if let Ok(policy) = std::env::var(ENV_REENTRANCY) {
            config.reentrancy = ReentrancyPolicy::from_str(&policy)?;
        }

        if let Ok(log_level) = std::env::var(ENV_LOG_LEVEL) {
            config.log_level = LogLevel::from_str(&log_level)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ObservableConfig = toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// `dropping` is rejected as an initial mode: every notification raised
    /// before the first `enable_updates()` would be lost.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_mode == UpdateMode::DisabledDropping {
            return Err(ConfigError::InvalidUpdateMode(format!(
                "{} (not allowed as initial mode)",
                self.initial_mode
            )));
        }

        Ok(())
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        if let Some(mode) = &cli.mode {
            self.initial_mode = UpdateMode::from_str(mode)?;
        }
        if let Some(policy) = &cli.reentrancy {
            self.reentrancy = ReentrancyPolicy::from_str(policy)?;
        }
        if let Some(log_level) = &cli.log_level {
            self.log_level = LogLevel::from_str(log_level)?;
        }
        Ok(())
    }
}

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Initial update mode override
    pub mode: Option<String>,
    /// Re-entrancy policy override
    pub reentrancy: Option<String>,
    /// Log level override
    pub log_level: Option<String>,
}

/// Build configuration from all sources
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
pub fn build_config(cli: &CliArgs) -> Result<ObservableConfig, ConfigError> {
    let mut config = if let Some(config_path) = &cli.config_file {
        ObservableConfig::from_file(config_path)?
    } else {
        ObservableConfig::default()
    };

    // Only variables that are actually set override the file
    if let Ok(mode) = std::env::var(ENV_MODE) {
        config.initial_mode = UpdateMode::from_str(&mode)?;
    }
    if let Ok(policy) = std::env::var(ENV_REENTRANCY) {
        config.reentrancy = ReentrancyPolicy::from_str(&policy)?;
    }
    if let Ok(log_level) = std::env::var(ENV_LOG_LEVEL) {
        config.log_level = LogLevel::from_str(&log_level)?;
    }

    config.merge_with_cli(cli)?;

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservableConfig::default();
        assert_eq!(config.initial_mode, UpdateMode::Enabled);
        assert_eq!(config.reentrancy, ReentrancyPolicy::Allow);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert_eq!(LogLevel::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("Info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("WARN").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("error").unwrap(), LogLevel::Error);

        assert!(LogLevel::from_str("invalid").is_err());
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(format!("{}", LogLevel::Trace), "trace");
        assert_eq!(format!("{}", LogLevel::Warn), "warn");
        assert_eq!(LogLevel::Error.as_filter_str(), "error");
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
            initial_mode = "deferring"
            reentrancy = "suppress"
            log_level = "debug"
        "#;

        let config = ObservableConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.initial_mode, UpdateMode::DisabledDeferring);
        assert_eq!(config.reentrancy, ReentrancyPolicy::Suppress);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_partial_toml_deserialization() {
        let config = ObservableConfig::from_toml_str(r#"reentrancy = "suppress""#).unwrap();
        // Should use defaults for unspecified fields
        assert_eq!(config.initial_mode, UpdateMode::Enabled);
        assert_eq!(config.reentrancy, ReentrancyPolicy::Suppress);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_invalid_toml_values() {
        let err = ObservableConfig::from_toml_str(r#"initial_mode = "paused""#).unwrap_err();
        assert!(err.to_string().contains("Configuration file error"));

        let err = ObservableConfig::from_toml_str(r#"initial_mode = "dropping""#).unwrap_err();
        assert!(err.to_string().contains("Invalid update mode"));
    }

    #[test]
    fn test_cli_args_merge() {
        let mut config = ObservableConfig::default();
        let cli = CliArgs {
            mode: Some("deferred".to_string()),
            reentrancy: Some("suppress".to_string()),
            log_level: Some("trace".to_string()),
            config_file: None,
        };

        config.merge_with_cli(&cli).unwrap();

        assert_eq!(config.initial_mode, UpdateMode::DisabledDeferring);
        assert_eq!(config.reentrancy, ReentrancyPolicy::Suppress);
        assert_eq!(config.log_level, LogLevel::Trace);
    }

    #[test]
    fn test_cli_args_merge_rejects_bad_values() {
        let mut config = ObservableConfig::default();
        let cli = CliArgs {
            reentrancy: Some("detect".to_string()),
            ..CliArgs::default()
        };
        assert!(config.merge_with_cli(&cli).is_err());
    }

    // The only test touching the process environment, so parallel tests
    // never observe each other's variables.
    #[test]
    fn test_env_and_build_config_priority() {
        std::env::remove_var(ENV_MODE);
        std::env::remove_var(ENV_REENTRANCY);
        std::env::remove_var(ENV_LOG_LEVEL);

        let config = build_config(&CliArgs::default()).unwrap();
        assert_eq!(config, ObservableConfig::default());

        let dir = std::env::temp_dir().join(format!("neutryx-observe-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("observable.toml");
        std::fs::write(&path, "reentrancy = \"suppress\"\nlog_level = \"warn\"\n").unwrap();

        std::env::set_var(ENV_LOG_LEVEL, "debug");
        std::env::set_var(ENV_MODE, "deferring");
        let from_env = ObservableConfig::from_env().unwrap();
        assert_eq!(from_env.initial_mode, UpdateMode::DisabledDeferring);
        assert_eq!(from_env.log_level, LogLevel::Debug);

        let cli = CliArgs {
            config_file: Some(path.clone()),
            mode: Some("enabled".to_string()),
            ..CliArgs::default()
        };
        let config = build_config(&cli).unwrap();
        assert_eq!(config.reentrancy, ReentrancyPolicy::Suppress);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.initial_mode, UpdateMode::Enabled);

        std::env::set_var(ENV_REENTRANCY, "sometimes");
        assert!(ObservableConfig::from_env().is_err());
        assert!(build_config(&CliArgs::default()).is_err());

        std::env::remove_var(ENV_MODE);
        std::env::remove_var(ENV_REENTRANCY);
        std::env::remove_var(ENV_LOG_LEVEL);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidLogLevel("bad".to_string());
        assert!(err.to_string().contains("Invalid log level"));

        let err = ConfigError::InvalidReentrancy("bad".to_string());
        assert!(err.to_string().contains("Invalid reentrancy policy"));
    }
}
