//! Engine configuration
//!
//! Loaded from environment variables with sensible defaults:
//!
//! - `DOCKHAND_WORK_ROOT`: directory scratch work paths are allocated under
//!   - default: system temp dir + `dockhand/dev/work`
//! - `DOCKHAND_READY_TIMEOUT`: seconds to wait for a worker's readiness
//!   signal - default: `10`
//! - `DOCKHAND_MAX_LAMBDA_SIZE`: default function payload ceiling in bytes,
//!   overridable per builder/match via `maxLambdaSize` - default: 5 MiB
//! - `DOCKHAND_LOG_LEVEL`: logging level - default: `info`
//!
//! Environment *layers* for emulated functions (project-level declarations
//! and dev-server overrides) and the environment handed to worker processes
//! are plain fields, populated by the embedding dev server rather than read
//! from this process's environment.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::build::normalize::DEFAULT_MAX_LAMBDA_BYTES;

const DEFAULT_READY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for [`DevEngine`](crate::build::executor::DevEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory under which per-match scratch directories are allocated.
    pub work_root: PathBuf,

    /// How long to wait for a spawned worker's readiness signal.
    pub ready_timeout_secs: u64,

    /// Ceiling for Lambda payloads when no config overrides it.
    pub max_lambda_bytes: usize,

    /// Environment passed to worker processes at spawn time.
    pub build_env: HashMap<String, String>,

    /// Project-declared environment for emulated functions.
    pub project_env: HashMap<String, String>,

    /// Dev-server-level environment overrides for emulated functions.
    pub override_env: HashMap<String, String>,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let work_root = env::var("DOCKHAND_WORK_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("dockhand").join("dev").join("work"));

        let ready_timeout_secs = env::var("DOCKHAND_READY_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_READY_TIMEOUT_SECS);

        let max_lambda_bytes = env::var("DOCKHAND_MAX_LAMBDA_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_LAMBDA_BYTES);

        let log_level = env::var("DOCKHAND_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            work_root,
            ready_timeout_secs,
            max_lambda_bytes,
            build_env: HashMap::new(),
            project_env: HashMap::new(),
            override_env: HashMap::new(),
            log_level,
        }
    }
}

impl EngineConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Checks that numeric values are in workable ranges and the log level
    /// is known.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ready_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Worker ready timeout must be at least 1 second".to_string(),
            ));
        }
        if self.ready_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Worker ready timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if self.max_lambda_bytes < 1024 {
            return Err(ConfigError::ValidationFailed(
                "Function payload ceiling must be at least 1KB".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_validates() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.ready_timeout() >= Duration::from_secs(1));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = EngineConfig {
            ready_timeout_secs: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tiny_size_ceiling_rejected() {
        let config = EngineConfig {
            max_lambda_bytes: 16,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let config = EngineConfig {
            log_level: "verbose".to_string(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
