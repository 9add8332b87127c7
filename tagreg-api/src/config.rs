//! Configuration file support
//!
//! Loads registry configuration from a TOML file and applies environment
//! overrides.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variables (`TAGREG_STALE_LOCK_SECONDS`, `TAGREG_LOG_LEVEL`,
//!    `TAGREG_LOG_FORMAT`)
//! 2. Config file (`[allocator]`, `[logging]`)
//! 3. Hardcoded defaults
//!
//! ```toml
//! [allocator]
//! stale_lock_seconds = 2.5
//! lock_acquire_timeout_ms = 5000
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use crate::telemetry::{LogFormat, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tagreg_coord::AllocatorConfig;
use tracing::debug;

pub const ENV_STALE_LOCK_SECONDS: &str = "TAGREG_STALE_LOCK_SECONDS";
pub const ENV_LOG_LEVEL: &str = "TAGREG_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "TAGREG_LOG_FORMAT";

/// Resolved configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagRegistryConfig {
    pub allocator: AllocatorConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// File config serde types (all Option: absence means "not set in file")
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub allocator: Option<AllocatorFileConfig>,
    #[serde(default)]
    pub logging: Option<LoggingFileConfig>,
}

/// The `[allocator]` section
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct AllocatorFileConfig {
    pub stale_lock_seconds: Option<f64>,
    pub lock_retry_ms: Option<u64>,
    pub lock_acquire_timeout_ms: Option<u64>,
}

/// The `[logging]` section
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct LoggingFileConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

/// Errors from config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {detail}")]
    Parse { path: PathBuf, detail: String },
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

impl TagRegistryConfig {
    /// Load from an optional file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup (for tests).
    pub fn load_with_env(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => read_file_config(path)?,
            None => FileConfig::default(),
        };
        let mut config = Self::default();
        config.apply_file(file)?;
        config.apply_env(env)?;
        config
            .allocator
            .validate()
            .map_err(ConfigError::InvalidValue)?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<(), ConfigError> {
        if let Some(alloc) = file.allocator {
            if let Some(v) = alloc.stale_lock_seconds {
                self.allocator.stale_lock_seconds = v;
            }
            if let Some(v) = alloc.lock_retry_ms {
                self.allocator.lock_retry_ms = v;
            }
            if let Some(v) = alloc.lock_acquire_timeout_ms {
                self.allocator.lock_acquire_timeout_ms = v;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = parse_log_format(&format)?;
            }
        }
        Ok(())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = env(ENV_STALE_LOCK_SECONDS).filter(|v| !v.is_empty()) {
            self.allocator.stale_lock_seconds = raw.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!("{ENV_STALE_LOCK_SECONDS}={raw}"))
            })?;
        }
        if let Some(level) = env(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
        if let Some(format) = env(ENV_LOG_FORMAT).filter(|v| !v.is_empty()) {
            self.logging.format = parse_log_format(&format)?;
        }
        Ok(())
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "human" | "text" => Ok(LogFormat::Human),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::InvalidValue(format!(
            "log format must be 'human' or 'json', got '{other}'"
        ))),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded config file");
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}
