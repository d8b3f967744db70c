//! Loading the telemetry configuration with provenance.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::resolve::{resolve_config, ConfigSource};
use crate::telemetry::TelemetryConfig;
use crate::validate::{validate_config, ValidationError};

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: TelemetryConfig,
    /// Path the config was read from (None if using defaults).
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Load, override and validate the telemetry configuration.
///
/// An explicit `cli_path` that does not exist is an error rather than a
/// silent fallback. Environment overrides are applied before validation.
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
    }

    let location = resolve_config(cli_path);
    let mut config = match &location.path {
        Some(path) => load_from_file(path)?,
        None => TelemetryConfig::default(),
    };
    config.apply_env_overrides();
    validate_config(&config)?;

    tracing::debug!(
        source = %location.source,
        path = ?location.path,
        "telemetry config loaded"
    );

    Ok(ResolvedConfig {
        config,
        path: location.path,
        source: location.source,
    })
}

fn load_from_file(path: &Path) -> Result<TelemetryConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}
