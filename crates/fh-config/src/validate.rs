//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::telemetry::TelemetryConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Validate telemetry configuration semantically.
pub fn validate_config(config: &TelemetryConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    require_positive("events.capacity", config.events.capacity)?;
    require_positive(
        "events.max_metadata_value_len",
        config.events.max_metadata_value_len,
    )?;
    if !(config.events.slow_operation_ms.is_finite() && config.events.slow_operation_ms > 0.0) {
        return Err(ValidationError::InvalidValue {
            field: "events.slow_operation_ms".to_string(),
            message: format!(
                "Must be a positive number, got {}",
                config.events.slow_operation_ms
            ),
        });
    }

    require_positive(
        "processes.history_capacity",
        config.processes.history_capacity,
    )?;

    require_positive("interactions.capacity", config.interactions.capacity)?;
    require_positive("interactions.max_input_len", config.interactions.max_input_len)?;
    require_positive("interactions.max_text_len", config.interactions.max_text_len)?;

    require_positive(
        "sanitize.max_state_value_len",
        config.sanitize.max_state_value_len,
    )?;

    validate_analyzer(config)?;

    if config.storage.enabled {
        require_positive("storage.max_persisted", config.storage.max_persisted)?;
    }

    if config.maintenance.max_event_age_ms <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "maintenance.max_event_age_ms".to_string(),
            message: format!("Must be positive, got {}", config.maintenance.max_event_age_ms),
        });
    }
    require_positive(
        "maintenance.interval_secs",
        config.maintenance.interval_secs as usize,
    )?;

    Ok(())
}

fn validate_analyzer(config: &TelemetryConfig) -> ValidationResult<()> {
    let analyzer = &config.analyzer;
    if analyzer.lookback_ms <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "analyzer.lookback_ms".to_string(),
            message: format!("Must be positive, got {}", analyzer.lookback_ms),
        });
    }

    // The timeline cannot ask for more events than the log retains.
    let windows = [
        ("analyzer.recent_events", analyzer.recent_events),
        ("analyzer.recent_state_changes", analyzer.recent_state_changes),
        ("analyzer.recent_user_actions", analyzer.recent_user_actions),
        ("analyzer.recent_api_calls", analyzer.recent_api_calls),
    ];
    for (field, window) in windows {
        if window > config.events.capacity {
            return Err(ValidationError::SemanticError(format!(
                "{} ({}) exceeds events.capacity ({})",
                field, window, config.events.capacity
            )));
        }
    }

    if analyzer.process_history > config.processes.history_capacity {
        return Err(ValidationError::SemanticError(format!(
            "analyzer.process_history ({}) exceeds processes.history_capacity ({})",
            analyzer.process_history, config.processes.history_capacity
        )));
    }

    Ok(())
}

fn require_positive(field: &str, value: usize) -> ValidationResult<()> {
    if value == 0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "Must be greater than 0".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&TelemetryConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = TelemetryConfig::default();
        config.events.capacity = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "events.capacity"));
        assert_eq!(err.code(), 65);
    }

    #[test]
    fn test_window_larger_than_log_rejected() {
        let mut config = TelemetryConfig::default();
        config.events.capacity = 5;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ValidationError::SemanticError(_)));
    }

    #[test]
    fn test_version_mismatch() {
        let config = TelemetryConfig {
            schema_version: "0.9".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_disabled_storage_skips_cap_check() {
        let mut config = TelemetryConfig::default();
        config.storage.enabled = false;
        config.storage.max_persisted = 0;
        assert!(validate_config(&config).is_ok());
    }
}
