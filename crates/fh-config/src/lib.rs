//! FinanceHub telemetry configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for telemetry.json
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation

pub mod load;
pub mod resolve;
pub mod telemetry;
pub mod validate;

pub use load::{load_config, ConfigError, ResolvedConfig};
pub use resolve::{resolve_config, ConfigLocation, ConfigSource};
pub use telemetry::{
    AnalyzerConfig, EventsConfig, InteractionsConfig, MaintenanceConfig, ProcessesConfig,
    SanitizeConfig, StorageConfig, TelemetryConfig,
};
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
