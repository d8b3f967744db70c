//! Where `telemetry.json` comes from.
//!
//! Candidates, first existing file wins:
//! 1. `--config` on the command line
//! 2. `FINANCEHUB_TELEMETRY_CONFIG`
//! 3. `$FINANCEHUB_CONFIG_DIR/telemetry.json`
//! 4. `<XDG config dir>/financehub/telemetry.json`
//! 5. `/etc/financehub/telemetry.json`
//!
//! With no candidate on disk the built-in defaults apply.

use std::fmt;
use std::path::{Path, PathBuf};

pub const ENV_TELEMETRY_PATH: &str = "FINANCEHUB_TELEMETRY_CONFIG";
pub const ENV_CONFIG_DIR: &str = "FINANCEHUB_CONFIG_DIR";
/// `true`/`1` forces dev mode (event mirroring to the log) on.
pub const ENV_DEV_MODE: &str = "FH_TELEMETRY_DEV_MODE";

pub const TELEMETRY_FILENAME: &str = "telemetry.json";

const APP_NAME: &str = "financehub";

/// Provenance of the loaded configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    CliArgument,
    Environment,
    XdgConfig,
    SystemConfig,
    #[default]
    BuiltinDefault,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigSource::CliArgument => "CLI argument",
            ConfigSource::Environment => "environment variable",
            ConfigSource::XdgConfig => "XDG config",
            ConfigSource::SystemConfig => "system config",
            ConfigSource::BuiltinDefault => "builtin default",
        })
    }
}

/// Outcome of resolution: the file to read, if any, and why it was picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Candidate paths in priority order, whether or not they exist.
pub fn candidates(
    cli_path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
    xdg_config: Option<PathBuf>,
) -> Vec<(ConfigSource, PathBuf)> {
    let mut out = Vec::with_capacity(5);
    if let Some(path) = cli_path {
        out.push((ConfigSource::CliArgument, path.to_path_buf()));
    }
    if let Some(path) = lookup(ENV_TELEMETRY_PATH).filter(|p| !p.is_empty()) {
        out.push((ConfigSource::Environment, PathBuf::from(path)));
    }
    if let Some(dir) = lookup(ENV_CONFIG_DIR).filter(|p| !p.is_empty()) {
        out.push((
            ConfigSource::Environment,
            PathBuf::from(dir).join(TELEMETRY_FILENAME),
        ));
    }
    if let Some(dir) = xdg_config {
        out.push((
            ConfigSource::XdgConfig,
            dir.join(APP_NAME).join(TELEMETRY_FILENAME),
        ));
    }
    out.push((
        ConfigSource::SystemConfig,
        system_config_dir().join(TELEMETRY_FILENAME),
    ));
    out
}

/// Resolve against the process environment and the filesystem.
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigLocation {
    let found = candidates(cli_path, |key| std::env::var(key).ok(), dirs::config_dir())
        .into_iter()
        .find(|(_, path)| path.is_file());
    match found {
        Some((source, path)) => ConfigLocation {
            path: Some(path),
            source,
        },
        None => ConfigLocation::default(),
    }
}

pub fn system_config_dir() -> PathBuf {
    Path::new("/etc").join(APP_NAME)
}

/// Default directory for persisted critical events.
pub fn default_storage_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join(APP_NAME).join("telemetry"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order() {
        let lookup = |key: &str| match key {
            ENV_TELEMETRY_PATH => Some("/tmp/env/telemetry.json".to_string()),
            ENV_CONFIG_DIR => Some("/tmp/confdir".to_string()),
            _ => None,
        };
        let list = candidates(
            Some(Path::new("/tmp/cli.json")),
            lookup,
            Some(PathBuf::from("/home/u/.config")),
        );
        let sources: Vec<ConfigSource> = list.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            sources,
            vec![
                ConfigSource::CliArgument,
                ConfigSource::Environment,
                ConfigSource::Environment,
                ConfigSource::XdgConfig,
                ConfigSource::SystemConfig,
            ]
        );
        assert_eq!(list[2].1, PathBuf::from("/tmp/confdir/telemetry.json"));
        assert_eq!(
            list[3].1,
            PathBuf::from("/home/u/.config/financehub/telemetry.json")
        );
    }

    #[test]
    fn test_empty_env_values_are_skipped() {
        let list = candidates(None, |_| Some(String::new()), None);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].0, ConfigSource::SystemConfig);
        assert_eq!(list[0].1, PathBuf::from("/etc/financehub/telemetry.json"));
    }

    #[test]
    fn test_missing_cli_path_falls_through() {
        let location = resolve_config(Some(Path::new("/nonexistent/fh/telemetry.json")));
        assert_ne!(location.source, ConfigSource::CliArgument);
        if location.path.is_none() {
            assert_eq!(location.source, ConfigSource::BuiltinDefault);
        }
    }

    #[test]
    fn test_source_display() {
        assert_eq!(ConfigSource::CliArgument.to_string(), "CLI argument");
        assert_eq!(ConfigSource::BuiltinDefault.to_string(), "builtin default");
    }

    #[test]
    fn test_default_storage_dir() {
        if let Some(path) = default_storage_dir() {
            assert!(path.ends_with("financehub/telemetry"));
        }
    }
}
