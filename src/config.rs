//! Configuration management
//!
//! One YAML document with a section per component. Missing sections and fields fall back
//! to their defaults; a handful of environment variables override the file.

use std::path::{Path, PathBuf};

use element_locator::LocatorConfig;
use overlay_stabilizer::{ScrollConfig, StabilizerConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{CliError, CliResult};

pub const ENV_EXACT_MATCH: &str = "WAYPOINT_EXACT_MATCH";
pub const ENV_OBSERVE_MUTATIONS: &str = "WAYPOINT_OBSERVE_MUTATIONS";
pub const ENV_STANDARD_MAX_ATTEMPTS: &str = "WAYPOINT_STANDARD_MAX_ATTEMPTS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaypointConfig {
    #[serde(default)]
    pub locator: LocatorConfig,

    #[serde(default)]
    pub stabilizer: StabilizerConfig,

    #[serde(default)]
    pub scroll: ScrollConfig,
}

impl WaypointConfig {
    pub fn from_yaml(yaml: &str, origin: &Path) -> CliResult<Self> {
        let config: WaypointConfig = serde_yaml::from_str(yaml).map_err(|err| CliError::Config {
            path: origin.to_path_buf(),
            reason: err.to_string(),
        })?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CliResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_EXACT_MATCH) {
            self.locator.exact_match_by_default = parse_bool(ENV_EXACT_MATCH, &value)?;
        }
        if let Some(value) = lookup(ENV_OBSERVE_MUTATIONS) {
            self.stabilizer.observe_mutations = parse_bool(ENV_OBSERVE_MUTATIONS, &value)?;
        }
        if let Some(value) = lookup(ENV_STANDARD_MAX_ATTEMPTS) {
            let attempts = value.trim().parse().map_err(|_| CliError::InvalidOverride {
                var: ENV_STANDARD_MAX_ATTEMPTS,
                value: value.clone(),
            })?;
            self.stabilizer.standard.max_attempts = attempts;
        }
        Ok(())
    }
}

fn parse_bool(var: &'static str, value: &str) -> CliResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CliError::InvalidOverride {
            var,
            value: value.to_string(),
        }),
    }
}

/// `<config dir>/waypoint/config.yaml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("waypoint");
    path.push("config.yaml");
    Some(path)
}

/// Load configuration from `path` (or the default location), then apply environment
/// overrides and validate.
///
/// An explicitly given file must exist; a missing default file means defaults.
pub async fn load_config(path: Option<&Path>) -> CliResult<WaypointConfig> {
    let mut config = match path {
        Some(path) => read_config(path).await?,
        None => match default_config_path() {
            Some(path) if path.exists() => read_config(&path).await?,
            Some(path) => {
                warn!("Config file not found, using defaults: {}", path.display());
                WaypointConfig::default()
            }
            None => WaypointConfig::default(),
        },
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.stabilizer.validate()?;
    Ok(config)
}

async fn read_config(path: &Path) -> CliResult<WaypointConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let config = WaypointConfig::from_yaml(&content, path)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
stabilizer:
  standard:
    max_attempts: 12
    check_interval_ms: 25
    initial_delay_ms: 0
  observe_mutations: false
scroll:
  settle_timeout_ms: 400
"#;
        let config = WaypointConfig::from_yaml(yaml, Path::new("test.yaml")).unwrap();
        assert_eq!(config.stabilizer.standard.max_attempts, 12);
        assert!(!config.stabilizer.observe_mutations);
        assert_eq!(config.stabilizer.stable_samples, 3);
        assert_eq!(config.scroll.settle_timeout_ms, 400);
        assert_eq!(config.scroll.settle_check_ms, 50);
        assert!(config.locator.exact_match_by_default);
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let err = WaypointConfig::from_yaml("stabilizer: [", Path::new("broken.yaml")).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_EXACT_MATCH, "false"),
            (ENV_OBSERVE_MUTATIONS, "0"),
            (ENV_STANDARD_MAX_ATTEMPTS, " 7 "),
        ]
        .into_iter()
        .collect();
        let mut config = WaypointConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert!(!config.locator.exact_match_by_default);
        assert!(!config.stabilizer.observe_mutations);
        assert_eq!(config.stabilizer.standard.max_attempts, 7);
    }

    #[test]
    fn bad_override_is_reported() {
        let mut config = WaypointConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_EXACT_MATCH).then(|| "sometimes".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::InvalidOverride {
                var: ENV_EXACT_MATCH,
                ..
            }
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = tokio_test::block_on(load_config(Some(&dir.path().join("nope.yaml"))))
            .unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
