//! Configuration file handling
//!
//! Settings live in a TOML file (`pulse.toml` by default). Every section and
//! field has a default, so a missing file, an empty file or a partial file
//! are all valid.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "pulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Run settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Organization hierarchy settings.
    #[serde(default)]
    pub org: OrgConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Batch run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Days of history recomputed by an incremental run.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Number of senders kept in the message leaderboard.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

fn default_lookback_days() -> u32 {
    90
}

fn default_leaderboard_size() -> usize {
    10
}

/// Organization rollup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgConfig {
    /// Units whose id ends with this suffix are root candidates.
    #[serde(default = "default_root_suffix")]
    pub root_suffix: String,

    /// Top of the whole forest; never treated as a root candidate.
    #[serde(default)]
    pub universal_root_id: Option<String>,

    /// Maximum parent hops before a unit is flagged and unassigned.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for OrgConfig {
    fn default() -> Self {
        Self {
            root_suffix: default_root_suffix(),
            universal_root_id: None,
            max_depth: default_max_depth(),
        }
    }
}

fn default_root_suffix() -> String {
    "0000".to_string()
}

fn default_max_depth() -> usize {
    100
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ComputeError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path` if given, else `pulse.toml` in the working directory if it
    /// exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ComputeError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Render the default configuration as TOML.
    pub fn default_toml() -> Result<String, ComputeError> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.run.lookback_days, 90);
        assert_eq!(config.run.leaderboard_size, 10);
        assert_eq!(config.org.root_suffix, "0000");
        assert_eq!(config.org.max_depth, 100);
        assert_eq!(config.org.universal_root_id, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
[run]
lookback_days = 30

[org]
universal_root_id = "00000000"
"#;

        let config = Config::from_toml(toml_content).unwrap();
        assert_eq!(config.run.lookback_days, 30);
        assert_eq!(config.run.leaderboard_size, 10);
        assert_eq!(config.org.universal_root_id.as_deref(), Some("00000000"));
        assert_eq!(config.org.root_suffix, "0000");
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_config() {
        let result = Config::from_toml("[run]\nlookback_days = \"many\"");
        assert!(matches!(result, Err(ComputeError::ConfigError(_))));
    }

    #[test]
    fn test_default_toml_round_trip() {
        let rendered = Config::default_toml().unwrap();
        assert!(rendered.contains("[run]"));
        assert!(rendered.contains("[org]"));
        assert_eq!(Config::from_toml(&rendered).unwrap(), Config::default());
    }
}
