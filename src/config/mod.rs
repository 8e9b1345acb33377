pub mod cluster;

pub use cluster::{
    CephConfig, Config, KubernetesConfig, NodeConfig, Timeouts, DEFAULT_MONITOR_UNIT,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors for configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {0}: {1}")]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Host '{0}' is not defined in configuration")]
    UnknownNode(String),
}

/// Default config file location: ~/.labctl/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".labctl")
        .join("config.yaml")
}

// ============================================================================
// SBIO: Pure parsing
// ============================================================================

/// Parse and validate config from a YAML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Load the config file. A leading `~` in the path is expanded.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = PathBuf::from(expanded);
    let content =
        std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(path.clone(), e))?;
    parse_config(&content)
}
