//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::blockchain::env::{self, EnvSource, ProcessEnv};
use crate::blockchain::types::ChainId;
use crate::config::schema::RegistryConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file, applying overrides
/// from the process environment.
pub fn load_config(path: &Path) -> Result<RegistryConfig, ConfigError> {
    load_config_with_env(path, &ProcessEnv)
}

/// Same as [`load_config`] with an explicit environment.
pub fn load_config_with_env(path: &Path, env: &dyn EnvSource) -> Result<RegistryConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content, env)
}

/// Parse, override and validate configuration text.
pub fn parse_config(content: &str, env: &dyn EnvSource) -> Result<RegistryConfig, ConfigError> {
    let mut config: RegistryConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the process-wide overrides `ETH_DISABLED` and `ETH_CHAIN_ID`.
///
/// Malformed values are logged and ignored, like every other override.
pub fn apply_env_overrides(config: &mut RegistryConfig, source: &dyn EnvSource) {
    if let Some(disabled) = env::lookup::<bool>(source, "ETH_DISABLED") {
        config.general.ethereum_disabled = disabled;
    }
    if let Some(chain_id) = env::lookup::<ChainId>(source, "ETH_CHAIN_ID") {
        config.general.default_chain_id = Some(chain_id);
    }
}
