//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Port-only override; binds all interfaces.
pub const ENV_PORT: &str = "PROXY_PORT";
/// Full bind address override; wins over [`ENV_PORT`].
pub const ENV_BIND_ADDRESS: &str = "PROXY_BIND_ADDRESS";
pub const ENV_MAX_CONNECTIONS: &str = "PROXY_MAX_CONNECTIONS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "PROXY_CONNECT_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "PROXY_LOG_LEVEL";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// An environment override held a value of the wrong shape.
    Env { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => {
                write!(f, "Invalid value for {}: '{}'", var, value)
            }
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

/// Parse a TOML file without validating it.
pub fn read_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let config = read_config_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Optional file, then process environment overrides. Not validated, so
/// callers can layer further overrides (CLI flags) first.
pub fn resolve(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => ProxyConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Apply `PROXY_*` overrides using `lookup` to read variables.
///
/// Taking the lookup as a closure keeps this testable without touching the
/// process environment.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(ENV_PORT) {
        let port: u16 = parse_env(ENV_PORT, &port)?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(addr) = lookup(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
    if let Some(max) = lookup(ENV_MAX_CONNECTIONS) {
        config.listener.max_connections = parse_env(ENV_MAX_CONNECTIONS, &max)?;
    }
    if let Some(secs) = lookup(ENV_CONNECT_TIMEOUT_SECS) {
        config.timeouts.connect_secs = parse_env(ENV_CONNECT_TIMEOUT_SECS, &secs)?;
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.observability.log_level = level;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}
