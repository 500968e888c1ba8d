use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, ENV_VAR_PATTERN};
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Access id for the management API
pub const ACCESS_ID_ENV: &str = "SUMO_ACCESSID";
/// Access key for the management API
pub const ACCESS_KEY_ENV: &str = "SUMO_ACCESSKEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("environment variable {0} not set")]
    MissingEnv(&'static str),
}

/// Management API credentials
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub access_id: String,
    pub access_key: String,
}

impl ApiCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        let read = |name: &'static str| match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::MissingEnv(name)),
        };

        Ok(Self {
            access_id: read(ACCESS_ID_ENV)?,
            access_key: read(ACCESS_KEY_ENV)?,
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Builds the effective config: the file (or defaults when there is none)
/// with command line overrides applied on top, then validated.
pub fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => Config::default(),
    };
    config.apply_overrides(overrides);
    config.work_dir = expand_tilde(&config.work_dir);
    validate_config(&config)?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    // Expand environment variables in the YAML string before parsing
    let yaml_string = expand_env_vars(&yaml_string);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;

    config.work_dir = expand_tilde(&config.work_dir);
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "Environment variables are not set: {}\n\
         \n\
         Either set them or replace the $env{{...}} references in the config file",
        unexpanded_vars.join(", ")
    )))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.work_dir.as_os_str().is_empty() {
        errors.push("work_dir must not be empty".to_string());
    }
    if config.source.program.trim().is_empty() {
        errors.push("source.program must not be empty".to_string());
    }
    if matches!(&config.source.grep, Some(g) if g.is_empty()) {
        errors.push("source.grep must not be empty when set".to_string());
    }
    if config.harvest.interval.is_zero() {
        errors.push("harvest.interval must be greater than zero".to_string());
    }
    if config.harvest.batch_size < 1024 {
        errors.push(format!(
            "harvest.batch_size must be at least 1024 bytes, got {}",
            config.harvest.batch_size
        ));
    }
    if !(1..=22).contains(&config.harvest.compression_level) {
        errors.push(format!(
            "harvest.compression_level must be between 1 and 22, got {}",
            config.harvest.compression_level
        ));
    }
    if config.delivery.interval.is_zero() {
        errors.push("delivery.interval must be greater than zero".to_string());
    }
    if config.delivery.timeout.is_zero() {
        errors.push("delivery.timeout must be greater than zero".to_string());
    }
    if let Some(url) = &config.delivery.url {
        if !is_http_url(url) {
            errors.push(format!("delivery.url must be an http(s) URL, got '{}'", url));
        }
    }
    if !is_http_url(&config.provision.api_url) {
        errors.push(format!(
            "provision.api_url must be an http(s) URL, got '{}'",
            config.provision.api_url
        ));
    }
    if config.shutdown.drain_timeout.is_zero() {
        errors.push("shutdown.drain_timeout must be greater than zero".to_string());
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(ConfigError::Validation(errors.remove(0))),
        _ => Err(ConfigError::ValidationList(errors)),
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
