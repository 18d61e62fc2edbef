//! Startup config file loader and validation.
//!
//! A missing or unparsable config is a startup precondition failure: the
//! caller aborts instead of running a partial panel.

use crate::error::ConfigError;
use crate::models::AppConfig;
use std::fs;
use std::path::Path;

/// Load the startup config from a JSON file.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
    validate_config_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!(
                "Configuration file not found at: {}",
                path.display()
            ))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let config: AppConfig = serde_json::from_str(&content).map_err(ConfigError::InvalidJson)?;

    validate_config(&config)?;

    Ok(config)
}

/// Validate config path (.json extension required).
pub fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Configuration path cannot be empty".to_string(),
        ));
    }

    match path.extension() {
        Some(ext) if ext == "json" => {}
        Some(ext) => {
            return Err(ConfigError::ValidationFailed(format!(
                "Configuration file must have .json extension, got .{}",
                ext.to_string_lossy()
            )))
        }
        None => {
            return Err(ConfigError::ValidationFailed(
                "Configuration file must have .json extension".to_string(),
            ))
        }
    }

    Ok(())
}

/// Semantic validation beyond what serde enforces.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.vm_name.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "vm_name cannot be empty".to_string(),
        ));
    }

    if config.backend.dir.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "backend.dir cannot be empty".to_string(),
        ));
    }

    if config.backend.config_file.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "backend.config_file cannot be empty".to_string(),
        ));
    }

    for p in &config.processes {
        if p.name.is_empty() || p.path.is_empty() {
            return Err(ConfigError::ValidationFailed(format!(
                "managed process entries need a name and a path, got name='{}' path='{}'",
                p.name, p.path
            )));
        }
    }

    for profile in &config.backend.profiles {
        if profile.address.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "backend profile address cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
