use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// File name looked up in the working directory when no config path is given.
pub const CONFIG_FILE_NAME: &str = "jobharvest.json";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the config at `explicit` if given, otherwise the first of
/// `./jobharvest.json` and `~/.jobharvest/config.json` that exists, otherwise
/// built-in defaults.
pub fn load_config_or_default(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let candidates: Vec<PathBuf> = std::iter::once(PathBuf::from(CONFIG_FILE_NAME))
        .chain(dirs::home_dir().map(|h| h.join(".jobharvest").join("config.json")))
        .collect();

    for candidate in candidates {
        if candidate.is_file() {
            log::info!("Loading config from {}", candidate.display());
            return load_config(&candidate);
        }
    }

    log::debug!("No config file found, using defaults");
    Ok(Config::default())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.max_concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "maxConcurrency must be at least 1".to_string(),
        });
    }

    if config.task_ttl_secs == 0 {
        return Err(ConfigError::Validation {
            message: "taskTtlSecs must be at least 1".to_string(),
        });
    }

    let (min, default, max) = (
        config.min_results_per_source,
        config.default_results_per_source,
        config.max_results_per_source,
    );
    if !(min <= default && default <= max) {
        return Err(ConfigError::Validation {
            message: format!(
                "Results per source must satisfy min <= default <= max (got {} / {} / {})",
                min, default, max
            ),
        });
    }

    Ok(())
}
