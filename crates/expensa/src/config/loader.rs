use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

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

    let limits = &config.limits;
    if limits.min_bytes > limits.max_bytes {
        return Err(ConfigError::Validation {
            message: format!(
                "limits.minBytes ({}) exceeds limits.maxBytes ({})",
                limits.min_bytes, limits.max_bytes
            ),
        });
    }

    let allowed = config.formats.allowed_set();
    for ext in &config.formats.inline {
        if !allowed.contains(&ext.to_ascii_lowercase()) {
            return Err(ConfigError::Validation {
                message: format!("Inline format '{}' is not in formats.allowed", ext),
            });
        }
    }

    for ext in &allowed {
        if ext.starts_with('.') || ext.contains('/') {
            return Err(ConfigError::Validation {
                message: format!("Format '{}' must be a bare extension", ext),
            });
        }
    }

    Ok(())
}
