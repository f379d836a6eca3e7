use std::path::{Path, PathBuf};

use url::Url;

use crate::config::settings::{Settings, SETTINGS_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/settings-v1.json");

/// Overrides `data_dir` from the settings file.
pub const DATA_DIR_ENV: &str = "MINUTEWATCH_DATA_DIR";

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let settings: Settings = serde_json::from_value(json_value)?;

    validate_settings(&settings)?;

    Ok(settings)
}

/// Applies environment overrides on top of loaded settings.
pub fn apply_env_overrides(mut settings: Settings) -> Settings {
    apply_data_dir_override(&mut settings, std::env::var_os(DATA_DIR_ENV).map(PathBuf::from));
    settings
}

fn apply_data_dir_override(settings: &mut Settings, value: Option<PathBuf>) {
    if let Some(dir) = value.filter(|d| !d.as_os_str().is_empty()) {
        settings.data_dir = Some(dir);
    }
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

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.version != SETTINGS_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported settings version: {}", settings.version),
        });
    }

    for source in &settings.sources {
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidSourceUrl {
                    url: source.clone(),
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidSourceUrl {
                    url: source.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    if settings.retry.initial_backoff_ms > settings.retry.max_backoff_ms {
        return Err(ConfigError::Validation {
            message: "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".to_string(),
        });
    }

    if tracing_subscriber::EnvFilter::try_new(&settings.logging.level).is_err() {
        return Err(ConfigError::Validation {
            message: format!("Invalid logging level: {}", settings.logging.level),
        });
    }

    Ok(())
}
