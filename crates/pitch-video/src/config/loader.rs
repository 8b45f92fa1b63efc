use std::path::Path;
use std::time::Duration;

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

    let errors: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Validation { message });

    if config.version != "1.0" {
        return invalid(format!("Unsupported config version: {}", config.version));
    }

    if config.max_concurrent_jobs == 0 {
        return invalid("max_concurrent_jobs must be at least 1".to_string());
    }

    if let Some(secs) = config.job_timeout_secs {
        if !secs.is_finite() || secs <= 0.0 {
            return invalid(format!("job_timeout_secs must be positive, got {}", secs));
        }
        if let Err(e) = Duration::try_from_secs_f64(secs) {
            return invalid(format!("job_timeout_secs is out of range ({}): {}", secs, e));
        }
    }

    let frames = &config.frames;
    if !frames.interval_secs.is_finite() || frames.interval_secs <= 0.0 {
        return invalid(format!(
            "frames.interval_secs must be positive, got {}",
            frames.interval_secs
        ));
    }
    if !(1..=100).contains(&frames.quality) {
        return invalid(format!(
            "frames.quality must be between 1 and 100, got {}",
            frames.quality
        ));
    }
    if frames.width.is_some() != frames.height.is_some() {
        return invalid("frames.width and frames.height must be set together".to_string());
    }
    if frames.width == Some(0) || frames.height == Some(0) {
        return invalid("frames.width and frames.height must be positive".to_string());
    }

    if config.tools.ffmpeg_path.as_os_str().is_empty()
        || config.tools.ffprobe_path.as_os_str().is_empty()
    {
        return invalid("tools paths must not be empty".to_string());
    }

    Ok(())
}
