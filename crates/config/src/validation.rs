//! Configuration validation

use crate::{AppConfig, ConfigError, MetricsConfig, Result};
use std::net::IpAddr;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_log_level(&config.logging.level) {
        errors.push(e);
    }

    errors.extend(validate_metrics_config(&config.metrics));

    // Return all errors if any were found
    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

/// Validate the metrics endpoint settings
pub fn validate_metrics_config(metrics: &MetricsConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if metrics.host.chars().any(char::is_whitespace) {
        errors.push(ValidationError::new(
            "metrics.host",
            format!("invalid host '{}', must not contain whitespace", metrics.host),
        ));
    }

    let bare = metrics
        .host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(&metrics.host);
    if bare.contains(':') && bare.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::new(
            "metrics.host",
            format!(
                "invalid host '{}', the port is configured separately",
                metrics.host
            ),
        ));
    }

    errors
}

/// Validate log level
fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "logging.level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}
