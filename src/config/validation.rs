//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses parse and value ranges are sane
//! - Require TLS material: optional TLS still needs a secure credential
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ServerConfig, PLACEHOLDER_API_KEY};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("listener.tls is required: plaintext-only listeners are not supported")]
    MissingTls,
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("admin.api_key must be changed from the placeholder when the admin API is enabled")]
    PlaceholderApiKey,
    #[error("observability.log_level: unknown level {0:?}")]
    UnknownLogLevel(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_connections" });
    }

    match &config.listener.tls {
        None => errors.push(ValidationError::MissingTls),
        Some(tls) => {
            if tls.cert_path.trim().is_empty() {
                errors.push(ValidationError::Empty { field: "listener.tls.cert_path" });
            }
            if tls.key_path.trim().is_empty() {
                errors.push(ValidationError::Empty { field: "listener.tls.key_path" });
            }
        }
    }

    if config.listener.max_frame_bytes == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_frame_bytes" });
    }

    if config.timeouts.handshake_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.handshake_secs" });
    }
    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.idle_secs" });
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::Empty { field: "admin.api_key" });
        } else if config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::PlaceholderApiKey);
        }
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
