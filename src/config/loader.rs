//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [listener]
        bind_address = "127.0.0.1:50051"

        [listener.tls]
        cert_path = "certs/server.crt"
        key_path = "certs/server.key"

        [policy]
        tls_required = true
    "#;

    #[test]
    fn parses_partial_file_with_defaults() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:50051");
        assert_eq!(config.listener.max_connections, 10_000);
        assert!(config.policy.tls_required);
        assert_eq!(config.timeouts.handshake_secs, 10);
        assert!(!config.admin.enabled);
    }

    #[test]
    fn reports_syntax_errors() {
        assert!(matches!(parse_config("[listener"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn reports_validation_errors() {
        let err = parse_config("[policy]\ntls_required = false\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e == &[ValidationError::MissingTls]));
        assert!(err.to_string().contains("listener.tls is required"));
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("optional-tls-{}.toml", std::process::id()));
        fs::write(&path, SAMPLE).unwrap();
        let config = load_config(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.listener.tls.unwrap().cert_path, "certs/server.crt");
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/optional-tls.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
