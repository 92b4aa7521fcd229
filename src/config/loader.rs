//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::RpcContextConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<RpcContextConfig, ConfigError> {
    let config: RpcContextConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RpcContextConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::debug!(path = ?path, "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, RpcContextConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = parse_config(
            r#"
            [timeouts]
            default_ms = 250

            [observability]
            metrics_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.timeouts.default_ms, 250);
        assert_eq!(config.timeouts.max_ms, 60_000);
        assert!(!config.observability.metrics_enabled);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn validation_errors_surface() {
        let err = parse_config("[timeouts]\ndefault_ms = 5000\nmax_ms = 100\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("exceeds timeouts.max_ms"));
    }

    #[test]
    fn syntax_errors_surface() {
        let err = parse_config("[timeouts\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join("rpc_context_load_from_file.toml");
        fs::write(&path, "[timeouts]\nmax_ms = 2000\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.timeouts.max_ms, 2_000);

        // Cleanup
        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/rpc_context.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
