//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RpcContextConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::RpcContextConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("timeouts.max_ms must be greater than zero")]
    ZeroMaxTimeout,

    #[error("timeouts.default_ms ({default_ms}) exceeds timeouts.max_ms ({max_ms})")]
    DefaultExceedsMax { default_ms: u64, max_ms: u64 },

    #[error("unknown log level {0:?}")]
    UnknownLogLevel(String),
}

/// Check semantic rules serde cannot express.
pub fn validate_config(config: &RpcContextConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let timeouts = &config.timeouts;

    if timeouts.max_ms == 0 {
        errors.push(ValidationError::ZeroMaxTimeout);
    }
    if timeouts.default_ms > timeouts.max_ms {
        errors.push(ValidationError::DefaultExceedsMax {
            default_ms: timeouts.default_ms,
            max_ms: timeouts.max_ms,
        });
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&RpcContextConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = RpcContextConfig::default();
        config.timeouts.max_ms = 0;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroMaxTimeout,
                ValidationError::DefaultExceedsMax {
                    default_ms: 1_000,
                    max_ms: 0
                },
                ValidationError::UnknownLogLevel("loud".into()),
            ]
        );
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut config = RpcContextConfig::default();
        config.observability.log_level = "DEBUG".into();
        assert!(validate_config(&config).is_ok());
    }
}
