//! Configuration validation rules.
//!
//! This module provides validation logic for `ClientConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{ClientConfig, ValidatorKind};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl ClientConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is 0 or exceeds 5 minutes
    /// - `cache.max_size` is 0
    /// - `retry.attempts` is 0
    /// - `retry.initial_delay_ms` exceeds `retry.max_delay_ms`
    /// - `validator_type` names an unknown validator
    /// - `base_url` is set but not an absolute http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be greater than 0".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.cache.max_size == 0 {
            return Err(ConfigError::Invalid { field: "cache.max_size".into(), reason: "must be at least 1".into() });
        }

        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.attempts".into(),
                reason: "must be at least 1 (the first attempt counts)".into(),
            });
        }
        if let Some(max) = self.retry.max_delay_ms
            && self.retry.initial_delay_ms > max
        {
            return Err(ConfigError::Invalid {
                field: "retry.initial_delay_ms".into(),
                reason: format!("must not exceed retry.max_delay_ms ({}ms)", max),
            });
        }

        if let Err(e) = self.validator_type.parse::<ValidatorKind>() {
            return Err(ConfigError::Invalid { field: "validator_type".into(), reason: e.to_string() });
        }

        if let Some(base) = &self.base_url {
            match url::Url::parse(base) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => {
                    return Err(ConfigError::Invalid {
                        field: "base_url".into(),
                        reason: format!("unsupported scheme: {}", parsed.scheme()),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::Invalid { field: "base_url".into(), reason: e.to_string() });
                }
            }
        }

        if !self.validate_response && self.validator_type != ValidatorKind::default().as_str() {
            tracing::warn!(
                validator_type = %self.validator_type,
                "validator_type is set but validate_response is disabled; schemas will be ignored"
            );
        }

        Ok(())
    }
}
