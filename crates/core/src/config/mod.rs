//! Client configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TETHER_*, nested with `__`)
//! 2. TOML config file (if TETHER_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Only the serializable part of the client lives here. Hooks (transformers,
//! interceptors, retry predicates) are attached on the client builder.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::Error;

mod validation;

pub use validation::ConfigError;

/// Default per-attempt deadline.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default cache lifetime when a call does not set one.
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;

/// Default cache capacity.
pub const DEFAULT_CACHE_MAX_SIZE: usize = 100;

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    Linear,
    #[default]
    Exponential,
}

/// Validation mechanisms a client can be configured with.
///
/// This is a closed set. Names coming from configuration are parsed with
/// [`FromStr`], which rejects unknown kinds with `Error::Configuration`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ValidatorKind {
    /// Deserialize into a Rust type with serde.
    #[default]
    Serde,
    /// JSON Schema document checked with the `jsonschema` crate.
    JsonSchema,
    /// User-supplied predicate.
    Guard,
}

impl ValidatorKind {
    pub const ALL: [ValidatorKind; 3] = [ValidatorKind::Serde, ValidatorKind::JsonSchema, ValidatorKind::Guard];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorKind::Serde => "serde",
            ValidatorKind::JsonSchema => "jsonschema",
            ValidatorKind::Guard => "guard",
        }
    }
}

impl FromStr for ValidatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serde" => Ok(ValidatorKind::Serde),
            "jsonschema" | "json_schema" => Ok(ValidatorKind::JsonSchema),
            "guard" => Ok(ValidatorKind::Guard),
            other => Err(Error::Configuration(format!(
                "unsupported validator type '{}' (expected one of: serde, jsonschema, guard)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum number of cached responses.
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    /// Lifetime for cached responses when the call does not set one.
    #[serde(default = "default_cache_ttl_ms")]
    pub default_ttl_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { max_size: default_cache_max_size(), default_ttl_ms: default_cache_ttl_ms() }
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

/// Retry settings. The custom predicate is attached on the client builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrySettings {
    /// Total attempt budget, counting the first attempt.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default)]
    pub backoff: Backoff,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single backoff delay. `None` leaves it uncapped.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff: Backoff::default(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Client configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TETHER_*)
/// 2. TOML config file (if TETHER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Prefix for relative request URLs.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Headers sent with every request, under per-call headers.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,

    /// Per-attempt deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether configured schemas are checked against responses.
    #[serde(default = "default_true")]
    pub validate_response: bool,

    /// Validation mechanism name: serde, jsonschema or guard.
    #[serde(default = "default_validator_type")]
    pub validator_type: String,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_validator_type() -> String {
    ValidatorKind::default().as_str().into()
}

fn default_cache_max_size() -> usize {
    DEFAULT_CACHE_MAX_SIZE
}

fn default_cache_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

fn default_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_headers: BTreeMap::new(),
            timeout_ms: default_timeout_ms(),
            validate_response: true,
            validator_type: default_validator_type(),
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl ClientConfig {
    /// Timeout as Duration for use with tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed validator kind.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an unknown validator name.
    pub fn validator_kind(&self) -> Result<ValidatorKind, Error> {
        self.validator_type.parse()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TETHER_`
    /// 2. TOML file from `TETHER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TETHER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(Self::env_provider()))
    }

    /// Load from a TOML string layered over the defaults. Environment is not read.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Toml::string(toml)))
    }

    fn env_provider() -> Env {
        Env::prefixed("TETHER_")
            .ignore(&["CONFIG_FILE"])
            .map(|key| key.as_str().to_lowercase().into())
            .split("__")
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
