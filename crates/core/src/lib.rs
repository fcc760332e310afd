//! Core types and shared functionality for tether.
//!
//! This crate provides:
//! - In-memory TTL + LRU response cache
//! - Unified error types
//! - Configuration structures with layered loading

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheStore, Clock, ManualClock, Pattern, SystemClock};
pub use config::{Backoff, CacheSettings, ClientConfig, ConfigError, RetrySettings, ValidatorKind};
pub use error::{Error, ErrorKind};
