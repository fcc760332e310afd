//! In-memory response cache.
//!
//! This module provides the bounded store the client keeps completed
//! responses in. It supports:
//!
//! - Per-entry TTL, checked lazily on access and swept on every write
//! - LRU eviction once the configured capacity is reached
//! - Pattern-based invalidation (substring or regex)
//! - Deterministic request fingerprints for keys

pub mod clock;
pub mod key;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{compute_cache_key, invalidation_pattern};
pub use store::{CacheStore, Pattern};
