//! Registry of cancellation handles for in-flight requests.
//!
//! One handle per request id. Registering an id that is already present
//! replaces the old handle: the superseded request keeps running but can no
//! longer be cancelled by id. Each registration carries a generation number so
//! that, when it ends, it only removes its own handle and never a newer one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

struct Handle {
    generation: u64,
    token: CancellationToken,
}

/// Request id → cancellation token, for requests currently in flight.
#[derive(Default)]
pub struct CancellationRegistry {
    handles: Mutex<HashMap<String, Handle>>,
    generations: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token under `id`, replacing any existing handle.
    ///
    /// The returned guard removes the handle when dropped, on every exit path.
    pub fn register(&self, id: &str) -> Registration<'_> {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let previous = self
            .handles
            .lock()
            .insert(id.to_string(), Handle { generation, token: token.clone() });

        if previous.is_some() {
            tracing::warn!(request_id = %id, "request id already in flight; previous request is no longer cancellable");
        }

        Registration { registry: self, id: id.to_string(), generation, token }
    }

    /// Cancel and remove the handle for `id`. Returns false if none is registered.
    pub fn cancel(&self, id: &str) -> bool {
        let handle = self.handles.lock().remove(id);
        match handle {
            Some(handle) => {
                handle.token.cancel();
                tracing::debug!("cancelled request {}", id);
                true
            }
            None => false,
        }
    }

    /// Cancel and remove every handle. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(String, Handle)> = self.handles.lock().drain().collect();
        for (_, handle) in &drained {
            handle.token.cancel();
        }
        if !drained.is_empty() {
            tracing::debug!("cancelled {} in-flight requests", drained.len());
        }
        drained.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handles.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Ids currently registered, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handles.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn release(&self, id: &str, generation: u64) {
        let mut handles = self.handles.lock();
        if handles.get(id).is_some_and(|handle| handle.generation == generation) {
            handles.remove(id);
        }
    }
}

impl std::fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationRegistry").field("in_flight", &self.len()).finish()
    }
}

/// A live registration. Dropping it deregisters the handle if it is still current.
pub struct Registration<'a> {
    registry: &'a CancellationRegistry,
    id: String,
    generation: u64,
    token: CancellationToken,
}

impl Registration<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_drop_deregisters() {
        let registry = CancellationRegistry::new();
        {
            let registration = registry.register("req-1");
            assert_eq!(registration.id(), "req-1");
            assert!(registry.contains("req-1"));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_signals_and_removes() {
        let registry = CancellationRegistry::new();
        let registration = registry.register("req-1");

        assert!(registry.cancel("req-1"));
        assert!(registration.token().is_cancelled());
        assert!(!registry.contains("req-1"));
        assert!(!registry.cancel("req-1"));
    }

    #[test]
    fn test_cancel_unknown_is_noop() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel("missing"));
    }

    #[test]
    fn test_cancel_all() {
        let registry = CancellationRegistry::new();
        let a = registry.register("a");
        let b = registry.register("b");

        assert_eq!(registry.cancel_all(), 2);
        assert!(a.token().is_cancelled());
        assert!(b.token().is_cancelled());
        assert!(registry.is_empty());
        assert_eq!(registry.cancel_all(), 0);
    }

    #[test]
    fn test_duplicate_id_overwrites_previous_handle() {
        let registry = CancellationRegistry::new();
        let first = registry.register("dup");
        let second = registry.register("dup");
        assert_eq!(registry.len(), 1);

        assert!(registry.cancel("dup"));
        assert!(second.token().is_cancelled());
        assert!(!first.token().is_cancelled());
    }

    #[test]
    fn test_superseded_registration_does_not_remove_newer_handle() {
        let registry = CancellationRegistry::new();
        let first = registry.register("dup");
        let second = registry.register("dup");

        drop(first);
        assert!(registry.contains("dup"));

        drop(second);
        assert!(!registry.contains("dup"));
    }

    #[test]
    fn test_ids_sorted() {
        let registry = CancellationRegistry::new();
        let _b = registry.register("b");
        let _a = registry.register("a");
        assert_eq!(registry.ids(), vec!["a".to_string(), "b".to_string()]);
    }
}
