//! Ordered, ejectable interceptor chains.
//!
//! Slot ids are indexes into the registration list. Ejecting a slot clears
//! its hooks and marks it inactive; the slot itself is never removed, so ids
//! stay valid and are never reused.

use std::sync::Arc;

use parking_lot::RwLock;

use tether_core::Error;

/// Fulfilment hook: receives the value and returns the (possibly modified) value.
pub type OnFulfilled<T> = Arc<dyn Fn(T) -> Result<T, Error> + Send + Sync>;

/// Rejection hook: observes the error raised by its paired fulfilment hook.
pub type OnRejected = Arc<dyn Fn(&Error) + Send + Sync>;

struct Slot<T> {
    active: bool,
    on_fulfilled: Option<OnFulfilled<T>>,
    on_rejected: Option<OnRejected>,
}

/// Interceptor chain over values of type `T`.
pub struct InterceptorChain<T> {
    slots: RwLock<Vec<Slot<T>>>,
}

impl<T> Default for InterceptorChain<T> {
    fn default() -> Self {
        Self { slots: RwLock::new(Vec::new()) }
    }
}

impl<T> InterceptorChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook pair and return its id.
    pub fn register<F>(&self, on_fulfilled: F, on_rejected: Option<OnRejected>) -> usize
    where
        F: Fn(T) -> Result<T, Error> + Send + Sync + 'static,
    {
        let on_fulfilled: OnFulfilled<T> = Arc::new(on_fulfilled);
        self.register_hooks(Some(on_fulfilled), on_rejected)
    }

    /// Append a slot whose hooks are both optional and return its id.
    ///
    /// A slot without a fulfilment hook passes the value through unchanged.
    /// Its rejection hook then never fires, since it only observes failures
    /// of its own fulfilment hook.
    pub fn register_hooks(&self, on_fulfilled: Option<OnFulfilled<T>>, on_rejected: Option<OnRejected>) -> usize {
        let mut slots = self.slots.write();
        slots.push(Slot { active: true, on_fulfilled, on_rejected });
        slots.len() - 1
    }

    /// Append a fulfilment hook with a rejection observer.
    pub fn register_with_rejection<F, R>(&self, on_fulfilled: F, on_rejected: R) -> usize
    where
        F: Fn(T) -> Result<T, Error> + Send + Sync + 'static,
        R: Fn(&Error) + Send + Sync + 'static,
    {
        self.register(on_fulfilled, Some(Arc::new(on_rejected)))
    }

    /// Deactivate the slot with `id`. Returns false for unknown or already ejected ids.
    pub fn eject(&self, id: usize) -> bool {
        let mut slots = self.slots.write();
        match slots.get_mut(id) {
            Some(slot) if slot.active => {
                slot.active = false;
                slot.on_fulfilled = None;
                slot.on_rejected = None;
                true
            }
            _ => false,
        }
    }

    /// Total slots ever registered, ejected ones included.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.slots.read().iter().filter(|slot| slot.active).count()
    }

    /// Thread `value` through every active hook in registration order.
    ///
    /// When a hook fails, its rejection hook (if any) sees the error and the
    /// error is returned unchanged. Hooks run outside the lock.
    pub fn run(&self, value: T) -> Result<T, Error> {
        let hooks: Vec<(OnFulfilled<T>, Option<OnRejected>)> = self
            .slots
            .read()
            .iter()
            .filter(|slot| slot.active)
            .filter_map(|slot| slot.on_fulfilled.clone().map(|f| (f, slot.on_rejected.clone())))
            .collect();

        let mut value = value;
        for (on_fulfilled, on_rejected) in hooks {
            value = match on_fulfilled(value) {
                Ok(next) => next,
                Err(err) => {
                    if let Some(on_rejected) = on_rejected {
                        on_rejected(&err);
                    }
                    return Err(err);
                }
            };
        }
        Ok(value)
    }
}

impl<T> std::fmt::Debug for InterceptorChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("slots", &self.len())
            .field("active", &self.active_count())
            .finish()
    }
}
