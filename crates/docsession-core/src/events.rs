//! Typed event buses.
//!
//! Each publisher owns one [`EventBus`] per event type. Listeners are called
//! in subscription order on the emitting thread, outside the bus lock, so a
//! listener may subscribe or unsubscribe while being called. A panicking
//! listener does not stop delivery to the others; the panic is returned in
//! the [`EmitReport`] so the publisher can report it.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Identifier returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Outcome of one [`EventBus::emit`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub delivered: usize,
    /// Panic messages of listeners that failed.
    pub panics: Vec<String>,
}

impl EmitReport {
    pub fn is_clean(&self) -> bool {
        self.panics.is_empty()
    }
}

/// Multicast publisher for events of type `E`.
///
/// # Examples
///
/// ```
/// use docsession_core::events::EventBus;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let bus = EventBus::<u32>::new();
/// let total = Arc::new(AtomicUsize::new(0));
/// let sink = Arc::clone(&total);
/// let id = bus.subscribe(move |value| {
///     sink.fetch_add(*value as usize, Ordering::SeqCst);
/// });
///
/// bus.emit(&3);
/// assert!(bus.unsubscribe(id));
/// bus.emit(&4);
/// assert_eq!(total.load(Ordering::SeqCst), 3);
/// ```
pub struct EventBus<E> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener<E>)>>,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Drops every listener.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers `event` to a snapshot of the current listeners.
    pub fn emit(&self, event: &E) -> EmitReport {
        let snapshot: Vec<Listener<E>> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut report = EmitReport::default();
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => report.delivered += 1,
                Err(payload) => report.panics.push(panic_message(payload.as_ref())),
            }
        }
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Listener<E>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_all_listeners_in_order() {
        let bus = EventBus::<&'static str>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |event| seen.lock().unwrap().push(format!("{}:{}", tag, event)));
        }

        let report = bus.emit(&"opened");
        assert_eq!(report.delivered, 2);
        assert!(report.is_clean());
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:opened".to_string(), "second:opened".to_string()]
        );
    }

    #[test]
    fn test_unsubscribe_unknown_id() {
        let bus = EventBus::<()>::new();
        let id = bus.subscribe(|()| {});
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let bus = EventBus::<u8>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.subscribe(|_| panic!("listener exploded"));
        let counter = Arc::clone(&calls);
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let report = bus.emit(&1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.panics, vec!["listener exploded".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let bus = Arc::new(EventBus::<u8>::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let weak_bus = Arc::downgrade(&bus);
        let own_id = Arc::clone(&slot);
        let counter = Arc::clone(&calls);
        let id = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let (Some(bus), Some(id)) = (weak_bus.upgrade(), *own_id.lock().unwrap()) {
                bus.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        bus.emit(&1);
        bus.emit(&2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_drops_listeners() {
        let bus = EventBus::<u8>::new();
        bus.subscribe(|_| {});
        bus.subscribe(|_| {});
        bus.clear();
        assert_eq!(bus.emit(&0).delivered, 0);
    }
}
