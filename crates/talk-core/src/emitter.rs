//! Named-event observer registry
//!
//! Handlers are keyed by event name and may be added or removed at any time,
//! including from inside a handler that is currently being invoked.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque token returned by [`Emitter::add_handler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Emitter<T: ?Sized> {
    handlers: RwLock<HashMap<String, Vec<(HandlerId, Handler<T>)>>>,
    next_id: AtomicU64,
}

impl<T: ?Sized> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let counts: HashMap<&str, usize> =
            handlers.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("Emitter").field("handlers", &counts).finish()
    }
}

impl<T: ?Sized> Emitter<T> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for `key`
    pub fn add_handler<F>(&self, key: &str, handler: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(key.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered under `key`.
    pub fn remove_handler(&self, key: &str, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(key) else {
            return false;
        };

        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;

        if list.is_empty() {
            handlers.remove(key);
        }
        removed
    }

    /// Invoke every handler registered for `key`, in registration order
    pub fn emit(&self, key: &str, value: &T) {
        // Snapshot so handlers can add/remove handlers without deadlocking
        let snapshot: Vec<Handler<T>> = match self.handlers.read().get(key) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return,
        };

        for handler in snapshot {
            handler(value);
        }
    }

    #[cfg(test)]
    pub(crate) fn handler_count(&self, key: &str) -> usize {
        self.handlers.read().get(key).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_reaches_handlers_in_order() {
        let emitter: Emitter<u32> = Emitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        emitter.add_handler("change", move |v| a.lock().unwrap().push(("a", *v)));
        let b = Arc::clone(&seen);
        emitter.add_handler("change", move |v| b.lock().unwrap().push(("b", *v)));

        emitter.emit("change", &7);
        emitter.emit("other", &8);

        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_remove_handler() {
        let emitter: Emitter<u32> = Emitter::new();
        let count = Arc::new(Mutex::new(0));

        let c = Arc::clone(&count);
        let id = emitter.add_handler("change", move |_| *c.lock().unwrap() += 1);

        emitter.emit("change", &1);
        assert!(emitter.remove_handler("change", id));
        assert!(!emitter.remove_handler("change", id));
        emitter.emit("change", &1);

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(emitter.handler_count("change"), 0);
    }

    #[test]
    fn test_handler_can_register_during_emit() {
        let emitter: Arc<Emitter<u32>> = Arc::new(Emitter::new());
        let inner = Arc::clone(&emitter);

        emitter.add_handler("change", move |_| {
            inner.add_handler("change", |_| {});
        });

        emitter.emit("change", &1);
        assert_eq!(emitter.handler_count("change"), 2);
    }
}
