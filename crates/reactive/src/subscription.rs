//! Listener bookkeeping shared by nodes and flags.
//!
//! Listeners are stored behind `Rc` so a notifier can take a snapshot of the
//! current set, release every borrow, and then call out. A listener that
//! subscribes or unsubscribes while being notified only affects later
//! notifications.

use hashbrown::HashMap;
use std::rc::Rc;

/// Unique identifier for a listener within its set.
pub type ListenerId = u64;

/// A set of listeners keyed by registration id.
pub struct Listeners<F: ?Sized> {
    /// Registered listeners
    entries: HashMap<ListenerId, Rc<F>>,
    /// Next listener ID to assign
    next_id: ListenerId,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> Listeners<F> {
    /// Creates an empty listener set.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a listener.
    ///
    /// Returns the ID that can be used to remove it.
    pub fn add(&mut self, listener: Rc<F>) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, listener);
        id
    }

    /// Removes a listener by ID.
    ///
    /// Returns true if the listener was found and removed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Returns the current listeners in registration order.
    pub fn snapshot(&self) -> Vec<Rc<F>> {
        let mut ids: Vec<ListenerId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.entries.get(&id).cloned())
            .collect()
    }

    /// Returns the number of registered listeners.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no listeners.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every listener.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Callback = dyn Fn(i32);

    #[test]
    fn test_add_remove() {
        let mut listeners: Listeners<Callback> = Listeners::new();
        let a = listeners.add(Rc::new(|_| {}));
        let b = listeners.add(Rc::new(|_| {}));
        assert_ne!(a, b);
        assert_eq!(listeners.len(), 2);

        assert!(listeners.remove(a));
        assert!(!listeners.remove(a));
        assert_eq!(listeners.len(), 1);

        listeners.clear();
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_snapshot_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners: Listeners<Callback> = Listeners::new();
        for tag in 0..5 {
            let seen = seen.clone();
            listeners.add(Rc::new(move |v| seen.borrow_mut().push((tag, v))));
        }

        for listener in listeners.snapshot() {
            listener(7);
        }
        let tags: Vec<i32> = seen.borrow().iter().map(|(tag, _)| *tag).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_snapshot_isolated_from_later_changes() {
        let mut listeners: Listeners<Callback> = Listeners::new();
        let id = listeners.add(Rc::new(|_| {}));
        let snapshot = listeners.snapshot();
        listeners.remove(id);
        listeners.add(Rc::new(|_| {}));
        listeners.add(Rc::new(|_| {}));
        assert_eq!(snapshot.len(), 1);
    }
}
