//! Observable booleans.
//!
//! A [`Flag`] holds one boolean and notifies its subscribers whenever the
//! value actually changes. Writable rows expose their edit and submission
//! state this way.

use crate::subscription::{ListenerId, Listeners};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// An observable boolean.
///
/// # Example
///
/// ```rust
/// use quarry_reactive::Flag;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let flag = Flag::new(false);
/// let seen = Rc::new(Cell::new(None));
/// let sink = seen.clone();
/// flag.subscribe(move |value| sink.set(Some(value)));
///
/// assert!(flag.set(true));
/// assert_eq!(seen.get(), Some(true));
/// assert!(!flag.set(true));
/// ```
pub struct Flag {
    value: Cell<bool>,
    listeners: RefCell<Listeners<dyn Fn(bool)>>,
}

impl Flag {
    /// Creates a flag with an initial value.
    pub fn new(value: bool) -> Self {
        Self {
            value: Cell::new(value),
            listeners: RefCell::new(Listeners::new()),
        }
    }

    /// Returns the current value.
    #[inline]
    pub fn get(&self) -> bool {
        self.value.get()
    }

    /// Sets the value, notifying subscribers if it changed.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: bool) -> bool {
        if self.value.replace(value) == value {
            return false;
        }
        let listeners = self.listeners.borrow().snapshot();
        for listener in listeners {
            listener(value);
        }
        true
    }

    /// Subscribes to value changes.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(bool) + 'static,
    {
        self.listeners.borrow_mut().add(Rc::new(listener))
    }

    /// Unsubscribes by ID. Returns true if the subscription existed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.borrow_mut().remove(id)
    }

    /// Returns the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Flag").field(&self.value.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_notifies_on_change_only() {
        let flag = Flag::new(false);
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        flag.subscribe(move |_| counter.set(counter.get() + 1));

        assert!(!flag.set(false));
        assert!(flag.set(true));
        assert!(!flag.set(true));
        assert!(flag.set(false));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let flag = Flag::default();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let id = flag.subscribe(move |_| counter.set(counter.get() + 1));
        assert_eq!(flag.subscriber_count(), 1);
        assert!(flag.unsubscribe(id));
        flag.set(true);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_listener_may_read_flag() {
        let flag = Rc::new(Flag::new(false));
        let seen = Rc::new(Cell::new(false));
        let (f, s) = (Rc::downgrade(&flag), seen.clone());
        flag.subscribe(move |_| {
            if let Some(flag) = f.upgrade() {
                s.set(flag.get());
            }
        });
        flag.set(true);
        assert!(seen.get());
    }
}
