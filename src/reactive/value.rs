use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use super::{Dispatch, Observable, SubscriptionId};

/// An observable holding its latest value.
///
/// [`set`](Self::set) always dispatches, even when the value is unchanged:
/// polling-style criteria rely on every sample producing an event.
pub struct Value<T> {
    observable: Observable<T>,
    current: Rc<RefCell<T>>,
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            observable: self.observable.clone(),
            current: Rc::clone(&self.current),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("name", &self.observable.name())
            .field("current", &*self.current.borrow())
            .finish()
    }
}

impl<T: Clone + 'static> Value<T> {
    pub fn new(name: impl Into<String>, initial: T, dispatch: &Dispatch) -> Self {
        Self {
            observable: Observable::new(name, dispatch),
            current: Rc::new(RefCell::new(initial)),
        }
    }

    pub fn immediate(name: impl Into<String>, initial: T) -> Self {
        Self::new(name, initial, &Dispatch::Immediate)
    }

    pub fn get(&self) -> T {
        self.current.borrow().clone()
    }

    /// Store `value` and notify every subscriber.
    pub fn set(&self, value: T) {
        let payload = value.clone();
        *self.current.borrow_mut() = value;
        self.observable.notify(&payload);
    }

    /// Store `value` without notifying.
    pub(crate) fn store(&self, value: T) {
        *self.current.borrow_mut() = value;
    }

    /// Read-modify-write followed by a notification.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.current.borrow());
        self.set(next);
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> SubscriptionId {
        self.observable.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observable.unsubscribe(id)
    }
}

impl<T> Value<T> {
    pub fn observable(&self) -> &Observable<T> {
        &self.observable
    }

    pub fn name(&self) -> &str {
        self.observable.name()
    }
}
