//! Named publish/subscribe primitive.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::DeferredQueue;

/// Subscriber callback.  Receives the event payload by reference.
pub type Callback<T> = Rc<dyn Fn(&T)>;

static NEXT_OBSERVABLE_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of an observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservableId(u32);

/// Opaque handle returned by [`Observable::subscribe`].  Only meaningful
/// for the observable that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u32);

/// Configured dispatch mode (see [`Dispatch`] for the runtime form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    #[default]
    Immediate,
    Deferred,
}

/// How an observable delivers events to its subscribers.
#[derive(Debug, Clone, Default)]
pub enum Dispatch {
    /// Invoke subscribers synchronously, in subscription order.
    #[default]
    Immediate,
    /// Queue one job per subscriber on the shared queue.
    Deferred(DeferredQueue),
}

impl Dispatch {
    /// Resolve a configured mode against the shared queue.
    pub fn from_mode(mode: DispatchMode, queue: &DeferredQueue) -> Self {
        match mode {
            DispatchMode::Immediate => Self::Immediate,
            DispatchMode::Deferred => Self::Deferred(queue.clone()),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        match self {
            Self::Immediate => DispatchMode::Immediate,
            Self::Deferred(_) => DispatchMode::Deferred,
        }
    }
}

struct Subscriber<T> {
    id: SubscriptionId,
    callback: Callback<T>,
}

struct Inner<T> {
    id: ObservableId,
    name: String,
    dispatch: Dispatch,
    subscribers: RefCell<Vec<Subscriber<T>>>,
    next_subscription: Cell<u32>,
}

/// A named event source with an ordered list of subscribers.
///
/// Cloning yields another handle to the same observable.
pub struct Observable<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("name", &self.inner.name)
            .field("mode", &self.inner.dispatch.mode())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T: Clone + 'static> Observable<T> {
    pub fn new(name: impl Into<String>, dispatch: &Dispatch) -> Self {
        Self {
            inner: Rc::new(Inner {
                id: ObservableId(NEXT_OBSERVABLE_ID.fetch_add(1, Ordering::Relaxed)),
                name: name.into(),
                dispatch: dispatch.clone(),
                subscribers: RefCell::new(Vec::new()),
                next_subscription: Cell::new(0),
            }),
        }
    }

    /// Shorthand for an immediate-mode observable.
    pub fn immediate(name: impl Into<String>) -> Self {
        Self::new(name, &Dispatch::Immediate)
    }

    /// Add a subscriber at the end of the dispatch order.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.get());
        self.inner.next_subscription.set(id.0.wrapping_add(1));
        self.inner.subscribers.borrow_mut().push(Subscriber {
            id,
            callback: Rc::new(callback),
        });
        id
    }

    /// Deliver `payload` to every current subscriber.
    ///
    /// The subscriber list is snapshotted first, so callbacks may subscribe
    /// or unsubscribe on any observable, this one included; changes take
    /// effect from the next notification.
    pub fn notify(&self, payload: &T) {
        let snapshot: Vec<Callback<T>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|s| Rc::clone(&s.callback))
            .collect();

        match &self.inner.dispatch {
            Dispatch::Immediate => {
                for callback in snapshot {
                    callback(payload);
                }
            }
            Dispatch::Deferred(queue) => {
                for callback in snapshot {
                    let payload = payload.clone();
                    queue.push(move || callback(&payload));
                }
            }
        }
    }
}

impl<T> Observable<T> {
    /// Remove a subscriber.  Unknown handles are ignored; returns whether
    /// anything was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        match subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                // `remove`, not `swap_remove`: dispatch order must survive.
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn id(&self) -> ObservableId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.inner.dispatch
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.borrow().iter().any(|s| s.id == id)
    }
}
