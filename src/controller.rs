//! AND-aggregation of criteria into a single "ready" event.

use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use crate::criteria::Criterion;
use crate::error::{Error, Result};
use crate::reactive::{Observable, ObservableId, SubscriptionId};

/// Maximum criteria per controller.
pub const MAX_CRITERIA: usize = 8;

struct Member {
    criterion: Rc<dyn Criterion>,
    subscription: SubscriptionId,
}

impl Member {
    fn id(&self) -> ObservableId {
        self.criterion.observable().id()
    }
}

struct Inner {
    ready: Observable<()>,
    members: RefCell<heapless::Vec<Member, MAX_CRITERIA>>,
}

impl Inner {
    fn evaluate(&self) -> bool {
        self.members
            .borrow()
            .iter()
            .filter(|m| m.criterion.is_active())
            .all(|m| m.criterion.is_valid())
    }

    fn on_criterion_event(&self) {
        if self.evaluate() {
            self.ready.notify(&());
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for member in self.members.get_mut().iter() {
            member.criterion.observable().unsubscribe(member.subscription);
        }
    }
}

/// Fires "ready" on every criterion event after which all *active* member
/// criteria are valid.  With no active members the condition holds
/// vacuously.
///
/// The event repeats for as long as the condition holds; subscribers
/// that need edges must de-duplicate themselves.  Always dispatches
/// immediately.
#[derive(Clone)]
pub struct Controller {
    inner: Rc<Inner>,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .inner
            .members
            .borrow()
            .iter()
            .map(|m| m.criterion.name().to_string())
            .collect();
        f.debug_struct("Controller")
            .field("name", &self.inner.ready.name())
            .field("criteria", &names)
            .finish()
    }
}

impl Controller {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(Inner {
                ready: Observable::immediate(name),
                members: RefCell::new(heapless::Vec::new()),
            }),
        }
    }

    /// Wire a criterion in.  Adding one that is already a member is a
    /// no-op.
    pub fn add<C: Criterion + Clone + 'static>(&self, criterion: &C) -> Result<()> {
        let id = criterion.observable().id();
        if self.inner.members.borrow().iter().any(|m| m.id() == id) {
            return Ok(());
        }

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let subscription = criterion.observable().subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.on_criterion_event();
            }
        });

        let member = Member {
            criterion: Rc::new(criterion.clone()),
            subscription,
        };
        if let Err(member) = self.inner.members.borrow_mut().push(member) {
            member.criterion.observable().unsubscribe(member.subscription);
            return Err(Error::Config("too many criteria for one controller"));
        }
        Ok(())
    }

    /// Unwire a criterion.  Returns `false` if it was not a member.
    pub fn remove<C: Criterion>(&self, criterion: &C) -> bool {
        let id = criterion.observable().id();
        let mut members = self.inner.members.borrow_mut();
        let Some(index) = members.iter().position(|m| m.id() == id) else {
            return false;
        };
        let member = members.remove(index);
        member.criterion.observable().unsubscribe(member.subscription);
        true
    }

    /// Current value of the readiness condition.
    pub fn is_ready(&self) -> bool {
        self.inner.evaluate()
    }

    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self, callback: impl Fn(&()) + 'static) -> SubscriptionId {
        self.inner.ready.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.ready.unsubscribe(id)
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.ready.is_subscribed(id)
    }

    pub fn observable(&self) -> &Observable<()> {
        &self.inner.ready
    }
}
