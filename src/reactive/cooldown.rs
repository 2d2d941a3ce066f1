use core::cell::Cell;
use core::fmt;
use std::rc::{Rc, Weak};

use log::{trace, warn};

use super::{Observable, SubscriptionId};
use crate::error::Result;
use crate::timer::{TimerMode, TimerService, TimerSlot};

struct Inner<T: Clone + 'static> {
    observable: Observable<T>,
    source: Observable<T>,
    subscription: Cell<Option<SubscriptionId>>,
    armed: Cell<bool>,
    period_ms: u32,
    timer: TimerSlot,
}

impl<T: Clone + 'static> Inner<T> {
    fn forward(self: &Rc<Self>, event: &T) {
        if self.period_ms > 0 {
            if !self.armed.get() {
                trace!("cooldown {}: dropped", self.observable.name());
                return;
            }
            self.armed.set(false);

            let weak: Weak<Self> = Rc::downgrade(self);
            let rearm = Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.armed.set(true);
                }
            });
            if let Err(e) = self.timer.arm(self.period_ms, TimerMode::OneShot, rearm) {
                warn!("cooldown {}: {}, not rate limiting", self.observable.name(), e);
                self.armed.set(true);
            }
        }
        self.observable.notify(event);
    }
}

impl<T: Clone + 'static> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.source.unsubscribe(id);
        }
        self.timer.cancel();
    }
}

/// Leading-edge rate limiter over another observable.
///
/// The first source event in a window is re-emitted immediately and starts
/// a one-shot timer of `period_ms`; further events before it expires are
/// dropped, never queued.  A zero period forwards everything.
///
/// The relay always dispatches immediately, carries the source's name and
/// holds one timer slot for its lifetime.
pub struct Cooldown<T: Clone + 'static> {
    inner: Rc<Inner<T>>,
}

impl<T: Clone + 'static> Clone for Cooldown<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> fmt::Debug for Cooldown<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cooldown")
            .field("name", &self.inner.observable.name())
            .field("period_ms", &self.inner.period_ms)
            .field("armed", &self.inner.armed.get())
            .finish()
    }
}

impl<T: Clone + 'static> Cooldown<T> {
    pub fn new(source: &Observable<T>, period_ms: u32, timers: &dyn TimerService) -> Result<Self> {
        let timer = timers.acquire("cooldown")?;
        let inner = Rc::new(Inner {
            observable: Observable::immediate(source.name()),
            source: source.clone(),
            subscription: Cell::new(None),
            armed: Cell::new(true),
            period_ms,
            timer,
        });

        let weak = Rc::downgrade(&inner);
        let id = source.subscribe(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.forward(event);
            }
        });
        inner.subscription.set(Some(id));

        Ok(Self { inner })
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> SubscriptionId {
        self.inner.observable.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observable.unsubscribe(id)
    }

    pub fn observable(&self) -> &Observable<T> {
        &self.inner.observable
    }

    pub fn name(&self) -> &str {
        self.inner.observable.name()
    }

    /// `true` when the next source event will be forwarded.
    pub fn is_armed(&self) -> bool {
        self.inner.armed.get()
    }

    pub fn period_ms(&self) -> u32 {
        self.inner.period_ms
    }
}
