use core::cell::RefCell;
use std::rc::{Rc, Weak};

use log::warn;

use super::{Criterion, CriterionState};
use crate::error::Result;
use crate::reactive::{Dispatch, Observable};
use crate::timer::{TimerMode, TimerService, TimerSlot};

struct Inner {
    state: CriterionState,
    period_ms: u32,
    timer: TimerSlot,
    detach: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Inner {
    fn on_source_event(self: &Rc<Self>) {
        let validity = self.state.validity();
        if self.period_ms == 0 {
            validity.set(true);
            return;
        }

        let weak: Weak<Self> = Rc::downgrade(self);
        let expire = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.state.validity().set(true);
            }
        });
        if let Err(e) = self.timer.arm(self.period_ms, TimerMode::OneShot, expire) {
            // Without a timer the window would never close.
            warn!("{}: {}, skipping quiet period", validity.name(), e);
            validity.set(true);
            return;
        }
        validity.set(false);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.get_mut().take() {
            detach();
        }
        self.timer.cancel();
    }
}

/// Quiet period after every source event.
///
/// Valid until the source dispatches, then invalid for `period_ms`.  The
/// window is tracked even while the criterion is inactive.
#[derive(Clone)]
pub struct CooldownCriterion {
    inner: Rc<Inner>,
}

impl CooldownCriterion {
    pub fn new<T: Clone + 'static>(
        name: impl Into<String>,
        source: &Observable<T>,
        period_ms: u32,
        timers: &dyn TimerService,
        dispatch: &Dispatch,
    ) -> Result<Self> {
        let timer = timers.acquire("cooldown-criterion")?;
        let inner = Rc::new(Inner {
            state: CriterionState::new(name, true, dispatch),
            period_ms,
            timer,
            detach: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let id = source.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.on_source_event();
            }
        });
        let source = source.clone();
        *inner.detach.borrow_mut() = Some(Box::new(move || {
            source.unsubscribe(id);
        }));

        Ok(Self { inner })
    }

    pub fn period_ms(&self) -> u32 {
        self.inner.period_ms
    }

    /// `true` while a quiet period is running.
    pub fn is_cooling(&self) -> bool {
        self.inner.timer.is_armed()
    }
}

impl Criterion for CooldownCriterion {
    fn name(&self) -> &str {
        self.inner.state.validity().name()
    }

    fn is_active(&self) -> bool {
        self.inner.state.is_active()
    }

    fn activate(&self) {
        self.inner.state.set_active(true);
    }

    fn deactivate(&self) {
        self.inner.state.set_active(false);
    }

    fn is_valid(&self) -> bool {
        self.inner.state.validity().get()
    }

    fn observable(&self) -> &Observable<bool> {
        self.inner.state.validity().observable()
    }
}
