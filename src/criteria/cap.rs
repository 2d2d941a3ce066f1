use core::cell::Cell;
use std::rc::{Rc, Weak};

use log::{info, warn};

use super::{Criterion, CriterionState};
use crate::reactive::{Dispatch, Observable, Sum, SubscriptionId};

struct Inner {
    state: CriterionState,
    sum: Sum<u32>,
    threshold: u32,
    subscription: Cell<Option<SubscriptionId>>,
}

impl Inner {
    fn on_total(&self, total: u32) {
        let validity = self.state.validity();
        let next = total < self.threshold;
        match (validity.get(), next) {
            (true, false) => warn!(
                "{}: cap reached ({} / {} ms)",
                validity.name(),
                total,
                self.threshold
            ),
            (false, true) => info!("{}: cap cleared", validity.name()),
            _ => {}
        }
        validity.set(next);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.sum.unsubscribe(id);
        }
    }
}

/// Cumulative-usage ceiling: valid while the underlying sum stays below
/// `threshold`.
///
/// Re-evaluated on every sum update.  Nothing resets the sum on its own;
/// call [`reset`](Self::reset) on a fixed cadence.
#[derive(Clone)]
pub struct Cap {
    inner: Rc<Inner>,
}

impl Cap {
    pub fn new(name: impl Into<String>, sum: &Sum<u32>, threshold: u32, dispatch: &Dispatch) -> Self {
        let inner = Rc::new(Inner {
            state: CriterionState::new(name, sum.get() < threshold, dispatch),
            sum: sum.clone(),
            threshold,
            subscription: Cell::new(None),
        });

        let weak: Weak<Inner> = Rc::downgrade(&inner);
        let id = sum.subscribe(move |total| {
            if let Some(inner) = weak.upgrade() {
                inner.on_total(*total);
            }
        });
        inner.subscription.set(Some(id));

        Self { inner }
    }

    /// Zero the underlying sum.  Validity follows through the sum's
    /// dispatch.
    pub fn reset(&self) {
        self.inner.sum.reset();
    }

    pub fn threshold(&self) -> u32 {
        self.inner.threshold
    }

    pub fn total(&self) -> u32 {
        self.inner.sum.get()
    }
}

impl Criterion for Cap {
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
        self.inner.sum.get() < self.inner.threshold
    }

    fn observable(&self) -> &Observable<bool> {
        self.inner.state.validity().observable()
    }
}
