//! Per-zone "cap reached" indicator LED.
//!
//! Mirrors a zone's [`Cap`] criterion: lit while the cap is invalid (the
//! zone has used up its daily pump time), dark otherwise.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use log::warn;

use crate::app::ports::DigitalOutput;
use crate::criteria::{Cap, Criterion};
use crate::reactive::SubscriptionId;

struct Inner {
    output: RefCell<Box<dyn DigitalOutput>>,
    cap: Cap,
    subscription: Cell<Option<SubscriptionId>>,
}

impl Inner {
    fn show(&self, cap_valid: bool) {
        let mut output = self.output.borrow_mut();
        let result = if cap_valid { output.set_low() } else { output.set_high() };
        if let Err(e) = result {
            warn!("{} indicator: {}", self.cap.name(), e);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.cap.observable().unsubscribe(id);
        }
    }
}

pub struct CapIndicator {
    inner: Rc<Inner>,
}

impl CapIndicator {
    pub fn new(cap: &Cap, output: Box<dyn DigitalOutput>) -> Self {
        let inner = Rc::new(Inner {
            output: RefCell::new(output),
            cap: cap.clone(),
            subscription: Cell::new(None),
        });
        inner.show(cap.is_valid());

        let weak = Rc::downgrade(&inner);
        let id = cap.observable().subscribe(move |valid| {
            if let Some(inner) = weak.upgrade() {
                inner.show(*valid);
            }
        });
        inner.subscription.set(Some(id));

        Self { inner }
    }

    pub fn is_lit(&self) -> bool {
        self.inner.output.borrow_mut().is_set_high().unwrap_or(false)
    }
}
