//! Water pump driver (relay or MOSFET on one digital output).
//!
//! ## Run model
//!
//! `start(ms)` engages the output and arms a one-shot auto-stop timer;
//! `start(0)` holds the pump on until `stop()`.  Starting a running pump
//! is a no-op, so repeated start requests inside one run are absorbed.
//!
//! The pump is an observable value: every accepted start dispatches the
//! commanded duration, which feeds the cumulative-time sum behind the
//! daily cap and the cooldown criterion.
//!
//! `is_running()` reads the output back rather than trusting the timer,
//! so it stays correct for held runs and after a failed auto-stop.  A
//! failed readback counts as running: a second start is refused rather
//! than re-engaging and counting the run twice.

use core::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, error, info, warn};

use crate::app::ports::DigitalOutput;
use crate::error::Result;
use crate::reactive::{Dispatch, Observable, SubscriptionId, Value};
use crate::timer::{TimerMode, TimerService, TimerSlot};

struct Inner {
    value: Value<u32>,
    output: RefCell<Box<dyn DigitalOutput>>,
    timer: TimerSlot,
}

impl Inner {
    fn is_running(&self) -> bool {
        let level = self.output.borrow_mut().is_set_high();
        level.unwrap_or_else(|e| {
            warn!("{}: {}, assuming running", self.value.name(), e);
            true
        })
    }

    fn stop(&self) -> Result<()> {
        self.timer.cancel();
        let was_running = self.is_running();
        self.output.borrow_mut().set_low()?;
        if was_running {
            info!("{}: off", self.value.name());
        }
        Ok(())
    }
}

/// One pump on one digital output, with an auto-stop timer.
#[derive(Clone)]
pub struct Pump {
    inner: Rc<Inner>,
}

impl Pump {
    /// Build the pump and force the output off.
    pub fn new(
        name: impl Into<String>,
        output: Box<dyn DigitalOutput>,
        timers: &dyn TimerService,
        dispatch: &Dispatch,
    ) -> Result<Self> {
        let timer = timers.acquire("pump")?;
        let pump = Self {
            inner: Rc::new(Inner {
                value: Value::new(name, 0, dispatch),
                output: RefCell::new(output),
                timer,
            }),
        };
        pump.stop()?;
        Ok(pump)
    }

    /// Run for `duration_ms` (0 = until [`stop`](Self::stop)).  No-op
    /// while already running.
    pub fn start(&self, duration_ms: u32) -> Result<()> {
        if self.is_running() {
            debug!("{}: already running", self.name());
            return Ok(());
        }

        self.inner.output.borrow_mut().set_high()?;

        if duration_ms > 0 {
            let weak: Weak<Inner> = Rc::downgrade(&self.inner);
            let auto_stop = Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    if let Err(e) = inner.stop() {
                        error!("{}: auto-stop failed: {}", inner.value.name(), e);
                    }
                }
            });
            if let Err(e) = self.inner.timer.arm(duration_ms, TimerMode::OneShot, auto_stop) {
                // Never leave the output on without a way to turn it off.
                if let Err(off) = self.inner.output.borrow_mut().set_low() {
                    error!("{}: no auto-stop and disengage failed: {}", self.name(), off);
                }
                return Err(e);
            }
            info!("{}: on for {} ms", self.name(), duration_ms);
        } else {
            info!("{}: on (held)", self.name());
        }

        self.inner.value.set(duration_ms);
        Ok(())
    }

    /// Cancel any auto-stop and disengage.  Idempotent.
    pub fn stop(&self) -> Result<()> {
        self.inner.stop()
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// `true` while an auto-stop is pending.
    pub fn has_pending_stop(&self) -> bool {
        self.inner.timer.is_armed()
    }

    /// Last accepted run duration.
    pub fn last_duration_ms(&self) -> u32 {
        self.inner.value.get()
    }

    pub fn name(&self) -> &str {
        self.inner.value.name()
    }

    pub fn value(&self) -> &Value<u32> {
        &self.inner.value
    }

    pub fn observable(&self) -> &Observable<u32> {
        self.inner.value.observable()
    }

    pub fn subscribe(&self, callback: impl Fn(&u32) + 'static) -> SubscriptionId {
        self.inner.value.subscribe(callback)
    }
}
