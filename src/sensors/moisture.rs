//! Capacitive soil-moisture probe.
//!
//! ## Calibration
//!
//! The probe reads *lower* the wetter the soil is.  A two-point linear map
//! sends `max_reading` (dry air) to 0 % and `min_reading` (water) to
//! 100 %.  The result is **not** clamped: raw counts outside the
//! calibration band produce percentages outside `[0, 100]`, and threshold
//! checks see them as-is.
//!
//! ## Failed samples
//!
//! A failed ADC read skips that period entirely (no dispatch, value
//! unchanged) and is retried on the next tick.

use core::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::app::ports::AnalogInput;
use crate::error::Result;
use crate::reactive::{Dispatch, Observable, SubscriptionId, Value};
use crate::timer::{TimerMode, TimerService, TimerSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Raw count reading 100 %.
    pub min_reading: u16,
    /// Raw count reading 0 %.
    pub max_reading: u16,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            min_reading: 42_000,
            max_reading: 65_535,
        }
    }
}

impl Calibration {
    pub fn new(min_reading: u16, max_reading: u16) -> Self {
        Self {
            min_reading,
            max_reading,
        }
    }

    /// Raw count to moisture percentage.
    pub fn percentage(&self, raw: u16) -> f32 {
        let span = f32::from(self.max_reading) - f32::from(self.min_reading);
        100.0 * (f32::from(self.max_reading) - f32::from(raw)) / span
    }
}

struct Inner {
    value: Value<f32>,
    input: RefCell<Box<dyn AnalogInput>>,
    calibration: Calibration,
    timer: TimerSlot,
    last_raw: Cell<Option<u16>>,
    dropped: Cell<u32>,
}

impl Inner {
    fn measure(&self) -> Option<f32> {
        let sample = self.input.borrow_mut().sample();
        match sample {
            Ok(raw) => {
                let pct = self.calibration.percentage(raw);
                debug!("{}: raw={} -> {:.1}%", self.value.name(), raw, pct);
                self.last_raw.set(Some(raw));
                self.value.set(pct);
                Some(pct)
            }
            Err(e) => {
                self.dropped.set(self.dropped.get().saturating_add(1));
                warn!(
                    "{}: {} (skipped, {} dropped so far)",
                    self.value.name(),
                    e,
                    self.dropped.get()
                );
                None
            }
        }
    }
}

/// Periodically sampled moisture reading.
///
/// The value starts as NaN (no sample yet), which every range check
/// treats as out of range.
#[derive(Clone)]
pub struct MoistureSensor {
    inner: Rc<Inner>,
}

impl MoistureSensor {
    pub fn new(
        name: impl Into<String>,
        input: Box<dyn AnalogInput>,
        calibration: Calibration,
        timers: &dyn TimerService,
        dispatch: &Dispatch,
    ) -> Result<Self> {
        let timer = timers.acquire("sensor")?;
        Ok(Self {
            inner: Rc::new(Inner {
                value: Value::new(name, f32::NAN, dispatch),
                input: RefCell::new(input),
                calibration,
                timer,
                last_raw: Cell::new(None),
                dropped: Cell::new(0),
            }),
        })
    }

    /// Sample every `period_ms`.  A zero period stops sampling.
    pub fn start(&self, period_ms: u32) -> Result<()> {
        if period_ms == 0 {
            self.stop();
            return Ok(());
        }
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        self.inner.timer.arm(
            period_ms,
            TimerMode::Periodic,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.measure();
                }
            }),
        )
    }

    pub fn stop(&self) {
        self.inner.timer.cancel();
    }

    pub fn is_sampling(&self) -> bool {
        self.inner.timer.is_armed()
    }

    /// Take one sample now and dispatch it.  `None` if the read failed.
    pub fn measure(&self) -> Option<f32> {
        self.inner.measure()
    }

    pub fn transform(&self, raw: u16) -> f32 {
        self.inner.calibration.percentage(raw)
    }

    /// Latest percentage (NaN before the first good sample).
    pub fn reading(&self) -> f32 {
        self.inner.value.get()
    }

    pub fn last_raw(&self) -> Option<u16> {
        self.inner.last_raw.get()
    }

    pub fn dropped_samples(&self) -> u32 {
        self.inner.dropped.get()
    }

    pub fn calibration(&self) -> Calibration {
        self.inner.calibration
    }

    pub fn name(&self) -> &str {
        self.inner.value.name()
    }

    pub fn value(&self) -> &Value<f32> {
        &self.inner.value
    }

    pub fn observable(&self) -> &Observable<f32> {
        self.inner.value.observable()
    }

    pub fn subscribe(&self, callback: impl Fn(&f32) + 'static) -> SubscriptionId {
        self.inner.value.subscribe(callback)
    }
}
