//! Daily safety reset.
//!
//! Each zone's [`Cap`] bounds cumulative pump time, and nothing in the
//! zone clears it on its own.  [`DailyReset`] owns one periodic timer
//! slot and, every period, either:
//!
//! - **ClearCaps**: zeroes every registered cap's running sum, or
//! - **Reboot**: restarts the device, which clears all volatile state
//!   including the caps.  Host builds cannot restart and fall back to
//!   clearing the caps.
//!
//! Either way the caps start the new day at zero.

use core::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::info;
use serde::{Deserialize, Serialize};

use crate::criteria::{Cap, Criterion};
use crate::error::Result;
use crate::timer::{TimerMode, TimerService, TimerSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStrategy {
    #[default]
    ClearCaps,
    Reboot,
}

struct Inner {
    strategy: ResetStrategy,
    period_ms: u32,
    caps: RefCell<Vec<Cap>>,
    timer: TimerSlot,
    resets: Cell<u32>,
}

impl Inner {
    fn fire(&self) {
        self.resets.set(self.resets.get().wrapping_add(1));
        match self.strategy {
            ResetStrategy::ClearCaps => {
                info!("daily reset #{}: clearing caps", self.resets.get());
                self.clear_caps();
            }
            ResetStrategy::Reboot => {
                info!("daily reset #{}: restarting", self.resets.get());
                restart();
                // Only reached where a restart is impossible.
                self.clear_caps();
            }
        }
    }

    fn clear_caps(&self) {
        // Clone the list so cap subscribers may register further caps.
        let caps = self.caps.borrow().clone();
        for cap in caps {
            if cap.total() > 0 {
                info!("{}: {} ms used, cleared", cap.name(), cap.total());
            }
            cap.reset();
        }
    }
}

pub struct DailyReset {
    inner: Rc<Inner>,
}

impl DailyReset {
    pub fn new(strategy: ResetStrategy, period_ms: u32, timers: &dyn TimerService) -> Result<Self> {
        let timer = timers.acquire("daily-reset")?;
        Ok(Self {
            inner: Rc::new(Inner {
                strategy,
                period_ms,
                caps: RefCell::new(Vec::new()),
                timer,
                resets: Cell::new(0),
            }),
        })
    }

    pub fn register(&self, cap: &Cap) {
        self.inner.caps.borrow_mut().push(cap.clone());
    }

    /// Arm the periodic timer.
    pub fn start(&self) -> Result<()> {
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        self.inner.timer.arm(
            self.inner.period_ms,
            TimerMode::Periodic,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.fire();
                }
            }),
        )?;
        info!(
            "daily reset: every {} ms ({:?}, {} caps)",
            self.inner.period_ms,
            self.inner.strategy,
            self.inner.caps.borrow().len()
        );
        Ok(())
    }

    pub fn stop(&self) {
        self.inner.timer.cancel();
    }

    /// Run the reset now, outside the schedule.
    pub fn trigger(&self) {
        self.inner.fire();
    }

    /// Zero every registered cap regardless of strategy.
    pub fn clear_caps(&self) {
        self.inner.clear_caps();
    }

    pub fn strategy(&self) -> ResetStrategy {
        self.inner.strategy
    }

    pub fn reset_count(&self) -> u32 {
        self.inner.resets.get()
    }

    pub fn cap_count(&self) -> usize {
        self.inner.caps.borrow().len()
    }
}

#[cfg(target_os = "espidf")]
fn restart() {
    // SAFETY: esp_restart has no preconditions and does not return.
    unsafe { esp_idf_svc::sys::esp_restart() };
}

#[cfg(not(target_os = "espidf"))]
fn restart() {
    log::warn!("daily reset: restart unavailable on this target, clearing caps instead");
}
