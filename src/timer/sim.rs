//! Host timer service driven by a virtual millisecond clock.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, warn};

use super::{Timer, TimerCallback, TimerId, TimerMode, TimerService, TimerSlot};
use crate::error::{Result, TimerError};

struct Schedule {
    deadline_ms: u64,
    period_ms: u32,
    mode: TimerMode,
    callback: TimerCallback,
}

#[derive(Default)]
struct SimSlot {
    owner: Option<&'static str>,
    schedule: Option<Schedule>,
}

struct SimState {
    now_ms: Cell<u64>,
    slots: RefCell<Vec<SimSlot>>,
}

impl SimState {
    /// Pop the earliest schedule due at or before `limit_ms`, advancing the
    /// clock to its deadline.  Periodic schedules are re-armed in place.
    fn take_due(&self, limit_ms: u64) -> Option<TimerCallback> {
        let mut slots = self.slots.borrow_mut();
        let (index, deadline) = slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.schedule.as_ref().map(|sch| (i, sch.deadline_ms)))
            .filter(|&(_, deadline)| deadline <= limit_ms)
            .min_by_key(|&(i, deadline)| (deadline, i))?;

        self.now_ms.set(deadline.max(self.now_ms.get()));
        let slot = &mut slots[index];
        let (callback, mode) = {
            let schedule = slot.schedule.as_mut()?;
            if schedule.mode == TimerMode::Periodic {
                schedule.deadline_ms = deadline + u64::from(schedule.period_ms.max(1));
            }
            (Rc::clone(&schedule.callback), schedule.mode)
        };
        if mode == TimerMode::OneShot {
            slot.schedule = None;
        }
        Some(callback)
    }
}

/// Simulated timer pool for host tests.
///
/// Cloning yields another handle to the same clock and pool.
#[derive(Clone)]
pub struct SimTimers {
    state: Rc<SimState>,
}

impl SimTimers {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, SimSlot::default);
        Self {
            state: Rc::new(SimState {
                now_ms: Cell::new(0),
                slots: RefCell::new(slots),
            }),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.state.now_ms.get()
    }

    /// Move the clock forward by `ms`, firing every timer that falls due
    /// in deadline order.  Callbacks run with the pool unlocked, so they
    /// may arm, cancel or release timers.
    pub fn advance(&self, ms: u64) {
        let target = self.state.now_ms.get().saturating_add(ms);
        while let Some(callback) = self.state.take_due(target) {
            callback();
        }
        self.state.now_ms.set(target);
    }

    /// Owners of the currently acquired slots.
    pub fn owners(&self) -> Vec<&'static str> {
        self.state.slots.borrow().iter().filter_map(|s| s.owner).collect()
    }
}

impl TimerService for SimTimers {
    fn acquire(&self, owner: &'static str) -> Result<TimerSlot> {
        let mut slots = self.state.slots.borrow_mut();
        let Some(index) = slots.iter().position(|s| s.owner.is_none()) else {
            warn!("timer: no free slot for {}", owner);
            return Err(TimerError::Exhausted.into());
        };
        slots[index].owner = Some(owner);
        debug!("timer: slot {} -> {}", index, owner);
        Ok(Box::new(SimTimer {
            state: Rc::clone(&self.state),
            index,
        }))
    }

    fn dispatch_expired(&self, id: TimerId) {
        let callback = {
            let mut slots = self.state.slots.borrow_mut();
            let Some(slot) = slots.get_mut(usize::from(id.0)) else {
                return;
            };
            let Some(schedule) = slot.schedule.as_ref() else {
                return;
            };
            let callback = Rc::clone(&schedule.callback);
            if schedule.mode == TimerMode::OneShot {
                slot.schedule = None;
            }
            callback
        };
        callback();
    }

    fn free_slots(&self) -> usize {
        self.state.slots.borrow().iter().filter(|s| s.owner.is_none()).count()
    }
}

struct SimTimer {
    state: Rc<SimState>,
    index: usize,
}

impl Timer for SimTimer {
    fn id(&self) -> TimerId {
        TimerId(self.index as u8)
    }

    fn arm(&self, period_ms: u32, mode: TimerMode, callback: TimerCallback) -> Result<()> {
        let deadline_ms = self.state.now_ms.get() + u64::from(period_ms);
        self.state.slots.borrow_mut()[self.index].schedule = Some(Schedule {
            deadline_ms,
            period_ms,
            mode,
            callback,
        });
        Ok(())
    }

    fn cancel(&self) {
        self.state.slots.borrow_mut()[self.index].schedule = None;
    }

    fn is_armed(&self) -> bool {
        self.state.slots.borrow()[self.index].schedule.is_some()
    }
}

impl Drop for SimTimer {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.state.slots.try_borrow_mut() {
            slots[self.index] = SimSlot::default();
        }
    }
}
