//! Timer service: a bounded pool of one-shot/periodic timer slots.
//!
//! Hardware timers are scarce on the target, so every owner (each
//! Cooldown, CooldownCriterion, Pump, Sensor and the daily reset) acquires
//! exactly one slot at construction and keeps it for its lifetime.
//! Dropping the slot returns it to the pool.
//!
//! Timer callbacks always run on the main-loop thread.  The device
//! implementation (`drivers::hw_timer`) only posts
//! [`Event::TimerExpired`](crate::events::Event::TimerExpired) from the
//! esp_timer task; the main loop then calls
//! [`TimerService::dispatch_expired`].  [`SimTimers`] runs callbacks from
//! [`SimTimers::advance`] instead.

mod sim;

use std::rc::Rc;

use crate::error::Result;

pub use sim::SimTimers;

/// Callback run when a timer expires.
pub type TimerCallback = Rc<dyn Fn()>;

/// Index of a slot in the timer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Fire once, then disarm.
    OneShot,
    /// Fire every period until cancelled.
    Periodic,
}

/// One owned timer slot.
pub trait Timer {
    fn id(&self) -> TimerId;

    /// Arm the timer, replacing any pending schedule.
    fn arm(&self, period_ms: u32, mode: TimerMode, callback: TimerCallback) -> Result<()>;

    /// Cancel any pending schedule.  Idempotent.
    fn cancel(&self);

    fn is_armed(&self) -> bool;
}

/// An acquired slot.  Dropping it releases the slot.
pub type TimerSlot = Box<dyn Timer>;

/// Source of timer slots.
pub trait TimerService {
    /// Take a free slot for `owner` (used in logs).
    fn acquire(&self, owner: &'static str) -> Result<TimerSlot>;

    /// Run the callback of an expired slot.  Unknown or disarmed slots are
    /// ignored (the slot may have been cancelled after the expiry event was
    /// queued).
    fn dispatch_expired(&self, id: TimerId);

    fn free_slots(&self) -> usize;
}
