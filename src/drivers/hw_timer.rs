//! Hardware timer service on ESP-IDF's esp_timer API.
//!
//! One esp_timer is created per pool slot at boot.  Expiry callbacks run
//! in the esp_timer task, so they only push [`Event::TimerExpired`] into
//! the event queue; the main loop hands the event back to
//! [`HwTimers::dispatch_expired`], which runs the owner's callback on the
//! main thread.
//!
//! An expiry event can still be queued when its slot is cancelled and
//! re-armed.  Each slot records its next deadline and expiries that
//! arrive before it are dropped as stale.

use core::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};

use crate::error::{Result, TimerError};
use crate::timer::{Timer, TimerCallback, TimerId, TimerMode, TimerService, TimerSlot};

/// Early-delivery slack accepted for an expiry event (µs).
const EXPIRY_TOLERANCE_US: u64 = 1_000;

/// The raw timer hardware behind the pool.
pub trait TimerBackend {
    fn start(&self, index: usize, period_us: u64, mode: TimerMode) -> Result<()>;
    fn stop(&self, index: usize);
    /// Monotonic time (µs).
    fn now_us(&self) -> u64;
}

struct Schedule {
    deadline_us: u64,
    period_us: u64,
    mode: TimerMode,
    callback: TimerCallback,
}

#[derive(Default)]
struct HwSlot {
    owner: Option<&'static str>,
    schedule: Option<Schedule>,
}

struct Pool {
    backend: Box<dyn TimerBackend>,
    slots: RefCell<Vec<HwSlot>>,
}

/// Timer pool backed by hardware timers.
#[derive(Clone)]
pub struct HwTimers {
    pool: Rc<Pool>,
}

impl HwTimers {
    pub fn with_backend(capacity: usize, backend: Box<dyn TimerBackend>) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, HwSlot::default);
        Self {
            pool: Rc::new(Pool {
                backend,
                slots: RefCell::new(slots),
            }),
        }
    }

    /// Pool of `capacity` esp_timers.
    #[cfg(target_os = "espidf")]
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self::with_backend(capacity, Box::new(esp::EspTimerBackend::new(capacity)?)))
    }
}

impl TimerService for HwTimers {
    fn acquire(&self, owner: &'static str) -> Result<TimerSlot> {
        let mut slots = self.pool.slots.borrow_mut();
        let Some(index) = slots.iter().position(|s| s.owner.is_none()) else {
            warn!("hw_timer: no free slot for {}", owner);
            return Err(TimerError::Exhausted.into());
        };
        slots[index].owner = Some(owner);
        debug!("hw_timer: slot {} -> {}", index, owner);
        Ok(Box::new(HwTimer {
            pool: Rc::clone(&self.pool),
            index,
        }))
    }

    fn dispatch_expired(&self, id: TimerId) {
        let now = self.pool.backend.now_us();
        let callback = {
            let mut slots = self.pool.slots.borrow_mut();
            let Some(slot) = slots.get_mut(usize::from(id.0)) else {
                return;
            };
            let Some(schedule) = slot.schedule.as_mut() else {
                return;
            };
            if now + EXPIRY_TOLERANCE_US < schedule.deadline_us {
                debug!("hw_timer: stale expiry on slot {}", id.0);
                return;
            }
            let callback = Rc::clone(&schedule.callback);
            match schedule.mode {
                TimerMode::Periodic => schedule.deadline_us += schedule.period_us,
                TimerMode::OneShot => slot.schedule = None,
            }
            callback
        };
        callback();
    }

    fn free_slots(&self) -> usize {
        self.pool.slots.borrow().iter().filter(|s| s.owner.is_none()).count()
    }
}

struct HwTimer {
    pool: Rc<Pool>,
    index: usize,
}

impl Timer for HwTimer {
    fn id(&self) -> TimerId {
        TimerId(self.index as u8)
    }

    fn arm(&self, period_ms: u32, mode: TimerMode, callback: TimerCallback) -> Result<()> {
        let period_us = u64::from(period_ms.max(1)) * 1_000;
        self.pool.backend.stop(self.index);
        let deadline_us = self.pool.backend.now_us() + period_us;
        self.pool.slots.borrow_mut()[self.index].schedule = Some(Schedule {
            deadline_us,
            period_us,
            mode,
            callback,
        });
        if let Err(e) = self.pool.backend.start(self.index, period_us, mode) {
            self.pool.slots.borrow_mut()[self.index].schedule = None;
            return Err(e);
        }
        Ok(())
    }

    fn cancel(&self) {
        self.pool.backend.stop(self.index);
        self.pool.slots.borrow_mut()[self.index].schedule = None;
    }

    fn is_armed(&self) -> bool {
        self.pool.slots.borrow()[self.index].schedule.is_some()
    }
}

impl Drop for HwTimer {
    fn drop(&mut self) {
        self.pool.backend.stop(self.index);
        if let Ok(mut slots) = self.pool.slots.try_borrow_mut() {
            slots[self.index] = HwSlot::default();
        }
    }
}

// ── esp_timer backend ─────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::sys::*;
    use log::{error, info};

    use super::TimerBackend;
    use crate::error::{Result, TimerError};
    use crate::events::{Event, push_event};
    use crate::timer::{TimerId, TimerMode};

    unsafe extern "C" fn expiry_cb(arg: *mut core::ffi::c_void) {
        // The slot index travels in the argument pointer.
        push_event(Event::TimerExpired(TimerId(arg as usize as u8)));
    }

    pub struct EspTimerBackend {
        handles: Vec<esp_timer_handle_t>,
    }

    impl EspTimerBackend {
        pub fn new(capacity: usize) -> Result<Self> {
            let mut handles = Vec::with_capacity(capacity);
            for index in 0..capacity {
                let args = esp_timer_create_args_t {
                    callback: Some(expiry_cb),
                    arg: index as *mut core::ffi::c_void,
                    dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
                    name: b"slot\0".as_ptr() as *const _,
                    skip_unhandled_events: true,
                };
                let mut handle: esp_timer_handle_t = core::ptr::null_mut();
                // SAFETY: args outlives the call; the handle is owned by
                // this backend until drop.
                let ret = unsafe { esp_timer_create(&args, &mut handle) };
                if ret != ESP_OK {
                    error!("hw_timer: esp_timer_create failed for slot {} (rc={})", index, ret);
                    return Err(TimerError::ArmFailed.into());
                }
                handles.push(handle);
            }
            info!("hw_timer: {} esp_timer slots created", capacity);
            Ok(Self { handles })
        }
    }

    impl TimerBackend for EspTimerBackend {
        fn start(&self, index: usize, period_us: u64, mode: TimerMode) -> Result<()> {
            let Some(&handle) = self.handles.get(index) else {
                return Err(TimerError::ArmFailed.into());
            };
            // SAFETY: handle was created in new() and is not deleted before drop.
            let ret = unsafe {
                match mode {
                    TimerMode::OneShot => esp_timer_start_once(handle, period_us),
                    TimerMode::Periodic => esp_timer_start_periodic(handle, period_us),
                }
            };
            if ret != ESP_OK {
                error!("hw_timer: start failed on slot {} (rc={})", index, ret);
                return Err(TimerError::ArmFailed.into());
            }
            Ok(())
        }

        fn stop(&self, index: usize) {
            if let Some(&handle) = self.handles.get(index) {
                // SAFETY: valid handle; stopping an idle timer returns
                // ESP_ERR_INVALID_STATE, which is ignored.
                unsafe { esp_timer_stop(handle) };
            }
        }

        fn now_us(&self) -> u64 {
            // SAFETY: RTC counter read.
            unsafe { esp_timer_get_time() as u64 }
        }
    }

    impl Drop for EspTimerBackend {
        fn drop(&mut self) {
            for &handle in &self.handles {
                // SAFETY: handles are valid and dropped exactly once here.
                unsafe {
                    esp_timer_stop(handle);
                    esp_timer_delete(handle);
                }
            }
        }
    }
}
