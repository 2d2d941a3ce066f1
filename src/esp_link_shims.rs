//! `critical-section` 1.x provider for the device build.
//!
//! The inbound event channel uses `CriticalSectionRawMutex`, which links
//! against `_critical_section_1_0_acquire` / `_release`.  Nothing in the
//! ESP-IDF std runtime exports those, so they are implemented here as a
//! re-entrant lock: the outermost acquire on a thread takes a global
//! mutex, nested acquires only bump a counter.

#[cfg(target_os = "espidf")]
use core::cell::RefCell;
#[cfg(target_os = "espidf")]
use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(target_os = "espidf")]
static SECTION_LOCK: Mutex<()> = Mutex::new(());

#[cfg(target_os = "espidf")]
struct Held {
    nesting: u8,
    guard: Option<MutexGuard<'static, ()>>,
}

#[cfg(target_os = "espidf")]
thread_local! {
    static HELD: RefCell<Held> = const { RefCell::new(Held { nesting: 0, guard: None }) };
}

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    HELD.with(|held| {
        let mut held = held.borrow_mut();
        if held.nesting == 0 {
            // Nothing lives behind the lock, poisoning is irrelevant.
            held.guard = Some(SECTION_LOCK.lock().unwrap_or_else(PoisonError::into_inner));
        }
        held.nesting = held.nesting.saturating_add(1);
        held.nesting
    })
}

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(_token: u8) {
    HELD.with(|held| {
        let mut held = held.borrow_mut();
        match held.nesting {
            0 => {}
            1 => {
                held.nesting = 0;
                held.guard = None;
            }
            n => held.nesting = n - 1,
        }
    })
}
