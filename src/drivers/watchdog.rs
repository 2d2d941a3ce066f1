//! Main-loop watchdog on the ESP-IDF task watchdog.
//!
//! A stalled loop panics the device, which drops every pump output low on
//! reboot.  [`Watchdog::feed`] runs once per loop iteration.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use core::cell::Cell;

pub struct Watchdog {
    timeout_ms: u32,
    subscribed: bool,
    feeds: Cell<u32>,
}

impl Watchdog {
    /// Reconfigure the TWDT and subscribe the calling task.
    #[cfg(target_os = "espidf")]
    pub fn new(timeout_ms: u32) -> Self {
        // SAFETY: TWDT calls from the main task during boot.
        let subscribed = unsafe {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK {
                log::warn!("watchdog: reconfigure returned {}, keeping the boot settings", ret);
            }
            esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK
        };
        if subscribed {
            log::info!("watchdog: main task armed, {} ms", timeout_ms);
        } else {
            log::warn!("watchdog: main task not armed");
        }
        Self {
            timeout_ms,
            subscribed,
            feeds: Cell::new(0),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(timeout_ms: u32) -> Self {
        log::info!("watchdog: host build, {} ms timeout not enforced", timeout_ms);
        Self {
            timeout_ms,
            subscribed: false,
            feeds: Cell::new(0),
        }
    }

    /// Once per timeout at the latest.
    pub fn feed(&self) {
        self.feeds.set(self.feeds.get().wrapping_add(1));
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: same task that subscribed in new().
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn feed_count(&self) -> u32 {
        self.feeds.get()
    }
}
