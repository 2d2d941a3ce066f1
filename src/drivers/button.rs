//! Debounced manual-override button.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up, one per zone.  The adapter
//! behind [`DigitalInput`] handles polarity, so `read() == true` means
//! pressed.
//!
//! ## Debounce
//!
//! `poll()` is called from the main loop with a monotonic timestamp.  A
//! level change is reported only after it has been stable for
//! [`DEBOUNCE_MS`]; bounces inside that window restart the wait.
//!
//! | Level change        | Event                                   |
//! |---------------------|-----------------------------------------|
//! | released → pressed  | `Event::Button { zone, pressed: true }`  |
//! | pressed → released  | `Event::Button { zone, pressed: false }` |

use log::warn;

use crate::app::ports::DigitalInput;
use crate::events::Event;

pub const DEBOUNCE_MS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Stable,
    Settling { level: bool, since_ms: u32 },
}

pub struct ManualButton {
    zone: u8,
    input: Box<dyn DigitalInput>,
    pressed: bool,
    state: DebounceState,
}

impl ManualButton {
    pub fn new(zone: u8, input: Box<dyn DigitalInput>) -> Self {
        Self {
            zone,
            input,
            pressed: false,
            state: DebounceState::Stable,
        }
    }

    /// Zone index this button overrides.
    pub fn zone(&self) -> u8 {
        self.zone
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Sample the input.  Returns an event once a new level has settled.
    pub fn poll(&mut self, now_ms: u32) -> Option<Event> {
        let level = match self.input.read() {
            Ok(level) => level,
            Err(e) => {
                warn!("button {}: {}", self.zone, e);
                return None;
            }
        };

        match self.state {
            DebounceState::Stable => {
                if level != self.pressed {
                    self.state = DebounceState::Settling { level, since_ms: now_ms };
                }
                None
            }

            DebounceState::Settling { level: pending, since_ms } => {
                if level != pending {
                    // Bounced back before settling.
                    self.state = if level == self.pressed {
                        DebounceState::Stable
                    } else {
                        DebounceState::Settling { level, since_ms: now_ms }
                    };
                    return None;
                }
                if now_ms.wrapping_sub(since_ms) < DEBOUNCE_MS {
                    return None;
                }
                self.pressed = level;
                self.state = DebounceState::Stable;
                Some(Event::Button {
                    zone: self.zone,
                    pressed: level,
                })
            }
        }
    }
}
