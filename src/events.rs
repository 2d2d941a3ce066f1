//! Inbound event queue.
//!
//! Events are produced outside the main loop:
//! - esp_timer task (timer slot expiry)
//! - MQTT client task (remote commands)
//! - Main-loop button polling (manual override)
//!
//! and consumed by the main loop one at a time, in FIFO order.  All
//! reactive state is touched only by the consumer, so the producers never
//! need to know about observables.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ esp_timer   │────▶│              │     │              │
//! │ MQTT task   │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Buttons     │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::fmt::Write as _;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::error::{CommsError, Result};
use crate::timer::TimerId;

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 32;

pub const TOPIC_CAP: usize = 64;
pub const PAYLOAD_CAP: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A timer slot expired; run its callback.
    TimerExpired(TimerId),
    /// Inbound message on a subscribed topic.
    RemoteCommand {
        topic: heapless::String<TOPIC_CAP>,
        payload: heapless::String<PAYLOAD_CAP>,
    },
    /// Debounced manual-override button change.
    Button { zone: u8, pressed: bool },
}

impl Event {
    /// Copy a topic/payload pair into a fixed-capacity event.
    pub fn remote_command(topic: &str, payload: &str) -> Result<Self> {
        let mut t = heapless::String::new();
        let mut p = heapless::String::new();
        t.write_str(topic).map_err(|_| CommsError::MessageTooLong)?;
        p.write_str(payload).map_err(|_| CommsError::MessageTooLong)?;
        Ok(Self::RemoteCommand { topic: t, payload: p })
    }
}

/// Bounded multi-producer queue of [`Event`]s.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue without blocking.  Returns `false` if the queue is full
    /// (event dropped).
    pub fn push(&self, event: Event) -> bool {
        self.channel.try_send(event).is_ok()
    }

    pub fn pop(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    /// Hand every pending event to `handler`, oldest first.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

// ── Process-wide queue ────────────────────────────────────────
//
// Timer and MQTT callbacks are plain `extern "C"`/closure contexts with
// no access to the main loop's state, so they post here.

static EVENTS: EventQueue = EventQueue::new();

/// Push an event into the global queue.  Safe from any task.
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let ok = EVENTS.push(event);
    if !ok {
        log::warn!("events: queue full, event dropped");
    }
    ok
}

pub fn pop_event() -> Option<Event> {
    EVENTS.pop()
}

/// Drain all pending events into a callback, FIFO.
pub fn drain_events(handler: impl FnMut(Event)) {
    EVENTS.drain(handler);
}

pub fn queue_is_empty() -> bool {
    EVENTS.is_empty()
}

pub fn queue_len() -> usize {
    EVENTS.len()
}
