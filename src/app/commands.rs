//! Remote command intake.
//!
//! Inbound `(topic, payload)` pairs from the MQTT client are routed to a
//! per-topic observable.  Zones register `"{zone}/Pump"` and start their
//! pump for the decimal duration carried in the payload.
//!
//! A message on a topic nobody handles is a wiring defect, so it is
//! logged at error level and returned as an error rather than dropped.

use core::cell::RefCell;

use log::error;

use crate::error::{CommandError, Result};
use crate::reactive::Observable;

/// Topic → observable routing table.
#[derive(Default)]
pub struct CommandRouter {
    routes: RefCell<Vec<(String, Observable<String>)>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the route for `topic`.  Subscribe to the returned observable
    /// to receive payloads.
    pub fn register(&self, topic: &str) -> Result<Observable<String>> {
        let mut routes = self.routes.borrow_mut();
        if routes.iter().any(|(t, _)| t == topic) {
            return Err(CommandError::DuplicateTopic.into());
        }
        let observable = Observable::immediate(topic);
        routes.push((topic.to_string(), observable.clone()));
        Ok(observable)
    }

    /// Deliver `payload` to the subscribers of `topic`.
    pub fn dispatch(&self, topic: &str, payload: &str) -> Result<()> {
        let route = self
            .routes
            .borrow()
            .iter()
            .find(|(t, _)| t == topic)
            .map(|(_, o)| o.clone());

        let Some(observable) = route else {
            error!("command: no route for topic '{}'", topic);
            return Err(CommandError::UnknownTopic.into());
        };
        if observable.subscriber_count() == 0 {
            error!("command: nothing subscribed to '{}'", topic);
            return Err(CommandError::NoSubscriber.into());
        }
        observable.notify(&payload.to_string());
        Ok(())
    }

    /// Every routed topic, in registration order.
    pub fn topics(&self) -> Vec<String> {
        self.routes.borrow().iter().map(|(t, _)| t.clone()).collect()
    }
}

/// Parse a decimal millisecond duration, tolerating surrounding
/// whitespace.
pub fn parse_duration(payload: &str) -> Result<u32> {
    payload
        .trim()
        .parse::<u32>()
        .map_err(|_| CommandError::InvalidPayload.into())
}
