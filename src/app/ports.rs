//! Port traits: the boundary between zone logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Irrigation / AppService (domain)
//! ```
//!
//! Driven adapters (ADC channels, relay outputs, buttons, the MQTT
//! client) implement these traits.  The domain holds them as boxed trait
//! objects, so zone logic never touches hardware directly and tests can
//! substitute recording mocks.

use crate::error::{ActuatorError, CommsError, SensorError};

// ───────────────────────────────────────────────────────────────
// Analog input (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One analog channel.
pub trait AnalogInput {
    /// Take a single raw sample.
    fn sample(&mut self) -> Result<u16, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Digital I/O
// ───────────────────────────────────────────────────────────────

/// One digital output line (relay, indicator LED).
///
/// "High" means *engaged*; polarity is the adapter's concern.
pub trait DigitalOutput {
    fn set_high(&mut self) -> Result<(), ActuatorError>;

    fn set_low(&mut self) -> Result<(), ActuatorError>;

    /// Read back the commanded level.
    fn is_set_high(&mut self) -> Result<bool, ActuatorError>;
}

/// One digital input line.  `true` means *asserted*.
pub trait DigitalInput {
    fn read(&mut self) -> Result<bool, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Telemetry transport (driven adapter: domain → network)
// ───────────────────────────────────────────────────────────────

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Outbound message sink.  Implementations must not block the main loop
/// for long; a failed publish is logged by the caller and dropped.
pub trait Transport {
    fn publish(&self, topic: &str, payload: &str, retain: bool, qos: QoS) -> Result<(), CommsError>;
}
