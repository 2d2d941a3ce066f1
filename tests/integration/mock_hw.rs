//! Mock hardware adapters for integration tests.
//!
//! Records every output change and every published message so tests can
//! assert on the full history without touching real GPIO or a broker.
//! All mocks are cheap `Clone` handles over shared state: hand one clone
//! to the zone, keep the other in the test.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use irrigator::app::ports::{AnalogInput, DigitalInput, DigitalOutput, QoS, Transport};
use irrigator::error::{ActuatorError, CommsError, SensorError};

/// Calibration used by every zone in these tests: raw 0 reads 100 %,
/// raw 100 reads 0 %, so `raw = 100 - percent`.
pub const CAL_MIN: u16 = 0;
pub const CAL_MAX: u16 = 100;

pub fn raw_for(percent: u16) -> u16 {
    CAL_MAX - percent
}

// ── RecordingPin ──────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingPin {
    level: Rc<Cell<bool>>,
    history: Rc<RefCell<Vec<bool>>>,
    fail_writes: Rc<Cell<bool>>,
}

#[allow(dead_code)]
impl RecordingPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.level.get()
    }

    /// Every level written, in order.
    pub fn history(&self) -> Vec<bool> {
        self.history.borrow().clone()
    }

    /// Number of low → high edges written.
    pub fn rising_edges(&self) -> usize {
        let history = self.history.borrow();
        let mut previous = false;
        let mut edges = 0;
        for &level in history.iter() {
            if level && !previous {
                edges += 1;
            }
            previous = level;
        }
        edges
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    fn write(&self, level: bool) -> Result<(), ActuatorError> {
        if self.fail_writes.get() {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.level.set(level);
        self.history.borrow_mut().push(level);
        Ok(())
    }
}

impl DigitalOutput for RecordingPin {
    fn set_high(&mut self) -> Result<(), ActuatorError> {
        self.write(true)
    }

    fn set_low(&mut self) -> Result<(), ActuatorError> {
        self.write(false)
    }

    fn is_set_high(&mut self) -> Result<bool, ActuatorError> {
        Ok(self.level.get())
    }
}

// ── ScriptedProbe ─────────────────────────────────────────────

/// Analog input returning the current raw level.  Queued failures are
/// returned first, one per sample.
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    raw: Rc<Cell<u16>>,
    failures: Rc<RefCell<VecDeque<SensorError>>>,
    samples: Rc<Cell<u32>>,
}

#[allow(dead_code)]
impl ScriptedProbe {
    pub fn at_percent(percent: u16) -> Self {
        let probe = Self::default();
        probe.set_percent(percent);
        probe
    }

    pub fn set_percent(&self, percent: u16) {
        self.raw.set(raw_for(percent));
    }

    pub fn set_raw(&self, raw: u16) {
        self.raw.set(raw);
    }

    pub fn fail_next(&self, error: SensorError) {
        self.failures.borrow_mut().push_back(error);
    }

    pub fn samples(&self) -> u32 {
        self.samples.get()
    }
}

impl AnalogInput for ScriptedProbe {
    fn sample(&mut self) -> Result<u16, SensorError> {
        self.samples.set(self.samples.get() + 1);
        match self.failures.borrow_mut().pop_front() {
            Some(error) => Err(error),
            None => Ok(self.raw.get()),
        }
    }
}

// ── MockButton ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockButton {
    pressed: Rc<Cell<bool>>,
}

#[allow(dead_code)]
impl MockButton {
    pub fn press(&self) {
        self.pressed.set(true);
    }

    pub fn release(&self) {
        self.pressed.set(false);
    }
}

impl DigitalInput for MockButton {
    fn read(&mut self) -> Result<bool, SensorError> {
        Ok(self.pressed.get())
    }
}

// ── RecordingTransport ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
    pub qos: QoS,
}

#[derive(Default)]
pub struct RecordingTransport {
    messages: RefCell<Vec<Published>>,
    offline: Cell<bool>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    pub fn messages(&self) -> Vec<Published> {
        self.messages.borrow().clone()
    }

    /// Payloads published on `topic`, oldest first.
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }
}

impl Transport for RecordingTransport {
    fn publish(&self, topic: &str, payload: &str, retain: bool, qos: QoS) -> Result<(), CommsError> {
        if self.offline.get() {
            return Err(CommsError::MqttPublishFailed);
        }
        self.messages.borrow_mut().push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
            qos,
        });
        Ok(())
    }
}
