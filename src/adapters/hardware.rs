//! Hardware adapter: real peripherals behind the port traits.
//!
//! - [`AdcInput`] samples one ADC1 channel ([`AnalogInput`]).
//! - [`GpioOutput`] drives any embedded-hal stateful output pin
//!   ([`DigitalOutput`]), with optional inverted polarity.
//! - [`GpioInput`] reads any embedded-hal input pin ([`DigitalInput`]).
//! - [`HwPin`] is the board's raw GPIO exposed through the embedded-hal
//!   traits, so the generic adapters above work on it directly.
//!
//! This is the only module that touches actual pins.  On non-espidf
//! targets the raw access in `hw_init` is simulated.

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin, StatefulOutputPin};

use crate::app::ports::{AnalogInput, DigitalInput, DigitalOutput};
use crate::drivers::hw_init;
use crate::error::{ActuatorError, SensorError};

// ── Analog ────────────────────────────────────────────────────

/// One ADC1 channel.
#[derive(Debug, Clone, Copy)]
pub struct AdcInput {
    channel: u32,
}

impl AdcInput {
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }
}

impl AnalogInput for AdcInput {
    fn sample(&mut self) -> Result<u16, SensorError> {
        hw_init::adc1_read(self.channel)
    }
}

// ── Raw GPIO as embedded-hal pin ──────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFault {
    Write,
    Read,
}

impl digital::Error for PinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A board GPIO by number.  Must be configured by
/// [`hw_init::init_peripherals`] first.
#[derive(Debug, Clone, Copy)]
pub struct HwPin {
    gpio: i32,
}

impl HwPin {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }
}

impl ErrorType for HwPin {
    type Error = PinFault;
}

impl OutputPin for HwPin {
    fn set_low(&mut self) -> Result<(), PinFault> {
        hw_init::gpio_write(self.gpio, false).map_err(|_| PinFault::Write)
    }

    fn set_high(&mut self) -> Result<(), PinFault> {
        hw_init::gpio_write(self.gpio, true).map_err(|_| PinFault::Write)
    }
}

impl StatefulOutputPin for HwPin {
    fn is_set_high(&mut self) -> Result<bool, PinFault> {
        hw_init::gpio_level(self.gpio).map_err(|_| PinFault::Read)
    }

    fn is_set_low(&mut self) -> Result<bool, PinFault> {
        self.is_set_high().map(|high| !high)
    }
}

impl InputPin for HwPin {
    fn is_high(&mut self) -> Result<bool, PinFault> {
        hw_init::gpio_read(self.gpio).map_err(|_| PinFault::Read)
    }

    fn is_low(&mut self) -> Result<bool, PinFault> {
        self.is_high().map(|high| !high)
    }
}

// ── Port adapters ─────────────────────────────────────────────

/// Relay / LED output.  "Engaged" maps to the pin level given by the
/// polarity.
pub struct GpioOutput<P> {
    pin: P,
    active_low: bool,
}

impl<P: StatefulOutputPin> GpioOutput<P> {
    pub fn active_high(pin: P) -> Self {
        Self { pin, active_low: false }
    }

    pub fn active_low(pin: P) -> Self {
        Self { pin, active_low: true }
    }

    fn drive(&mut self, engaged: bool) -> Result<(), ActuatorError> {
        let result = if engaged != self.active_low {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|_| ActuatorError::GpioWriteFailed)
    }
}

impl<P: StatefulOutputPin> DigitalOutput for GpioOutput<P> {
    fn set_high(&mut self) -> Result<(), ActuatorError> {
        self.drive(true)
    }

    fn set_low(&mut self) -> Result<(), ActuatorError> {
        self.drive(false)
    }

    fn is_set_high(&mut self) -> Result<bool, ActuatorError> {
        self.pin
            .is_set_high()
            .map(|high| high != self.active_low)
            .map_err(|_| ActuatorError::GpioReadbackFailed)
    }
}

/// Button / switch input.
pub struct GpioInput<P> {
    pin: P,
    active_low: bool,
}

impl<P: InputPin> GpioInput<P> {
    pub fn active_high(pin: P) -> Self {
        Self { pin, active_low: false }
    }

    /// Asserted when the pin reads low (pull-up wiring).
    pub fn active_low(pin: P) -> Self {
        Self { pin, active_low: true }
    }
}

impl<P: InputPin> DigitalInput for GpioInput<P> {
    fn read(&mut self) -> Result<bool, SensorError> {
        self.pin
            .is_high()
            .map(|high| high != self.active_low)
            .map_err(|_| SensorError::GpioReadFailed)
    }
}
