//! Error types for the controller.
//!
//! Each layer has its own small enum; all of them convert into [`Error`]
//! so `?` works across layers.  Everything is `Copy`, which lets errors
//! cross reactive callbacks by value.

use core::fmt;

// ---------------------------------------------------------------------------
// Crate error
// ---------------------------------------------------------------------------

/// Sum of the per-layer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be sampled.
    Sensor(SensorError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// The telemetry transport failed.
    Comms(CommsError),
    /// A hardware timer could not be acquired or armed.
    Timer(TimerError),
    /// A remote command could not be delivered.
    Command(CommandError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Timer(e) => write!(f, "timer: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The probe ADC returned an error.
    AdcReadFailed,
    GpioReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "moisture ADC sample failed"),
            Self::GpioReadFailed => write!(f, "input pin unreadable"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    GpioWriteFailed,
    /// Level readback of an output failed.
    GpioReadbackFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "output pin write failed"),
            Self::GpioReadbackFailed => write!(f, "output pin level unreadable"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    MqttConnectFailed,
    MqttPublishFailed,
    MqttSubscribeFailed,
    /// Topic or payload does not fit the fixed-capacity buffers.
    MessageTooLong,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi association failed"),
            Self::MqttConnectFailed => write!(f, "broker connection failed"),
            Self::MqttPublishFailed => write!(f, "broker rejected publish"),
            Self::MqttSubscribeFailed => write!(f, "broker rejected subscribe"),
            Self::MessageTooLong => write!(f, "message too long"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// Every timer slot is owned by someone else.
    Exhausted,
    /// The platform refused to create or start the timer.
    ArmFailed,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "no free timer slot"),
            Self::ArmFailed => write!(f, "timer arm failed"),
        }
    }
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}

// ---------------------------------------------------------------------------
// Remote commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// No route is registered for the topic.
    UnknownTopic,
    /// A route exists but nothing is subscribed to it.
    NoSubscriber,
    /// The topic is already routed.
    DuplicateTopic,
    /// The payload is not a decimal duration.
    InvalidPayload,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTopic => write!(f, "unknown topic"),
            Self::NoSubscriber => write!(f, "no subscriber for topic"),
            Self::DuplicateTopic => write!(f, "topic already registered"),
            Self::InvalidPayload => write!(f, "invalid payload"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

/// Crate-wide `Result`.
pub type Result<T> = core::result::Result<T, Error>;
