//! Actuator drivers, hardware initialisation, and peripheral helpers.

pub mod button;
pub mod hw_init;
pub mod hw_timer;
pub mod pump;
pub mod status_led;
pub mod watchdog;

pub use button::ManualButton;
pub use pump::Pump;
pub use status_led::CapIndicator;
