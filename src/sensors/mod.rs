//! Soil-moisture sensing.
//!
//! A [`MoistureSensor`] samples one analog channel on a periodic timer,
//! converts the raw count to a moisture percentage through its
//! [`Calibration`] and publishes the result as an observable value.

mod moisture;

pub use moisture::{Calibration, MoistureSensor};
