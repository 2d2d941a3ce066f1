//! Application core. Orchestrates zones, does no direct I/O.
//!
//! [`service::AppService`] wires irrigation zones to the shared timer
//! pool, command router and daily reset.  All interaction with hardware
//! and the network happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod ports;
pub mod service;
