//! Irrigator firmware library.
//!
//! Exposes the reactive core, the irrigation zones and the application
//! service for integration testing.  All ESP-IDF-specific code is guarded
//! by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod controller;
pub mod criteria;
pub mod events;
pub mod irrigation;
pub mod reactive;
pub mod safety;
pub mod sensors;
pub mod telemetry;
pub mod timer;

pub mod error;
pub mod pins;

pub mod adapters;
pub mod drivers;

#[cfg(target_os = "espidf")]
mod esp_link_shims;
