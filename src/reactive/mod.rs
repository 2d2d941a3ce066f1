//! Reactive dispatch core.
//!
//! Every signal in the controller (sensor samples, pump runs, criterion
//! validity, readiness, irrigation state) is an [`Observable`].  Criteria
//! interpret raw observables as booleans, controllers aggregate booleans,
//! and the irrigation state machine reacts to the aggregate:
//!
//! ```text
//! ┌────────┐   f32    ┌───────────┐  bool  ┌────────────┐  ()  ┌────────────┐
//! │ Sensor │─────────▶│ Criterion │───────▶│ Controller │─────▶│ Irrigation │
//! │ Pump   │  u32     │  (value)  │        │   (AND)    │      │  (Pump)    │
//! └────────┘          └───────────┘        └────────────┘      └────────────┘
//! ```
//!
//! ## Dispatch modes
//!
//! An observable dispatches either **immediately** (subscribers run
//! synchronously, in subscription order) or **deferred** (one job per
//! subscriber is pushed onto the shared [`DeferredQueue`] and run later by
//! the idle loop).  Deferred dispatch flattens long notification chains
//! into an explicit work list so the call stack stays bounded on the
//! target.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`).  Interrupt and
//! timer-task context never touches observables directly; it goes through
//! the inbound [`events`](crate::events) queue.

mod cooldown;
mod deferred;
mod observable;
mod sum;
mod value;

pub use cooldown::Cooldown;
pub use deferred::DeferredQueue;
pub use observable::{Callback, Dispatch, DispatchMode, Observable, ObservableId, SubscriptionId};
pub use sum::{SaturatingAdd, Sum};
pub use value::Value;
