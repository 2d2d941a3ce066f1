//! Boolean readiness checks.
//!
//! A criterion owns a `Value<bool>` that *is* its validity flag and
//! dispatches whenever the flag is (re)computed.  The `active` flag only
//! decides whether a [`Controller`](crate::controller::Controller) takes
//! the criterion into account.

mod cap;
mod cooldown;
mod sensor;

use core::cell::Cell;
use std::rc::Rc;

use crate::reactive::{Dispatch, Observable, Value};

pub use cap::Cap;
pub use cooldown::CooldownCriterion;
pub use sensor::{RangeSpec, SensorCriterion};

/// A named boolean readiness check that can be switched on and off.
pub trait Criterion {
    fn name(&self) -> &str;

    fn is_active(&self) -> bool;

    /// Include the criterion in readiness evaluation.
    fn activate(&self);

    /// Exclude the criterion from readiness evaluation.  Pending timers
    /// keep running.
    fn deactivate(&self);

    fn is_valid(&self) -> bool;

    /// Dispatches the validity flag every time it is recomputed.
    fn observable(&self) -> &Observable<bool>;
}

/// Shared active/validity bookkeeping for concrete criteria.
#[derive(Clone)]
pub(crate) struct CriterionState {
    active: Rc<Cell<bool>>,
    validity: Value<bool>,
}

impl CriterionState {
    pub(crate) fn new(name: impl Into<String>, initial: bool, dispatch: &Dispatch) -> Self {
        Self {
            active: Rc::new(Cell::new(true)),
            validity: Value::new(name, initial, dispatch),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    pub(crate) fn validity(&self) -> &Value<bool> {
        &self.validity
    }
}
