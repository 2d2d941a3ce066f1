use core::cell::Cell;
use std::rc::{Rc, Weak};

use log::debug;

use super::{Criterion, CriterionState};
use crate::reactive::{Dispatch, Observable, SubscriptionId};

/// Inclusive band a sensor reading is checked against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSpec {
    pub min: f32,
    pub max: f32,
    /// Valid when the reading is *outside* the band.
    pub invert: bool,
    /// Dispatch on every sample, not only when validity flips.
    pub always_notify: bool,
}

impl RangeSpec {
    pub fn between(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            invert: false,
            always_notify: false,
        }
    }

    /// Valid while `reading <= max`.
    pub fn at_most(max: f32) -> Self {
        Self::between(f32::NEG_INFINITY, max)
    }

    /// Valid while `reading >= min`.
    pub fn at_least(min: f32) -> Self {
        Self::between(min, f32::INFINITY)
    }

    #[must_use]
    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }

    #[must_use]
    pub fn notify_always(mut self) -> Self {
        self.always_notify = true;
        self
    }

    /// NaN is never in range.
    pub fn contains(&self, reading: f32) -> bool {
        self.min <= reading && reading <= self.max
    }

    pub fn evaluate(&self, reading: f32) -> bool {
        self.contains(reading) != self.invert
    }
}

struct Inner {
    state: CriterionState,
    spec: RangeSpec,
    source: Observable<f32>,
    subscription: Cell<Option<SubscriptionId>>,
}

impl Inner {
    fn on_sample(&self, reading: f32) {
        if !self.state.is_active() {
            return;
        }
        let validity = self.state.validity();
        let next = self.spec.evaluate(reading);
        let prev = validity.get();
        if next != prev {
            debug!("{}: {} -> {} at {:.1}", validity.name(), prev, next, reading);
        }
        if next != prev || self.spec.always_notify {
            validity.set(next);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.source.unsubscribe(id);
        }
    }
}

/// Range check against a sensor's calibrated reading.
///
/// Starts active and invalid.  Samples arriving while inactive are
/// ignored, and activation resets validity to `false` until the next
/// sample arrives.
#[derive(Clone)]
pub struct SensorCriterion {
    inner: Rc<Inner>,
}

impl SensorCriterion {
    pub fn new(
        name: impl Into<String>,
        source: &Observable<f32>,
        spec: RangeSpec,
        dispatch: &Dispatch,
    ) -> Self {
        let inner = Rc::new(Inner {
            state: CriterionState::new(name, false, dispatch),
            spec,
            source: source.clone(),
            subscription: Cell::new(None),
        });

        let weak: Weak<Inner> = Rc::downgrade(&inner);
        let id = source.subscribe(move |reading| {
            if let Some(inner) = weak.upgrade() {
                inner.on_sample(*reading);
            }
        });
        inner.subscription.set(Some(id));

        Self { inner }
    }

    pub fn spec(&self) -> RangeSpec {
        self.inner.spec
    }
}

impl Criterion for SensorCriterion {
    fn name(&self) -> &str {
        self.inner.state.validity().name()
    }

    fn is_active(&self) -> bool {
        self.inner.state.is_active()
    }

    fn activate(&self) {
        self.inner.state.set_active(true);
        self.inner.state.validity().store(false);
    }

    fn deactivate(&self) {
        self.inner.state.set_active(false);
    }

    fn is_valid(&self) -> bool {
        self.inner.state.validity().get()
    }

    fn observable(&self) -> &Observable<bool> {
        self.inner.state.validity().observable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    fn harness(spec: RangeSpec) -> (Observable<f32>, SensorCriterion, Rc<RefCell<Vec<bool>>>) {
        let sensor = Observable::immediate("Sensor");
        let criterion = SensorCriterion::new("band", &sensor, spec, &Dispatch::Immediate);
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&events);
        criterion.observable().subscribe(move |v| e.borrow_mut().push(*v));
        (sensor, criterion, events)
    }

    #[test]
    fn bounds_are_inclusive() {
        let (sensor, criterion, _) = harness(RangeSpec::between(30.0, 75.0));
        for (reading, expected) in [(50.0, true), (20.0, false), (80.0, false), (75.0, true), (30.0, true)] {
            sensor.notify(&reading);
            assert_eq!(criterion.is_valid(), expected, "reading {reading}");
        }
    }

    #[test]
    fn dispatches_only_on_flips_by_default() {
        let (sensor, _criterion, events) = harness(RangeSpec::between(30.0, 75.0));
        for reading in [50.0, 60.0, 20.0, 10.0, 40.0] {
            sensor.notify(&reading);
        }
        assert_eq!(*events.borrow(), vec![true, false, true]);
    }

    #[test]
    fn always_notify_dispatches_every_sample() {
        let (sensor, _criterion, events) = harness(RangeSpec::between(30.0, 75.0).notify_always());
        for reading in [50.0, 60.0, 20.0] {
            sensor.notify(&reading);
        }
        assert_eq!(*events.borrow(), vec![true, true, false]);
    }

    #[test]
    fn inverted_range_is_valid_outside_the_band() {
        let (sensor, criterion, _) = harness(RangeSpec::between(30.0, 75.0).inverted());
        sensor.notify(&80.0);
        assert!(criterion.is_valid());
        sensor.notify(&50.0);
        assert!(!criterion.is_valid());
    }

    #[test]
    fn inactive_criterion_ignores_samples_and_activation_clears_validity() {
        let (sensor, criterion, events) = harness(RangeSpec::at_most(30.0));
        sensor.notify(&10.0);
        assert!(criterion.is_valid());

        criterion.deactivate();
        sensor.notify(&90.0);
        assert!(criterion.is_valid());

        criterion.activate();
        assert!(criterion.is_active());
        assert!(!criterion.is_valid());
        assert_eq!(*events.borrow(), vec![true]);

        sensor.notify(&20.0);
        assert!(criterion.is_valid());
    }

    #[test]
    fn nan_reading_is_out_of_range() {
        let (sensor, criterion, _) = harness(RangeSpec::at_least(0.0).notify_always());
        sensor.notify(&f32::NAN);
        assert!(!criterion.is_valid());
    }
}
