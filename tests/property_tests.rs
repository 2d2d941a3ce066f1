//! Property tests for the reactive core, the criteria and the zone state
//! machine.
//!
//! Host only; proptest does not build for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use irrigator::app::ports::{AnalogInput, DigitalOutput};
use irrigator::config::ZoneConfig;
use irrigator::controller::Controller;
use irrigator::criteria::{Cap, Criterion};
use irrigator::error::{ActuatorError, SensorError};
use irrigator::irrigation::{Irrigation, IrrigationState, ZoneContext};
use irrigator::reactive::{Cooldown, DeferredQueue, Dispatch, Observable, Sum, Value};
use irrigator::sensors::Calibration;
use irrigator::telemetry::Telemetry;
use irrigator::timer::SimTimers;
use proptest::prelude::*;

// ── Calibration ───────────────────────────────────────────────

proptest! {
    /// The calibrated reading falls strictly as the raw count rises, and
    /// the calibration points map to exactly 100 % and 0 %.
    #[test]
    fn calibration_is_strictly_decreasing(
        min in 0u16..60_000,
        span in 1u16..5_000,
        a in 0u16..=u16::MAX,
        b in 0u16..=u16::MAX,
    ) {
        let max = min + span;
        let cal = Calibration::new(min, max);
        prop_assert_eq!(cal.percentage(min), 100.0);
        prop_assert_eq!(cal.percentage(max), 0.0);

        let (lo, hi) = (a.min(b), a.max(b));
        if lo < hi {
            prop_assert!(cal.percentage(lo) > cal.percentage(hi));
        }
    }
}

// ── Cooldown relay ────────────────────────────────────────────

proptest! {
    /// An event is forwarded iff it arrives at least one period after the
    /// last forwarded event; everything else is dropped.
    #[test]
    fn cooldown_forwards_the_leading_edge_of_each_window(
        period in 1u32..500,
        gaps in proptest::collection::vec(0u64..300, 1..40),
    ) {
        let timers = SimTimers::new(1);
        let source = Observable::<u64>::immediate("Sensor");
        let relay = Cooldown::new(&source, period, &timers).unwrap();
        let forwarded = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&forwarded);
        relay.subscribe(move |t| sink.borrow_mut().push(*t));

        let mut expected = Vec::new();
        let mut window_end: Option<u64> = None;
        for gap in gaps {
            timers.advance(gap);
            let now = timers.now_ms();
            if window_end.is_none_or(|end| now >= end) {
                expected.push(now);
                window_end = Some(now + u64::from(period));
            }
            source.notify(&now);
        }
        prop_assert_eq!(&*forwarded.borrow(), &expected);
    }

    #[test]
    fn zero_period_cooldown_forwards_everything(
        gaps in proptest::collection::vec(0u64..50, 1..30),
    ) {
        let timers = SimTimers::new(1);
        let source = Observable::<u64>::immediate("Sensor");
        let relay = Cooldown::new(&source, 0, &timers).unwrap();
        let count = Rc::new(Cell::new(0usize));
        let c = Rc::clone(&count);
        relay.subscribe(move |_| c.set(c.get() + 1));

        for gap in &gaps {
            timers.advance(*gap);
            source.notify(&timers.now_ms());
        }
        prop_assert_eq!(count.get(), gaps.len());
    }
}

// ── Cap accounting ────────────────────────────────────────────

proptest! {
    /// Valid exactly while the running total stays below the threshold;
    /// reset always restores validity.
    #[test]
    fn cap_tracks_the_running_total(
        threshold in 1u32..5_000,
        runs in proptest::collection::vec(0u32..1_000, 0..50),
    ) {
        let pump = Value::immediate("Pump", 0u32);
        let sum = Sum::new(&pump);
        let cap = Cap::new("cap", &sum, threshold, &Dispatch::Immediate);

        let mut total = 0u32;
        for run in runs {
            pump.set(run);
            total += run;
            prop_assert_eq!(cap.total(), total);
            prop_assert_eq!(cap.is_valid(), total < threshold);
        }

        cap.reset();
        prop_assert_eq!(cap.total(), 0);
        prop_assert!(cap.is_valid());
    }
}

// ── Controller ────────────────────────────────────────────────

proptest! {
    /// Ready iff every active member is valid; inactive members never
    /// block, and no active members means ready.
    #[test]
    fn controller_is_an_and_over_active_members(
        members in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..8),
    ) {
        let controller = Controller::new("ready");
        let mut keep = Vec::new();
        for &(active, valid) in &members {
            let pump = Value::immediate("Pump", 0u32);
            let sum = Sum::new(&pump);
            let cap = Cap::new("cap", &sum, 1, &Dispatch::Immediate);
            if !valid {
                pump.set(1);
            }
            if !active {
                cap.deactivate();
            }
            controller.add(&cap).unwrap();
            keep.push((pump, sum, cap));
        }

        let expected = members.iter().all(|&(active, valid)| !active || valid);
        prop_assert_eq!(controller.is_ready(), expected);

        // A member event fires "ready" exactly when the condition holds.
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        controller.subscribe(move |_| f.set(true));
        if let Some((pump, _, _)) = keep.first() {
            pump.set(0);
            prop_assert_eq!(fired.get(), controller.is_ready());
        }
    }
}

// ── Zone state machine ────────────────────────────────────────

struct Probe(Rc<Cell<u16>>);

impl AnalogInput for Probe {
    fn sample(&mut self) -> Result<u16, SensorError> {
        Ok(self.0.get())
    }
}

#[derive(Clone, Default)]
struct Relay(Rc<Cell<bool>>);

impl DigitalOutput for Relay {
    fn set_high(&mut self) -> Result<(), ActuatorError> {
        self.0.set(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), ActuatorError> {
        self.0.set(false);
        Ok(())
    }

    fn is_set_high(&mut self) -> Result<bool, ActuatorError> {
        Ok(self.0.get())
    }
}

proptest! {
    /// For any reading sequence the zone follows the two-threshold
    /// hysteresis, keeps exactly one exit criterion active and only
    /// starts the pump while Watering.
    #[test]
    fn zone_follows_the_hysteresis(readings in proptest::collection::vec(0u16..=100, 1..60)) {
        let mut config = ZoneConfig::named("Plant 1");
        config.sensor.min_reading = 0;
        config.sensor.max_reading = 100;
        config.settle_delay_ms = 0;

        let timers = SimTimers::new(8);
        let deferred = DeferredQueue::new();
        let telemetry = Telemetry::offline();
        let raw = Rc::new(Cell::new(50));
        let ctx = ZoneContext {
            timers: &timers,
            deferred: &deferred,
            telemetry: &telemetry,
            topic_base: "Plant 1",
        };
        let zone = Irrigation::new(&config, Box::new(Probe(raw.clone())), Box::new(Relay::default()), ctx)
            .unwrap();

        let starts = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&starts);
        let state = zone.state_value().clone();
        zone.pump().subscribe(move |_| sink.borrow_mut().push(state.get()));

        let mut model = IrrigationState::Draining;
        for pct in readings {
            raw.set(100 - pct);
            zone.sensor().measure();

            let reading = f32::from(pct);
            model = match model {
                IrrigationState::Draining if reading <= config.humidity.min_humidity => IrrigationState::Watering,
                IrrigationState::Watering if reading >= config.humidity.max_humidity => IrrigationState::Draining,
                other => other,
            };
            prop_assert_eq!(zone.state(), model);
            prop_assert!(zone.watering_exit().is_active() != zone.draining_exit().is_active());
        }
        prop_assert!(starts.borrow().iter().all(|s| *s == IrrigationState::Watering));
    }
}
