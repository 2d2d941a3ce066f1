//! Integration tests for one irrigation zone: sensor → criteria →
//! controller → pump, with the zone's state machine and telemetry.
//!
//! Zones run against `SimTimers`, so time only moves when a test calls
//! `advance`.  Samples are either taken explicitly with `measure()` or by
//! the zone's own sampling timer (every `SAMPLE_MS`).

use std::cell::RefCell;
use std::rc::Rc;

use irrigator::app::ports::QoS;
use irrigator::config::ZoneConfig;
use irrigator::criteria::Criterion;
use irrigator::error::SensorError;
use irrigator::irrigation::{Irrigation, IrrigationState, ZoneContext};
use irrigator::reactive::{DeferredQueue, DispatchMode};
use irrigator::telemetry::Telemetry;
use irrigator::timer::SimTimers;

use crate::mock_hw::{CAL_MAX, CAL_MIN, RecordingPin, RecordingTransport, ScriptedProbe};

const SAMPLE_MS: u64 = 1_000;

struct Rig {
    zone: Irrigation,
    probe: ScriptedProbe,
    pump: RecordingPin,
    transport: Rc<RecordingTransport>,
    timers: SimTimers,
    deferred: DeferredQueue,
    _telemetry: Telemetry,
}

impl Rig {
    fn with(configure: impl FnOnce(&mut ZoneConfig)) -> Self {
        let mut config = ZoneConfig::named("Plant 1");
        config.sensor.min_reading = CAL_MIN;
        config.sensor.max_reading = CAL_MAX;
        config.sensor.sample_period_ms = SAMPLE_MS as u32;
        config.settle_delay_ms = 0;
        configure(&mut config);

        let timers = SimTimers::new(16);
        let deferred = DeferredQueue::new();
        let telemetry = Telemetry::offline();
        let transport = RecordingTransport::new();
        telemetry.attach(transport.clone());

        let probe = ScriptedProbe::at_percent(50);
        let pump = RecordingPin::new();
        let ctx = ZoneContext {
            timers: &timers,
            deferred: &deferred,
            telemetry: &telemetry,
            topic_base: "Plant 1",
        };
        let zone = Irrigation::new(&config, Box::new(probe.clone()), Box::new(pump.clone()), ctx).unwrap();
        Self {
            zone,
            probe,
            pump,
            transport,
            timers,
            deferred,
            _telemetry: telemetry,
        }
    }

    fn new() -> Self {
        Self::with(|_| {})
    }

    /// Take one sample at `percent` right now.
    fn sample(&self, percent: u16) -> IrrigationState {
        self.probe.set_percent(percent);
        self.zone.sensor().measure();
        self.zone.state()
    }

    /// States (at dispatch time) of every accepted pump start.
    fn record_starts(&self) -> Rc<RefCell<Vec<IrrigationState>>> {
        let starts = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&starts);
        let state = self.zone.state_value().clone();
        self.zone.pump().subscribe(move |_| sink.borrow_mut().push(state.get()));
        starts
    }
}

// ── State machine ─────────────────────────────────────────────

#[test]
fn watering_starts_at_first_reading_at_or_below_min() {
    let rig = Rig::new();
    let starts = rig.record_starts();

    assert_eq!(rig.sample(40), IrrigationState::Draining);
    assert_eq!(rig.sample(35), IrrigationState::Draining);
    assert!(starts.borrow().is_empty());

    assert_eq!(rig.sample(29), IrrigationState::Watering);
    assert!(rig.pump.is_high(), "pump should start on the transition sample");

    assert_eq!(rig.sample(50), IrrigationState::Watering);
    assert_eq!(rig.sample(76), IrrigationState::Draining);

    // The run that started at 29 is the only one; 50 landed inside it.
    assert_eq!(*starts.borrow(), vec![IrrigationState::Watering]);
    assert_eq!(rig.pump.rising_edges(), 1);
}

#[test]
fn thresholds_are_inclusive() {
    let rig = Rig::new();
    assert_eq!(rig.sample(31), IrrigationState::Draining);
    assert_eq!(rig.sample(30), IrrigationState::Watering);
    assert_eq!(rig.sample(74), IrrigationState::Watering);
    assert_eq!(rig.sample(75), IrrigationState::Draining);
}

#[test]
fn readings_inside_the_band_never_transition() {
    let rig = Rig::new();
    for pct in (31..75).chain((31..75).rev()) {
        assert_eq!(rig.sample(pct), IrrigationState::Draining, "at {pct}%");
    }
    assert!(rig.pump.history().iter().all(|&high| !high));

    rig.sample(10);
    for pct in (31..75).chain((31..75).rev()) {
        assert_eq!(rig.sample(pct), IrrigationState::Watering, "at {pct}%");
    }
}

#[test]
fn only_the_current_states_exit_criterion_is_active() {
    let rig = Rig::new();
    for pct in [50, 20, 50, 90, 50, 20] {
        let state = rig.sample(pct);
        let watering = rig.zone.watering_exit().is_active();
        let draining = rig.zone.draining_exit().is_active();
        assert!(watering != draining, "exactly one exit criterion active");
        assert_eq!(watering, state == IrrigationState::Watering);
    }
}

#[test]
fn pump_keeps_its_run_across_the_switch_to_draining() {
    let rig = Rig::new();
    rig.sample(20);
    assert!(rig.pump.is_high());
    assert_eq!(rig.sample(80), IrrigationState::Draining);
    assert!(rig.zone.pump().is_running());

    rig.timers.advance(5_000);
    assert!(!rig.zone.pump().is_running());
}

// ── Safety gating ─────────────────────────────────────────────

#[test]
fn cap_stops_automatic_runs_until_reset() {
    let rig = Rig::with(|c| {
        c.pump.pump_duration_ms = 1_000;
        c.pump.pump_cap_ms = 3_000;
        c.pump.pump_cooldown_ms = 0;
    });
    rig.probe.set_percent(20);
    rig.timers.advance(30 * SAMPLE_MS);

    assert_eq!(rig.zone.state(), IrrigationState::Watering);
    assert_eq!(rig.pump.rising_edges(), 3);
    assert_eq!(rig.zone.pump_time().get(), 3_000);
    assert!(!rig.zone.cap().is_valid());
    assert!(!rig.pump.is_high());

    // Clearing the cap makes the zone ready again right away.
    rig.zone.cap().reset();
    assert!(rig.zone.cap().is_valid());
    assert!(rig.pump.is_high());
    assert_eq!(rig.pump.rising_edges(), 4);
}

#[test]
fn cooldown_spaces_automatic_runs() {
    let rig = Rig::with(|c| {
        c.pump.pump_duration_ms = 1_000;
        c.pump.pump_cooldown_ms = 10_000;
    });
    let starts = rig.record_starts();
    rig.probe.set_percent(20);

    rig.timers.advance(SAMPLE_MS);
    assert_eq!(rig.pump.rising_edges(), 1);
    assert!(rig.zone.cooldown().is_cooling());

    // First run ends at 2 s; samples keep arriving but the cooldown blocks.
    rig.timers.advance(9_500);
    assert_eq!(rig.pump.rising_edges(), 1);
    assert!(!rig.pump.is_high());

    // Cooldown window closes at 11 s.
    rig.timers.advance(500);
    assert_eq!(rig.pump.rising_edges(), 2);
    assert!(starts.borrow().iter().all(|s| *s == IrrigationState::Watering));
}

#[test]
fn manual_run_counts_against_the_cap() {
    let rig = Rig::with(|c| {
        c.pump.pump_duration_ms = 1_000;
        c.pump.pump_cap_ms = 2_000;
    });
    rig.zone.pump().start(2_500).unwrap();
    assert!(!rig.zone.cap().is_valid());
    rig.timers.advance(2_500);

    rig.sample(10);
    assert_eq!(rig.zone.state(), IrrigationState::Watering);
    assert!(!rig.pump.is_high(), "cap already used up");
}

// ── Sensor faults ─────────────────────────────────────────────

#[test]
fn failed_sample_skips_the_period() {
    let rig = Rig::new();
    rig.probe.set_percent(20);
    rig.probe.fail_next(SensorError::AdcReadFailed);

    rig.timers.advance(SAMPLE_MS);
    assert_eq!(rig.zone.sensor().dropped_samples(), 1);
    assert_eq!(rig.zone.state(), IrrigationState::Draining);
    assert!(rig.zone.sensor().reading().is_nan());

    rig.timers.advance(SAMPLE_MS);
    assert_eq!(rig.zone.state(), IrrigationState::Watering);
    assert_eq!(rig.probe.samples(), 2);
}

// ── Settle delay ──────────────────────────────────────────────

#[test]
fn nothing_happens_before_the_zone_settles() {
    let rig = Rig::with(|c| c.settle_delay_ms = 5_000);
    rig.probe.set_percent(5);
    rig.timers.advance(4_999);
    assert!(!rig.zone.is_settled());
    assert_eq!(rig.probe.samples(), 0);

    rig.timers.advance(1);
    assert!(rig.zone.is_settled());
    rig.timers.advance(SAMPLE_MS);
    assert_eq!(rig.zone.state(), IrrigationState::Watering);
}

// ── Deferred dispatch ─────────────────────────────────────────

#[test]
fn deferred_zone_acts_only_when_the_queue_drains() {
    let rig = Rig::with(|c| c.dispatch = DispatchMode::Deferred);
    rig.deferred.drain_all();

    rig.sample(29);
    assert!(!rig.deferred.is_empty());
    assert_eq!(rig.zone.state(), IrrigationState::Draining);

    rig.deferred.drain_all();
    assert_eq!(rig.zone.state(), IrrigationState::Watering);

    rig.sample(28);
    rig.deferred.drain_all();
    assert!(rig.pump.is_high());

    rig.sample(80);
    rig.deferred.drain_all();
    assert_eq!(rig.zone.state(), IrrigationState::Draining);
    assert!(rig.deferred.is_empty());
}

#[test]
fn deferred_and_immediate_zones_agree() {
    let readings = [60, 45, 30, 40, 74, 75, 50, 31, 30, 90];
    let immediate = Rig::new();
    let deferred = Rig::with(|c| c.dispatch = DispatchMode::Deferred);
    deferred.deferred.drain_all();

    for pct in readings {
        immediate.sample(pct);
        deferred.sample(pct);
        deferred.deferred.drain_all();
        assert_eq!(immediate.zone.state(), deferred.zone.state(), "after {pct}%");
    }
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn publishes_state_sensor_and_pump_time() {
    let rig = Rig::new();
    assert_eq!(rig.transport.payloads("Plant 1/State"), vec!["Draining"]);

    rig.probe.set_percent(40);
    rig.timers.advance(SAMPLE_MS);
    rig.probe.set_percent(29);
    rig.timers.advance(SAMPLE_MS);

    assert_eq!(rig.transport.payloads("Plant 1/State"), vec!["Draining", "Watering"]);
    assert_eq!(rig.transport.payloads("Plant 1/Sum(Pump)"), vec!["5000"]);
    // Both rate limiters opened a window on the first sample.
    assert_eq!(rig.transport.payloads("Plant 1/Sensor"), vec!["40"]);

    let state = rig
        .transport
        .messages()
        .into_iter()
        .find(|m| m.topic == "Plant 1/State")
        .unwrap();
    assert!(state.retain);
    assert_eq!(state.qos, QoS::AtLeastOnce);
}

#[test]
fn sensor_publish_rate_follows_the_state() {
    let rig = Rig::with(|c| {
        c.humidity.sensor_publish_period_watering_ms = 1_500;
        c.humidity.sensor_publish_period_draining_ms = 9_500;
    });
    rig.probe.set_percent(50);
    rig.timers.advance(10 * SAMPLE_MS);
    // Draining: one window covers the whole stretch.
    assert_eq!(rig.transport.payloads("Plant 1/Sensor").len(), 1);

    rig.probe.set_percent(20);
    rig.transport.clear();
    rig.timers.advance(10 * SAMPLE_MS);
    assert_eq!(rig.zone.state(), IrrigationState::Watering);
    // Watering: every other sample clears a 1.5 s window.
    assert_eq!(rig.transport.payloads("Plant 1/Sensor").len(), 5);
}

#[test]
fn broker_outage_does_not_stop_the_zone() {
    let rig = Rig::new();
    rig.transport.clear();
    rig.transport.set_offline(true);
    assert_eq!(rig.sample(10), IrrigationState::Watering);
    assert!(rig.pump.is_high());
    assert!(rig.transport.messages().is_empty());
}
