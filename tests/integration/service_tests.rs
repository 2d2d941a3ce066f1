//! Integration tests for the AppService → zones pipeline.
//!
//! These run on the host and drive the service the way the device main
//! loop does: events in through `handle_event`, deferred work drained
//! through `idle`, time moved by `SimTimers`.

use std::rc::Rc;

use irrigator::app::service::AppService;
use irrigator::config::{LONGEST_TOPIC_SUFFIX, SystemConfig, TOPIC_BUDGET};
use irrigator::criteria::Criterion;
use irrigator::drivers::ManualButton;
use irrigator::error::{CommandError, Error};
use irrigator::events::{Event, EventQueue};
use irrigator::irrigation::IrrigationState;
use irrigator::reactive::DispatchMode;
use irrigator::safety::ResetStrategy;
use irrigator::timer::SimTimers;

use crate::mock_hw::{CAL_MAX, CAL_MIN, MockButton, RecordingPin, RecordingTransport, ScriptedProbe};

struct Board {
    app: AppService,
    timers: SimTimers,
    probes: Vec<ScriptedProbe>,
    pumps: Vec<RecordingPin>,
    leds: Vec<RecordingPin>,
}

fn config(zones: usize) -> SystemConfig {
    let mut config = SystemConfig::default();
    config.zones.truncate(zones);
    for zone in &mut config.zones {
        zone.sensor.min_reading = CAL_MIN;
        zone.sensor.max_reading = CAL_MAX;
        zone.settle_delay_ms = 0;
    }
    config
}

fn board(config: SystemConfig) -> Board {
    let timers = SimTimers::new(config.timer_slots);
    let zones = config.zones.clone();
    let mut app = AppService::new(config, Rc::new(timers.clone())).unwrap();
    let (mut probes, mut pumps, mut leds) = (Vec::new(), Vec::new(), Vec::new());
    for zone in &zones {
        let probe = ScriptedProbe::at_percent(50);
        let pump = RecordingPin::new();
        let led = RecordingPin::new();
        let irrigation = app
            .add_zone(zone, Box::new(probe.clone()), Box::new(pump.clone()))
            .unwrap();
        irrigation.set_cap_indicator(Box::new(led.clone()));
        probes.push(probe);
        pumps.push(pump);
        leds.push(led);
    }
    app.start().unwrap();
    Board {
        app,
        timers,
        probes,
        pumps,
        leds,
    }
}

#[test]
fn zones_run_independently() {
    let b = board(config(3));
    b.probes[1].set_percent(10);
    b.timers.advance(1_000);

    let states: Vec<_> = b.app.zones().iter().map(|z| z.state()).collect();
    assert_eq!(
        states,
        vec![IrrigationState::Draining, IrrigationState::Watering, IrrigationState::Draining]
    );
    assert!(!b.pumps[0].is_high());
    assert!(b.pumps[1].is_high());
    assert!(!b.pumps[2].is_high());
}

#[test]
fn every_zone_gets_a_pump_command_topic() {
    let mut c = config(2);
    c.base_topic_prefix = Some("greenhouse".into());
    let b = board(c);
    assert_eq!(
        b.app.command_topics(),
        vec!["greenhouse/Plant 1/Pump", "greenhouse/Plant 2/Pump"]
    );
    assert_eq!(b.app.zones()[1].topic_base(), "greenhouse/Plant 2");
}

#[test]
fn remote_command_runs_the_pump_for_the_given_time() {
    let b = board(config(2));
    b.app
        .handle_event(Event::remote_command("Plant 2/Pump", "2500").unwrap())
        .unwrap();
    assert!(b.pumps[1].is_high());
    assert!(!b.pumps[0].is_high());

    b.timers.advance(2_499);
    assert!(b.pumps[1].is_high());
    b.timers.advance(1);
    assert!(!b.pumps[1].is_high());
    assert_eq!(b.app.zones()[1].pump_time().get(), 2_500);
}

#[test]
fn pump_time_saturates_instead_of_reopening_the_cap() {
    let b = board(config(1));
    let zone = &b.app.zones()[0];
    b.app
        .handle_event(Event::remote_command("Plant 1/Pump", "4294967295").unwrap())
        .unwrap();
    assert_eq!(zone.pump_time().get(), u32::MAX);
    assert!(!zone.cap().is_valid());

    zone.pump().stop().unwrap();
    b.app
        .handle_event(Event::remote_command("Plant 1/Pump", "1").unwrap())
        .unwrap();
    assert_eq!(zone.pump_time().get(), u32::MAX);
    assert!(!zone.cap().is_valid());
    assert!(b.leds[0].is_high());
}

#[test]
fn unknown_and_malformed_commands_fail_loudly() {
    let b = board(config(1));
    assert_eq!(
        b.app.handle_event(Event::remote_command("Plant 7/Pump", "100").unwrap()),
        Err(Error::Command(CommandError::UnknownTopic))
    );
    // A bad payload is rejected by the zone without touching the pump.
    let _ = b.app.handle_event(Event::remote_command("Plant 1/Pump", "soon").unwrap());
    assert!(!b.pumps[0].is_high());
}

#[test]
fn events_flow_through_the_queue_in_order() {
    let b = board(config(1));
    let queue = EventQueue::new();
    assert!(queue.push(Event::Button { zone: 0, pressed: true }));
    assert!(queue.push(Event::Button { zone: 0, pressed: false }));
    assert!(queue.push(Event::remote_command("Plant 1/Pump", "1000").unwrap()));

    let mut errors = 0;
    queue.drain(|event| {
        if b.app.handle_event(event).is_err() {
            errors += 1;
        }
    });
    assert_eq!(errors, 0);
    assert_eq!(b.pumps[0].history(), vec![false, true, false, true]);
}

#[test]
fn debounced_button_holds_the_pump() {
    let b = board(config(1));
    let input = MockButton::default();
    let mut button = ManualButton::new(0, Box::new(input.clone()));

    input.press();
    assert_eq!(button.poll(0), None);
    let pressed = button.poll(60).expect("press should settle");
    b.app.handle_event(pressed).unwrap();
    assert!(b.pumps[0].is_high());

    // A held run has no auto-stop.
    b.timers.advance(600_000);
    assert!(b.pumps[0].is_high());

    input.release();
    assert_eq!(button.poll(100), None);
    let released = button.poll(200).expect("release should settle");
    b.app.handle_event(released).unwrap();
    assert!(!b.pumps[0].is_high());
}

#[test]
fn daily_reset_clears_caps_and_lights() {
    let mut c = config(2);
    c.daily_reset.period_ms = 60_000;
    for zone in &mut c.zones {
        zone.pump.pump_duration_ms = 1_000;
        zone.pump.pump_cap_ms = 2_000;
    }
    let b = board(c);
    for zone in b.app.zones() {
        zone.pump().start(2_000).unwrap();
    }
    b.timers.advance(2_000);
    assert!(b.app.zones().iter().all(|z| !z.cap().is_valid()));
    assert!(b.leds.iter().all(RecordingPin::is_high));
    assert_eq!(b.app.zones()[0].is_cap_lit(), Some(true));

    b.timers.advance(58_000);
    assert_eq!(b.app.daily_reset().reset_count(), 1);
    assert!(b.app.zones().iter().all(|z| z.cap().is_valid()));
    assert!(b.leds.iter().all(|led| !led.is_high()));
}

#[test]
fn reboot_strategy_still_clears_caps_on_the_host() {
    let mut c = config(1);
    c.daily_reset.strategy = ResetStrategy::Reboot;
    c.daily_reset.period_ms = 10_000;
    let b = board(c);
    b.app.zones()[0].pump().start(15_000).unwrap();
    assert!(!b.app.zones()[0].cap().is_valid());

    b.timers.advance(10_000);
    assert!(b.app.zones()[0].cap().is_valid());
}

#[test]
fn deferred_zones_progress_through_idle() {
    let mut c = config(1);
    c.zones[0].dispatch = DispatchMode::Deferred;
    let b = board(c);
    while b.app.idle() {}

    b.probes[0].set_percent(10);
    b.timers.advance(1_000);
    assert_eq!(b.app.zones()[0].state(), IrrigationState::Draining);
    assert!(!b.app.deferred().is_empty());

    while b.app.idle() {}
    assert_eq!(b.app.zones()[0].state(), IrrigationState::Watering);
}

#[test]
fn telemetry_reaches_an_attached_transport() {
    let b = board(config(1));
    let transport = RecordingTransport::new();
    b.app.telemetry().attach(transport.clone());

    b.probes[0].set_percent(10);
    b.timers.advance(1_000);
    assert_eq!(transport.payloads("Plant 1/State"), vec!["Watering"]);
    assert_eq!(transport.payloads("Plant 1/Sensor"), vec!["10"]);
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let mut c = config(2);
    c.zones[1].humidity.min_humidity = 90.0;
    assert!(AppService::new(c, Rc::new(SimTimers::new(32))).is_err());

    let mut c = config(4);
    c.timer_slots = 4;
    assert!(AppService::new(c, Rc::new(SimTimers::new(4))).is_err());
}

#[test]
fn longest_accepted_zone_name_builds_a_zone() {
    let mut c = config(1);
    c.base_topic_prefix = Some("gh".into());
    let name = "z".repeat(TOPIC_BUDGET - LONGEST_TOPIC_SUFFIX.len() - "gh/".len());
    c.zones[0].name = name.clone();
    assert!(c.validate().is_ok());

    let b = board(c);
    assert_eq!(b.app.command_topics(), vec![format!("gh/{name}/Pump")]);
    b.probes[0].set_percent(10);
    b.timers.advance(1_000);
    assert_eq!(b.app.zones()[0].state(), IrrigationState::Watering);
}

#[test]
fn exhausted_timer_pool_fails_zone_creation() {
    let mut c = config(1);
    c.timer_slots = 64;
    let zone = c.zones[0].clone();
    // Pool smaller than the configuration promised.
    let mut app = AppService::new(c, Rc::new(SimTimers::new(3))).unwrap();
    let result = app.add_zone(
        &zone,
        Box::new(ScriptedProbe::at_percent(50)),
        Box::new(RecordingPin::new()),
    );
    assert!(result.is_err());
    assert!(app.zones().is_empty());
    assert!(app.command_topics().is_empty());
}
