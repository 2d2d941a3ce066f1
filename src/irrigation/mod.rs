//! Irrigation zone: the Watering/Draining cycle.
//!
//! One zone wires a moisture sensor and a pump through a set of criteria:
//!
//! ```text
//!                 ┌───────────────┐ valid  ┌─────────────────────────┐
//!   Sensor ──┬──▶ │ draining-exit │ ─────▶ │                         │
//!            │    │  (≤ min, off  │        │  Draining ◀──▶ Watering │
//!            │    │  in Watering) │        │                         │
//!            │    ├───────────────┤ valid  │                         │
//!            ├──▶ │ watering-exit │ ─────▶ │                         │
//!            │    │  (≥ max, off  │        └────────────┬────────────┘
//!            │    │  in Draining) │                     │ Watering only
//!            │    └───────────────┘                     ▼
//!            │    ┌───────────────┐        ┌─────────────────────────┐
//!            └──▶ │ pump gate     │ ─────▶ │  readiness Controller   │ ──▶ Pump.start
//!                 │ cap           │ ─────▶ │  (AND over the active)  │
//!   Pump ──▶ Sum ▶│ cooldown      │ ─────▶ │                         │
//!                 └───────────────┘        └─────────────────────────┘
//! ```
//!
//! Exactly one exit criterion is active at a time, the one belonging to
//! the current state.  The zone starts in Draining and does nothing until
//! the settle delay has passed.

mod state;

pub use state::IrrigationState;

use core::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::{error, info, warn};

use crate::app::commands::{CommandRouter, parse_duration};
use crate::app::ports::{AnalogInput, DigitalOutput, QoS};
use crate::config::ZoneConfig;
use crate::controller::Controller;
use crate::criteria::{Cap, CooldownCriterion, Criterion, RangeSpec, SensorCriterion};
use crate::drivers::{CapIndicator, Pump};
use crate::error::Result;
use crate::reactive::{Cooldown, DeferredQueue, Dispatch, Observable, SubscriptionId, Sum, Value};
use crate::sensors::{Calibration, MoistureSensor};
use crate::telemetry::{Publisher, Telemetry};
use crate::timer::{TimerMode, TimerService, TimerSlot};

/// Shared services a zone is built against.
#[derive(Clone, Copy)]
pub struct ZoneContext<'a> {
    pub timers: &'a dyn TimerService,
    pub deferred: &'a DeferredQueue,
    pub telemetry: &'a Telemetry,
    /// Topic base of the zone, usually its name.
    pub topic_base: &'a str,
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// Publishers of one zone.  The sensor is published through one of two
/// rate limiters, picked by the current state.
struct ZoneTelemetry {
    sensor: Publisher<f32>,
    watering_rate: Cooldown<f32>,
    draining_rate: Cooldown<f32>,
    pump_time: Publisher<u32>,
    state: Publisher<IrrigationState>,
}

impl ZoneTelemetry {
    fn follow(&self, state: IrrigationState) {
        let relay = match state {
            IrrigationState::Watering => &self.watering_rate,
            IrrigationState::Draining => &self.draining_rate,
        };
        self.sensor.attach(relay.observable());
    }
}

// ---------------------------------------------------------------------------
// Zone internals
// ---------------------------------------------------------------------------

/// Subscriptions that move on every transition.
#[derive(Default)]
struct Wiring {
    transition: Option<(SensorCriterion, SubscriptionId)>,
    pump_start: Option<SubscriptionId>,
}

struct Inner {
    name: String,
    topic_base: String,
    config: ZoneConfig,

    sensor: MoistureSensor,
    pump: Pump,
    pump_time: Sum<u32>,

    watering_exit: SensorCriterion,
    draining_exit: SensorCriterion,
    pump_gate: SensorCriterion,
    cap: Cap,
    cooldown: CooldownCriterion,
    readiness: Controller,

    state: Value<IrrigationState>,
    wiring: RefCell<Wiring>,
    telemetry: ZoneTelemetry,

    settle: TimerSlot,
    settled: Cell<bool>,
    indicator: RefCell<Option<CapIndicator>>,
    command: RefCell<Option<(Observable<String>, SubscriptionId)>>,
}

impl Inner {
    fn exit_criterion(&self, state: IrrigationState) -> &SensorCriterion {
        match state {
            IrrigationState::Watering => &self.watering_exit,
            IrrigationState::Draining => &self.draining_exit,
        }
    }

    fn on_settled(self: &Rc<Self>) {
        if self.settled.replace(true) {
            return;
        }
        info!("{}: settled, starting in {}", self.name, IrrigationState::Draining);
        self.enter(IrrigationState::Draining);
        if let Err(e) = self.sensor.start(self.config.sensor.sample_period_ms) {
            error!("{}: cannot start sampling: {}", self.name, e);
        }
    }

    /// Rewire the zone for `next`.  Safe to call from inside a criterion
    /// dispatch.
    fn enter(self: &Rc<Self>, next: IrrigationState) {
        let leaving = next.next();
        self.exit_criterion(leaving).deactivate();
        let exit = self.exit_criterion(next);
        exit.activate();

        {
            let mut wiring = self.wiring.borrow_mut();

            if let Some((previous, id)) = wiring.transition.take() {
                previous.observable().unsubscribe(id);
            }
            let weak: Weak<Inner> = Rc::downgrade(self);
            let id = exit.observable().subscribe(move |valid| {
                if !*valid {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    // Stale deferred events from the previous state are ignored.
                    if inner.state.get() == next {
                        inner.enter(next.next());
                    }
                }
            });
            wiring.transition = Some((exit.clone(), id));

            match next {
                IrrigationState::Watering => {
                    if wiring.pump_start.is_none() {
                        let weak: Weak<Inner> = Rc::downgrade(self);
                        wiring.pump_start = Some(self.readiness.subscribe(move |_| {
                            if let Some(inner) = weak.upgrade() {
                                inner.on_ready();
                            }
                        }));
                    }
                }
                IrrigationState::Draining => {
                    if let Some(id) = wiring.pump_start.take() {
                        self.readiness.unsubscribe(id);
                    }
                }
            }
        }

        self.telemetry.follow(next);
        info!("{}: {} -> {}", self.name, self.state.get(), next);
        self.state.set(next);
    }

    fn on_ready(&self) {
        if self.state.get() != IrrigationState::Watering {
            return;
        }
        if let Err(e) = self.pump.start(self.config.pump.pump_duration_ms) {
            error!("{}: pump start failed: {}", self.name, e);
        }
    }

    fn on_command(&self, payload: &str) {
        match parse_duration(payload) {
            Ok(duration_ms) => {
                info!("{}: remote pump start for {} ms", self.name, duration_ms);
                if let Err(e) = self.pump.start(duration_ms) {
                    error!("{}: pump start failed: {}", self.name, e);
                }
            }
            Err(e) => warn!("{}: bad pump command '{}': {}", self.name, payload, e),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some((observable, id)) = self.command.get_mut().take() {
            observable.unsubscribe(id);
        }
        self.sensor.stop();
        if let Err(e) = self.pump.stop() {
            warn!("{}: stop on teardown failed: {}", self.name, e);
        }
    }
}

// ---------------------------------------------------------------------------
// Public handle
// ---------------------------------------------------------------------------

/// One irrigation zone.
#[derive(Clone)]
pub struct Irrigation {
    inner: Rc<Inner>,
}

impl Irrigation {
    /// Build the zone and schedule its start after the settle delay.  A
    /// zero delay starts it immediately.
    pub fn new(
        config: &ZoneConfig,
        input: Box<dyn AnalogInput>,
        output: Box<dyn DigitalOutput>,
        ctx: ZoneContext<'_>,
    ) -> Result<Self> {
        config.validate()?;
        let dispatch = Dispatch::from_mode(config.dispatch, ctx.deferred);
        let h = &config.humidity;
        let name = config.name.clone();

        let sensor = MoistureSensor::new(
            "Sensor",
            input,
            Calibration::new(config.sensor.min_reading, config.sensor.max_reading),
            ctx.timers,
            &dispatch,
        )?;
        let pump = Pump::new("Pump", output, ctx.timers, &dispatch)?;
        let pump_time = Sum::new(pump.value());

        let cap = Cap::new(format!("{name}: cap"), &pump_time, config.pump.pump_cap_ms, &dispatch);
        let cooldown = CooldownCriterion::new(
            format!("{name}: cooldown"),
            pump.observable(),
            config.pump.pump_cooldown_ms,
            ctx.timers,
            &dispatch,
        )?;

        let watering_exit = SensorCriterion::new(
            format!("{name}: watering-exit"),
            sensor.observable(),
            RangeSpec::at_least(h.max_humidity),
            &dispatch,
        );
        let draining_exit = SensorCriterion::new(
            format!("{name}: draining-exit"),
            sensor.observable(),
            RangeSpec::at_most(h.min_humidity),
            &dispatch,
        );
        watering_exit.deactivate();
        draining_exit.deactivate();

        let pump_gate = SensorCriterion::new(
            format!("{name}: pump-gate"),
            sensor.observable(),
            RangeSpec::at_most(h.max_humidity).notify_always(),
            &dispatch,
        );

        let readiness = Controller::new(format!("{name}: ready"));
        readiness.add(&pump_gate)?;
        readiness.add(&cap)?;
        readiness.add(&cooldown)?;

        let state = Value::new("State", IrrigationState::Draining, &dispatch);

        let telemetry = ZoneTelemetry {
            sensor: Publisher::new(ctx.topic_base, sensor.name(), ctx.telemetry)?,
            watering_rate: Cooldown::new(sensor.observable(), h.sensor_publish_period_watering_ms, ctx.timers)?,
            draining_rate: Cooldown::new(sensor.observable(), h.sensor_publish_period_draining_ms, ctx.timers)?,
            pump_time: Publisher::new(ctx.topic_base, pump_time.name(), ctx.telemetry)?
                .with_options(true, QoS::AtLeastOnce),
            state: Publisher::new(ctx.topic_base, state.name(), ctx.telemetry)?
                .with_options(true, QoS::AtLeastOnce),
        };
        telemetry.pump_time.attach(pump_time.value().observable());
        telemetry.state.attach(state.observable());

        let settle = ctx.timers.acquire("settle")?;

        let inner = Rc::new(Inner {
            name,
            topic_base: ctx.topic_base.to_string(),
            config: config.clone(),
            sensor,
            pump,
            pump_time,
            watering_exit,
            draining_exit,
            pump_gate,
            cap,
            cooldown,
            readiness,
            state,
            wiring: RefCell::new(Wiring::default()),
            telemetry,
            settle,
            settled: Cell::new(false),
            indicator: RefCell::new(None),
            command: RefCell::new(None),
        });

        if config.settle_delay_ms == 0 {
            inner.on_settled();
        } else {
            let weak: Weak<Inner> = Rc::downgrade(&inner);
            inner.settle.arm(
                config.settle_delay_ms,
                TimerMode::OneShot,
                Rc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_settled();
                    }
                }),
            )?;
            info!("{}: settling for {} ms", inner.name, config.settle_delay_ms);
        }

        Ok(Self { inner })
    }

    /// Route `"{topic base}/Pump"` commands to this zone's pump.
    pub fn bind_commands(&self, router: &CommandRouter) -> Result<()> {
        let topic = format!("{}/{}", self.inner.topic_base, self.inner.pump.name());
        let observable = router.register(&topic)?;
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let id = observable.subscribe(move |payload: &String| {
            if let Some(inner) = weak.upgrade() {
                inner.on_command(payload);
            }
        });
        if let Some((previous, old)) = self.inner.command.borrow_mut().replace((observable, id)) {
            previous.unsubscribe(old);
        }
        Ok(())
    }

    /// Mirror the cap onto `output`: high while the daily cap is used up.
    pub fn set_cap_indicator(&self, output: Box<dyn DigitalOutput>) {
        *self.inner.indicator.borrow_mut() = Some(CapIndicator::new(&self.inner.cap, output));
    }

    /// Manual override: hold the pump on while pressed.
    pub fn manual(&self, pressed: bool) -> Result<()> {
        if pressed {
            info!("{}: manual start", self.inner.name);
            self.inner.pump.start(0)
        } else {
            info!("{}: manual stop", self.inner.name);
            self.inner.pump.stop()
        }
    }

    /// Skip the rest of the settle delay.
    pub fn settle_now(&self) {
        self.inner.settle.cancel();
        self.inner.on_settled();
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn topic_base(&self) -> &str {
        &self.inner.topic_base
    }

    pub fn state(&self) -> IrrigationState {
        self.inner.state.get()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.settled.get()
    }

    pub fn state_value(&self) -> &Value<IrrigationState> {
        &self.inner.state
    }

    pub fn sensor(&self) -> &MoistureSensor {
        &self.inner.sensor
    }

    pub fn pump(&self) -> &Pump {
        &self.inner.pump
    }

    pub fn pump_time(&self) -> &Sum<u32> {
        &self.inner.pump_time
    }

    pub fn cap(&self) -> &Cap {
        &self.inner.cap
    }

    pub fn cooldown(&self) -> &CooldownCriterion {
        &self.inner.cooldown
    }

    pub fn readiness(&self) -> &Controller {
        &self.inner.readiness
    }

    pub fn watering_exit(&self) -> &SensorCriterion {
        &self.inner.watering_exit
    }

    pub fn draining_exit(&self) -> &SensorCriterion {
        &self.inner.draining_exit
    }

    pub fn pump_gate(&self) -> &SensorCriterion {
        &self.inner.pump_gate
    }

    pub fn is_cap_lit(&self) -> Option<bool> {
        self.inner.indicator.borrow().as_ref().map(CapIndicator::is_lit)
    }
}
