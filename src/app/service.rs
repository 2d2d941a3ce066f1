//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the irrigation zones and everything they share:
//! the timer pool, the deferred-dispatch queue, the command router, the
//! telemetry handle and the daily reset.  It is hardware-agnostic: pins
//! arrive as port trait objects and events arrive through
//! [`handle_event`](AppService::handle_event), so the whole service runs
//! under test with mock adapters and [`SimTimers`](crate::timer::SimTimers).
//!
//! ```text
//!  AnalogInput  ──▶ ┌──────────────────────────────┐ ──▶ Transport
//!                   │          AppService          │
//! DigitalOutput ◀── │  zones · router · daily reset │
//!                   └──────────────────────────────┘
//!                         ▲ Event (timer, MQTT, button)
//! ```

use std::rc::Rc;

use log::{info, warn};

use crate::config::{SystemConfig, ZoneConfig};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::irrigation::{Irrigation, ZoneContext};
use crate::reactive::DeferredQueue;
use crate::safety::DailyReset;
use crate::telemetry::Telemetry;
use crate::timer::TimerService;

use super::commands::CommandRouter;
use super::ports::{AnalogInput, DigitalOutput};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: SystemConfig,
    timers: Rc<dyn TimerService>,
    deferred: DeferredQueue,
    router: CommandRouter,
    telemetry: Telemetry,
    daily_reset: DailyReset,
    zones: Vec<Irrigation>,
}

impl AppService {
    /// Validate `config` and set up the shared services.
    ///
    /// Zones are added afterwards with [`add_zone`](Self::add_zone); the
    /// daily reset is armed by [`start`](Self::start).
    pub fn new(config: SystemConfig, timers: Rc<dyn TimerService>) -> Result<Self> {
        config.validate()?;
        let daily_reset = DailyReset::new(
            config.daily_reset.strategy,
            config.daily_reset.period_ms,
            timers.as_ref(),
        )?;
        Ok(Self {
            config,
            timers,
            deferred: DeferredQueue::new(),
            router: CommandRouter::new(),
            telemetry: Telemetry::offline(),
            daily_reset,
            zones: Vec::new(),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Build a zone, route its pump command topic and register its cap
    /// with the daily reset.
    pub fn add_zone(
        &mut self,
        zone: &ZoneConfig,
        input: Box<dyn AnalogInput>,
        output: Box<dyn DigitalOutput>,
    ) -> Result<Irrigation> {
        if self.zones.iter().any(|z| z.name() == zone.name) {
            return Err(Error::Config("duplicate zone name"));
        }
        let topic_base = self.config.topic_base(zone);
        let ctx = ZoneContext {
            timers: self.timers.as_ref(),
            deferred: &self.deferred,
            telemetry: &self.telemetry,
            topic_base: &topic_base,
        };
        let irrigation = Irrigation::new(zone, input, output, ctx)?;
        irrigation.bind_commands(&self.router)?;
        self.daily_reset.register(irrigation.cap());
        info!("service: zone '{}' added ({} total)", zone.name, self.zones.len() + 1);
        self.zones.push(irrigation.clone());
        Ok(irrigation)
    }

    /// Arm the daily reset.  Call once every zone is added.
    pub fn start(&self) -> Result<()> {
        self.daily_reset.start()?;
        info!(
            "service: started with {} zones, {} timer slots free",
            self.zones.len(),
            self.timers.free_slots()
        );
        Ok(())
    }

    // ── Event handling ────────────────────────────────────────

    /// Route one inbound event.
    pub fn handle_event(&self, event: Event) -> Result<()> {
        match event {
            Event::TimerExpired(id) => {
                self.timers.dispatch_expired(id);
                Ok(())
            }
            Event::RemoteCommand { topic, payload } => self.router.dispatch(&topic, &payload),
            Event::Button { zone, pressed } => {
                let Some(irrigation) = self.zones.get(usize::from(zone)) else {
                    warn!("service: button for missing zone {}", zone);
                    return Err(Error::Config("button mapped to a missing zone"));
                };
                irrigation.manual(pressed)
            }
        }
    }

    /// Run one deferred job.  Returns `false` when the queue was empty.
    pub fn idle(&self) -> bool {
        self.deferred.drain_one()
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn zones(&self) -> &[Irrigation] {
        &self.zones
    }

    pub fn zone(&self, name: &str) -> Option<&Irrigation> {
        self.zones.iter().find(|z| z.name() == name)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    pub fn daily_reset(&self) -> &DailyReset {
        &self.daily_reset
    }

    /// Topics to subscribe on the broker.
    pub fn command_topics(&self) -> Vec<String> {
        self.router.topics()
    }
}
