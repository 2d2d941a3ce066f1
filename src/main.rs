//! Irrigator firmware entry point.
//!
//! Hexagonal architecture with a single-threaded, event-driven main loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  AdcInput      GpioOutput / GpioInput   MqttTransport   Wifi   │
//! │  (moisture)    (pumps, LEDs, buttons)   (Transport)            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          AppService (zones, router, daily reset)       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  esp_timer task ──▶ Event queue ◀── MQTT task                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::rc::Rc;

use anyhow::{Result, anyhow};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use irrigator::adapters::hardware::{AdcInput, GpioInput, GpioOutput, HwPin};
use irrigator::adapters::mqtt::{self, MqttTransport};
use irrigator::adapters::wifi::{Link, WifiAdapter};
use irrigator::app::service::AppService;
use irrigator::config::SystemConfig;
use irrigator::drivers::hw_init;
use irrigator::drivers::hw_timer::HwTimers;
use irrigator::drivers::watchdog::Watchdog;
use irrigator::drivers::ManualButton;
use irrigator::events;
use irrigator::pins;

/// Main-loop period; also the button polling rate.
const LOOP_PERIOD_MS: u32 = 10;
const WATCHDOG_TIMEOUT_MS: u32 = 10_000;
/// Deferred jobs run per loop iteration.
const DEFERRED_BUDGET: usize = 64;

fn now_ms() -> u64 {
    // SAFETY: RTC counter read.
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000) as u64
}

/// Build-time JSON configuration, or the defaults.
fn load_config() -> SystemConfig {
    match option_env!("IRRIGATOR_CONFIG") {
        Some(json) => SystemConfig::from_json(json).unwrap_or_else(|e| {
            warn!("Config rejected ({}), using defaults", e);
            SystemConfig::default()
        }),
        None => SystemConfig::default(),
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Irrigator v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Hardware ───────────────────────────────────────────
    hw_init::init_peripherals().map_err(|e| anyhow!("HAL init failed: {e}"))?;
    let watchdog = Watchdog::new(WATCHDOG_TIMEOUT_MS);

    // ── 3. Zones ──────────────────────────────────────────────
    let config = load_config();
    if config.zones.len() > pins::ZONE_COUNT {
        warn!(
            "{} zones configured, board has {}; extra zones ignored",
            config.zones.len(),
            pins::ZONE_COUNT
        );
    }
    let timers = Rc::new(HwTimers::new(config.timer_slots)?);
    let mut app = AppService::new(config.clone(), timers)?;
    let mut buttons = Vec::with_capacity(pins::ZONE_COUNT);

    for (i, zone) in config.zones.iter().enumerate().take(pins::ZONE_COUNT) {
        let irrigation = app.add_zone(
            zone,
            Box::new(AdcInput::new(pins::MOISTURE_ADC_CHANNELS[i])),
            Box::new(GpioOutput::active_high(HwPin::new(pins::PUMP_GPIOS[i]))),
        )?;
        irrigation.set_cap_indicator(Box::new(GpioOutput::active_high(HwPin::new(
            pins::CAP_LED_GPIOS[i],
        ))));
        buttons.push(ManualButton::new(
            i as u8,
            Box::new(GpioInput::active_low(HwPin::new(pins::BUTTON_GPIOS[i]))),
        ));
    }
    app.start()?;

    // ── 4. Network (optional; zones run offline) ──────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();
    let mut wifi = WifiAdapter::new(
        Link::new(peripherals.modem, sysloop, nvs).map_err(|e| anyhow!("WiFi init failed: {e}"))?,
    );
    match (option_env!("IRRIGATOR_WIFI_SSID"), option_env!("IRRIGATOR_WIFI_PASS")) {
        (Some(ssid), pass) => {
            if let Err(e) = wifi.set_credentials(ssid, pass.unwrap_or("")) {
                error!("WiFi credentials rejected: {}", e);
            } else if let Err(e) = wifi.connect(now_ms()) {
                warn!("WiFi: {}; running offline", e);
            }
        }
        (None, _) => warn!("No WiFi credentials built in; running offline"),
    }
    let mut mqtt_client: Option<Rc<MqttTransport>> = None;

    info!("System ready. Entering event loop.");

    // ── 5. Event loop ─────────────────────────────────────────
    loop {
        watchdog.feed();
        let now = now_ms();

        wifi.poll(now);
        if wifi.is_connected() && mqtt_client.is_none() {
            match mqtt::broker_settings().and_then(|(url, id)| MqttTransport::connect(url, id)) {
                Ok(client) => {
                    let client = Rc::new(client);
                    app.telemetry().attach(client.clone());
                    mqtt_client = Some(client);
                }
                Err(e) => warn!("MQTT unavailable: {}", e),
            }
        }
        if let Some(client) = &mqtt_client {
            if let Err(e) = client.resubscribe_if_reconnected(&app.command_topics()) {
                warn!("MQTT resubscribe failed: {}", e);
            }
        }

        for button in &mut buttons {
            if let Some(event) = button.poll(now as u32) {
                events::push_event(event);
            }
        }

        events::drain_events(|event| {
            if let Err(e) = app.handle_event(event) {
                warn!("Event dropped: {}", e);
            }
        });

        let mut budget = DEFERRED_BUDGET;
        while budget > 0 && app.idle() {
            budget -= 1;
        }

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
