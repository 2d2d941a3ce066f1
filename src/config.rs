//! System configuration parameters
//!
//! Every tunable of the irrigation controller, per zone and system-wide.
//! Missing JSON fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{events, telemetry};
use crate::reactive::DispatchMode;
use crate::safety::ResetStrategy;

/// Timer slots one zone holds: sensor sampling, pump auto-stop, pump
/// cooldown, two telemetry rate limiters, settle delay.
pub const TIMER_SLOTS_PER_ZONE: usize = 6;

/// Longest suffix a zone appends to its topic base (the pump-time total).
pub const LONGEST_TOPIC_SUFFIX: &str = "/Sum(Pump)";

/// Byte budget of a full topic, inbound or outbound.
pub const TOPIC_BUDGET: usize = if telemetry::TOPIC_CAP < events::TOPIC_CAP {
    telemetry::TOPIC_CAP
} else {
    events::TOPIC_CAP
};

/// Humidity band and state-dependent sensor telemetry rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumidityConfig {
    /// Draining ends (Watering starts) at or below this moisture (%).
    pub min_humidity: f32,
    /// Watering ends at or above this moisture (%).
    pub max_humidity: f32,
    /// Minimum interval between sensor publishes while Watering (ms).
    pub sensor_publish_period_watering_ms: u32,
    /// Minimum interval between sensor publishes while Draining (ms).
    pub sensor_publish_period_draining_ms: u32,
}

impl Default for HumidityConfig {
    fn default() -> Self {
        Self {
            min_humidity: 30.0,
            max_humidity: 75.0,
            sensor_publish_period_watering_ms: 10_000,
            sensor_publish_period_draining_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Run length of one automatic pump activation (ms).
    pub pump_duration_ms: u32,
    /// Quiet period after each activation (ms).
    pub pump_cooldown_ms: u32,
    /// Cumulative pump time allowed between daily resets (ms).
    pub pump_cap_ms: u32,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            pump_duration_ms: 5_000,
            pump_cooldown_ms: 0,
            pump_cap_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Raw count at 100 % moisture.
    pub min_reading: u16,
    /// Raw count at 0 % moisture.
    pub max_reading: u16,
    pub sample_period_ms: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            min_reading: 42_000,
            max_reading: 65_535,
            sample_period_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Zone name; prefixes every topic of the zone.
    pub name: String,
    pub humidity: HumidityConfig,
    pub pump: PumpConfig,
    pub sensor: SensorConfig,
    /// Delay before a new zone starts reacting (ms).
    pub settle_delay_ms: u32,
    /// Dispatch mode of the zone's values and criteria.
    pub dispatch: DispatchMode,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self::named("Plant")
    }
}

impl ZoneConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            humidity: HumidityConfig::default(),
            pump: PumpConfig::default(),
            sensor: SensorConfig::default(),
            settle_delay_ms: 1_000,
            dispatch: DispatchMode::Immediate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("zone name is empty"));
        }
        let h = &self.humidity;
        if !(h.min_humidity.is_finite() && h.max_humidity.is_finite()) {
            return Err(Error::Config("humidity thresholds must be finite"));
        }
        if h.min_humidity >= h.max_humidity {
            return Err(Error::Config("min_humidity must be below max_humidity"));
        }
        if self.sensor.min_reading == self.sensor.max_reading {
            return Err(Error::Config("sensor calibration interval is empty"));
        }
        if self.sensor.sample_period_ms == 0 {
            return Err(Error::Config("sample_period_ms must be non-zero"));
        }
        if self.pump.pump_cap_ms < self.pump.pump_duration_ms {
            return Err(Error::Config("pump_cap_ms is shorter than one pump run"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyResetConfig {
    pub strategy: ResetStrategy,
    pub period_ms: u32,
}

impl Default for DailyResetConfig {
    fn default() -> Self {
        Self {
            strategy: ResetStrategy::ClearCaps,
            period_ms: 86_400_000, // 24 h
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Optional prefix in front of every zone name in topics.
    pub base_topic_prefix: Option<String>,
    pub zones: Vec<ZoneConfig>,
    pub daily_reset: DailyResetConfig,
    /// Size of the timer pool.
    pub timer_slots: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            base_topic_prefix: None,
            zones: (1..=4).map(|i| ZoneConfig::named(format!("Plant {i}"))).collect(),
            daily_reset: DailyResetConfig::default(),
            timer_slots: 32,
        }
    }
}

impl SystemConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed configuration JSON"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (i, zone) in self.zones.iter().enumerate() {
            zone.validate()?;
            if self.zones[..i].iter().any(|z| z.name == zone.name) {
                return Err(Error::Config("duplicate zone name"));
            }
            if self.topic_base(zone).len() + LONGEST_TOPIC_SUFFIX.len() > TOPIC_BUDGET {
                return Err(Error::Config("zone topic too long"));
            }
        }
        if self.daily_reset.period_ms == 0 {
            return Err(Error::Config("daily_reset.period_ms must be non-zero"));
        }
        if self.timer_slots < self.required_timer_slots() {
            return Err(Error::Config("not enough timer slots for the configured zones"));
        }
        Ok(())
    }

    /// One slot per zone timer plus the daily reset.
    pub fn required_timer_slots(&self) -> usize {
        self.zones.len() * TIMER_SLOTS_PER_ZONE + 1
    }

    /// Topic base of a zone: `"{prefix}/{zone}"` or just the zone name.
    pub fn topic_base(&self, zone: &ZoneConfig) -> String {
        match &self.base_topic_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{}", zone.name),
            _ => zone.name.clone(),
        }
    }
}
