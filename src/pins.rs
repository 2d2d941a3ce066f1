//! GPIO / ADC assignments for the four-zone irrigation board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Index `i` of each table belongs to zone `i`.

/// Number of zones the board is wired for.
pub const ZONE_COUNT: usize = 4;

// ---------------------------------------------------------------------------
// Soil moisture probes (capacitive, analog) on ADC1
// ---------------------------------------------------------------------------

/// ADC1 channel per zone (GPIO 1..3 on ESP32-S3).  Zones 3 and 4 share
/// one probe, as on the reference planter.
pub const MOISTURE_ADC_CHANNELS: [u32; ZONE_COUNT] = [0, 1, 2, 2];

/// Attenuation for the probes (12 dB → full 0 – 3.3 V swing).
pub const MOISTURE_ADC_ATTEN: u32 = 3;

// ---------------------------------------------------------------------------
// Pump drivers (logic-level MOSFET, active HIGH)
// ---------------------------------------------------------------------------

pub const PUMP_GPIOS: [i32; ZONE_COUNT] = [4, 5, 6, 7];

// ---------------------------------------------------------------------------
// "Cap reached" indicator LEDs (active HIGH)
// ---------------------------------------------------------------------------

pub const CAP_LED_GPIOS: [i32; ZONE_COUNT] = [8, 9, 10, 11];

// ---------------------------------------------------------------------------
// Manual override buttons (active-low with internal pull-up)
// ---------------------------------------------------------------------------

pub const BUTTON_GPIOS: [i32; ZONE_COUNT] = [12, 13, 14, 21];

/// Highest GPIO number on the ESP32-S3.
pub const MAX_GPIO: i32 = 48;
