//! Board bring-up and the raw pin/ADC accessors the adapters sit on.
//!
//! On the device the moisture channels, pump and LED outputs and button
//! inputs are set up through `esp_idf_svc::sys` before the main loop runs.
//! On the host every channel and pin is an atomic in `sim`, so the same
//! adapters can be driven from tests.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::error::{ActuatorError, SensorError};
#[cfg(target_os = "espidf")]
use crate::pins;

/// Bring-up failure with the raw `esp_err_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc)    => write!(f, "moisture ADC setup returned {}", rc),
            Self::GpioConfigFailed(rc) => write!(f, "gpio_config returned {}", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: runs once, on the main task, before any reader exists.
    unsafe {
        init_adc()?;
        init_gpio_inputs()?;
        init_gpio_outputs()?;
    }
    info!("hw_init: board ready");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init: host build, nothing to configure");
    Ok(())
}

// ── Moisture ADC ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: the handle is written once by `init_adc` and only read from
/// the main task afterwards.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: sole writer of the handle.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: pins::MOISTURE_ADC_ATTEN,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    let mut configured = 0u32;
    for &channel in &pins::MOISTURE_ADC_CHANNELS {
        if configured & (1 << channel) != 0 {
            continue; // shared probe
        }
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }
        configured |= 1 << channel;
    }

    info!("hw_init: moisture channels {:?} ready", pins::MOISTURE_ADC_CHANNELS);
    Ok(())
}

/// Raw 12-bit sample scaled to the full 16-bit range the calibration
/// bounds are expressed in.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Result<u16, SensorError> {
    let mut raw: i32 = 0;
    // SAFETY: main task only, see adc1_handle.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return Err(SensorError::AdcReadFailed);
    }
    Ok(((raw.clamp(0, 4095) as u32) << 4) as u16)
}

// ── Buttons ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    for &pin in &pins::BUTTON_GPIOS {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    info!("hw_init: buttons pulled up");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> Result<bool, SensorError> {
    if !(0..=pins::MAX_GPIO).contains(&pin) {
        return Err(SensorError::GpioReadFailed);
    }
    // SAFETY: level read of a configured pin.
    Ok((unsafe { gpio_get_level(pin) }) != 0)
}

// ── Pumps and LEDs ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for &pin in pins::PUMP_GPIOS.iter().chain(pins::CAP_LED_GPIOS.iter()) {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            // Readback needs the input path too.
            mode: gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: pumps and cap LEDs driven low");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), ActuatorError> {
    // SAFETY: configured output, main task only.
    let ret = unsafe { gpio_set_level(pin, if high { 1 } else { 0 }) };
    if ret != ESP_OK { return Err(ActuatorError::GpioWriteFailed); }
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_level(pin: i32) -> Result<bool, ActuatorError> {
    if !(0..=pins::MAX_GPIO).contains(&pin) {
        return Err(ActuatorError::GpioReadbackFailed);
    }
    // SAFETY: level read of a configured pin.
    Ok((unsafe { gpio_get_level(pin) }) != 0)
}

// ── Host pins ─────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicU16, AtomicU64, Ordering};

    pub const ADC_CHANNELS: usize = 10;
    pub const GPIO_COUNT: i32 = 64;

    pub static ADC: [AtomicU16; ADC_CHANNELS] = [const { AtomicU16::new(u16::MAX) }; ADC_CHANNELS];
    /// Bit n = level of GPIO n.  Inputs idle high (pull-ups).
    pub static GPIO: AtomicU64 = AtomicU64::new(u64::MAX);

    pub fn set_bit(pin: i32, high: bool) {
        let mask = 1u64 << pin;
        if high {
            GPIO.fetch_or(mask, Ordering::SeqCst);
        } else {
            GPIO.fetch_and(!mask, Ordering::SeqCst);
        }
    }

    pub fn bit(pin: i32) -> bool {
        GPIO.load(Ordering::SeqCst) & (1u64 << pin) != 0
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(channel: u32) -> Result<u16, SensorError> {
    sim::ADC
        .get(channel as usize)
        .map(|a| a.load(core::sync::atomic::Ordering::SeqCst))
        .ok_or(SensorError::AdcReadFailed)
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> Result<bool, SensorError> {
    if !(0..sim::GPIO_COUNT).contains(&pin) {
        return Err(SensorError::GpioReadFailed);
    }
    Ok(sim::bit(pin))
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), ActuatorError> {
    if !(0..sim::GPIO_COUNT).contains(&pin) {
        return Err(ActuatorError::GpioWriteFailed);
    }
    sim::set_bit(pin, high);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_level(pin: i32) -> Result<bool, ActuatorError> {
    if !(0..sim::GPIO_COUNT).contains(&pin) {
        return Err(ActuatorError::GpioReadbackFailed);
    }
    Ok(sim::bit(pin))
}

/// Simulation: set the raw count an ADC channel returns.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, raw: u16) {
    if let Some(a) = sim::ADC.get(channel as usize) {
        a.store(raw, core::sync::atomic::Ordering::SeqCst);
    }
}

/// Simulation: drive an input pin.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_gpio(pin: i32, high: bool) {
    if (0..sim::GPIO_COUNT).contains(&pin) {
        sim::set_bit(pin, high);
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    // Each test uses its own pins/channels; the sim state is process-wide.

    #[test]
    fn sim_adc_round_trip() {
        sim_set_adc(7, 51_000);
        assert_eq!(adc1_read(7), Ok(51_000));
        assert_eq!(adc1_read(99), Err(SensorError::AdcReadFailed));
    }

    #[test]
    fn sim_gpio_write_then_read_back() {
        gpio_write(40, true).unwrap();
        assert_eq!(gpio_level(40), Ok(true));
        gpio_write(40, false).unwrap();
        assert_eq!(gpio_level(40), Ok(false));
        assert!(gpio_write(70, true).is_err());
    }

    #[test]
    fn sim_inputs_idle_high() {
        assert_eq!(gpio_read(41), Ok(true));
        sim_set_gpio(41, false);
        assert_eq!(gpio_read(41), Ok(false));
    }
}
