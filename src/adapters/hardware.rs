//! GPIO / ADC adapter: the only module that reads physical lines.
//!
//! - **`target_os = "espidf"`**: `gpio_get_level()` for digital lines, the
//!   ADC oneshot driver for analog lines (units and channels are set up
//!   lazily on first read, 12 dB attenuation, 12-bit width), and the
//!   on-chip temperature sensor (IDF driver, or the ROM reader on the
//!   classic ESP32).
//! - **all other targets**: per-instance injectable levels for host tests.

use crate::app::ports::HardwarePort;
use crate::pins::{PinId, Target};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::{info, warn};

// ───────────────────────────────────────────────────────────────
// ESP-IDF driver handles
// ───────────────────────────────────────────────────────────────

/// Oneshot ADC unit handle plus the channels already configured on it.
#[cfg(target_os = "espidf")]
struct AdcUnit {
    handle: adc_oneshot_unit_handle_t,
    configured: u32,
}

// SAFETY: the IDF oneshot driver is thread-safe per unit and the handle is
// owned by exactly one `GpioLines`.
#[cfg(target_os = "espidf")]
unsafe impl Send for AdcUnit {}

/// IDF temperature sensor driver (ESP32-S3 and later parts).
#[cfg(target_os = "espidf")]
#[cfg(not(esp32))]
struct TempSensor(temperature_sensor_handle_t);

// SAFETY: as above; the handle is only used through `&mut GpioLines`.
#[cfg(target_os = "espidf")]
#[cfg(not(esp32))]
unsafe impl Send for TempSensor {}

/// Classic ESP32: the ROM/PHY reader, no driver handle.
#[cfg(target_os = "espidf")]
#[cfg(esp32)]
struct TempSensor;

#[cfg(target_os = "espidf")]
#[cfg(esp32)]
unsafe extern "C" {
    /// Raw die temperature in °F (the symbol name is misspelled upstream).
    fn temprature_sens_read() -> u8;
}

/// Convert the classic ESP32 ROM reading (°F) to °C.
#[cfg_attr(not(all(target_os = "espidf", esp32)), allow(dead_code))]
fn rom_reading_to_celsius(fahrenheit: u8) -> f32 {
    (f32::from(fahrenheit) - 32.0) / 1.8
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

/// [`HardwarePort`] over the chip's GPIO matrix and ADCs.
pub struct GpioLines {
    target: Target,
    #[cfg(target_os = "espidf")]
    adc: [Option<AdcUnit>; 2],
    #[cfg(target_os = "espidf")]
    temp: Option<TempSensor>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimLines,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimLines {
    digital: std::collections::HashMap<PinId, bool>,
    analog: std::collections::HashMap<PinId, u16>,
    temperature: Option<f32>,
    reads: usize,
}

impl GpioLines {
    #[cfg(target_os = "espidf")]
    pub fn new(target: Target) -> Self {
        Self {
            target,
            adc: [None, None],
            temp: init_temp_sensor(),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(target: Target) -> Self {
        Self {
            target,
            sim: SimLines::default(),
        }
    }

}

// ── ESP-IDF implementation ────────────────────────────────────

#[cfg(target_os = "espidf")]
impl GpioLines {
    /// Map a GPIO to its ADC unit/channel, creating and configuring the
    /// unit on first use.  `None` if the line has no ADC.
    fn adc_channel(&mut self, pin: PinId) -> Option<(adc_oneshot_unit_handle_t, adc_channel_t)> {
        let mut unit: adc_unit_t = 0;
        let mut channel: adc_channel_t = 0;
        // SAFETY: out-pointers reference live locals.
        let ret = unsafe { adc_oneshot_io_to_channel(i32::from(pin), &mut unit, &mut channel) };
        if ret != ESP_OK as i32 {
            return None;
        }

        let slot = self.adc.get_mut(unit as usize)?;
        if slot.is_none() {
            let init_cfg = adc_oneshot_unit_init_cfg_t {
                unit_id: unit,
                ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..Default::default()
            };
            let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
            // SAFETY: `handle` outlives the call; the unit is created once.
            let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) };
            if ret != ESP_OK as i32 {
                warn!("ADC unit {} init failed (rc={})", unit, ret);
                return None;
            }
            info!("ADC unit {} ready", unit);
            *slot = Some(AdcUnit {
                handle,
                configured: 0,
            });
        }

        let adc = slot.as_mut()?;
        let bit = 1u32 << channel;
        if adc.configured & bit == 0 {
            let chan_cfg = adc_oneshot_chan_cfg_t {
                atten: adc_atten_t_ADC_ATTEN_DB_12,
                bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            // SAFETY: handle was created above and is still owned by us.
            let ret = unsafe { adc_oneshot_config_channel(adc.handle, channel, &chan_cfg) };
            if ret != ESP_OK as i32 {
                warn!("ADC channel config for GPIO{} failed (rc={})", pin, ret);
                return None;
            }
            adc.configured |= bit;
        }
        Some((adc.handle, channel))
    }
}

#[cfg(target_os = "espidf")]
#[cfg(not(esp32))]
fn init_temp_sensor() -> Option<TempSensor> {
    let cfg = temperature_sensor_config_t {
        range_min: -10,
        range_max: 80,
        ..Default::default()
    };
    let mut handle: temperature_sensor_handle_t = core::ptr::null_mut();
    // SAFETY: `cfg` and `handle` outlive the calls.
    let ret = unsafe { temperature_sensor_install(&cfg, &mut handle) };
    if ret != ESP_OK as i32 {
        warn!("temperature sensor install failed (rc={})", ret);
        return None;
    }
    // SAFETY: handle was just installed.
    let ret = unsafe { temperature_sensor_enable(handle) };
    if ret != ESP_OK as i32 {
        warn!("temperature sensor enable failed (rc={})", ret);
        return None;
    }
    Some(TempSensor(handle))
}

#[cfg(target_os = "espidf")]
#[cfg(esp32)]
fn init_temp_sensor() -> Option<TempSensor> {
    info!("die temperature via ROM sensor reader");
    Some(TempSensor)
}

#[cfg(target_os = "espidf")]
#[cfg(not(esp32))]
impl TempSensor {
    fn celsius(&self) -> Option<f32> {
        let mut celsius: f32 = 0.0;
        // SAFETY: sensor handle is installed and enabled.
        let ret = unsafe { temperature_sensor_get_celsius(self.0, &mut celsius) };
        (ret == ESP_OK as i32).then_some(celsius)
    }
}

#[cfg(target_os = "espidf")]
#[cfg(esp32)]
impl TempSensor {
    fn celsius(&self) -> Option<f32> {
        // SAFETY: ROM routine with no arguments or preconditions.
        let raw = unsafe { temprature_sens_read() };
        Some(rom_reading_to_celsius(raw))
    }
}

#[cfg(target_os = "espidf")]
impl HardwarePort for GpioLines {
    fn digital_read(&mut self, pin: PinId) -> bool {
        if !self.target.is_real_gpio(pin) {
            return false;
        }
        // SAFETY: `pin` is a valid GPIO number on this target.
        unsafe { gpio_get_level(i32::from(pin)) != 0 }
    }

    fn analog_read(&mut self, pin: PinId) -> u16 {
        let Some((handle, channel)) = self.adc_channel(pin) else {
            return 0;
        };
        let mut raw: i32 = 0;
        // SAFETY: handle/channel were configured by `adc_channel`.
        let ret = unsafe { adc_oneshot_read(handle, channel, &mut raw) };
        if ret != ESP_OK as i32 {
            return 0;
        }
        raw.max(0) as u16
    }

    fn chip_temperature_c(&mut self) -> Option<f32> {
        self.temp.as_ref()?.celsius()
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl GpioLines {
    pub fn set_digital(&mut self, pin: PinId, high: bool) {
        self.sim.digital.insert(pin, high);
    }

    pub fn set_analog(&mut self, pin: PinId, raw: u16) {
        self.sim.analog.insert(pin, raw);
    }

    pub fn set_temperature(&mut self, celsius: Option<f32>) {
        self.sim.temperature = celsius;
    }

    /// Digital plus analog reads served so far.
    pub fn reads(&self) -> usize {
        self.sim.reads
    }
}

#[cfg(not(target_os = "espidf"))]
impl HardwarePort for GpioLines {
    fn digital_read(&mut self, pin: PinId) -> bool {
        self.sim.reads += 1;
        self.target.is_real_gpio(pin) && self.sim.digital.get(&pin).copied().unwrap_or(false)
    }

    fn analog_read(&mut self, pin: PinId) -> u16 {
        self.sim.reads += 1;
        self.sim.analog.get(&pin).copied().unwrap_or(0)
    }

    fn chip_temperature_c(&mut self) -> Option<f32> {
        self.sim.temperature
    }
}
