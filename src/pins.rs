//! Per-chip GPIO tables.
//!
//! Single source of truth for which lines may be probed on each target,
//! which of them are real GPIOs, and which carry a DAC.  The registry
//! seeds placeholders from [`Target::safe_pins`]; the resolver asks
//! [`Target::is_dac_pin`] to pick the `src` tag and the 8-bit DAC rescale.

use serde::{Deserialize, Serialize};

/// Pin identifier: GPIO number for physical lines, >= 100 for virtual probes.
pub type PinId = u8;

/// Lowest id a virtual probe may occupy.
pub const VIRTUAL_ID_FLOOR: PinId = 100;

/// Full-scale value of the 12-bit ADC / rescaled DAC range.
pub const ANALOG_MAX: u16 = 4095;

/// Multiplier mapping an 8-bit DAC value onto the 12-bit analog range.
pub const DAC_SCALE: i32 = 16;

// ---------------------------------------------------------------------------
// Safe-to-probe lines
// ---------------------------------------------------------------------------

/// ESP32: lines that are free on common dev boards (no flash / strapping
/// conflicts) and safe to read at any time.
const ESP32_SAFE_PINS: &[PinId] = &[2, 12, 13, 14, 15, 36, 39, 34, 35, 32, 33];

/// ESP32-S3: skips the flash/PSRAM bus (26-32) and USB-JTAG (19, 20).
const ESP32S3_SAFE_PINS: &[PinId] = &[
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 14, 15, 16, 17, 18, 21, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42,
];

/// Chip family the firmware runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Esp32,
    Esp32S3,
}

impl Target {
    /// The chip this binary was built for (`esp32s3` cfg comes from embuild).
    pub const fn detect() -> Self {
        if cfg!(esp32s3) { Self::Esp32S3 } else { Self::Esp32 }
    }

    /// Lines seeded as placeholders by [`PinRegistry::seed`](crate::app::registry::PinRegistry::seed).
    pub const fn safe_pins(self) -> &'static [PinId] {
        match self {
            Self::Esp32 => ESP32_SAFE_PINS,
            Self::Esp32S3 => ESP32S3_SAFE_PINS,
        }
    }

    /// Whether `pin` names a GPIO that exists on this chip.
    pub const fn is_real_gpio(self, pin: PinId) -> bool {
        match self {
            Self::Esp32 => pin <= 39,
            Self::Esp32S3 => pin <= 21 || (pin >= 26 && pin <= 48),
        }
    }

    /// Whether `pin` is wired to the on-chip DAC (ESP32 only: GPIO 25/26).
    pub const fn is_dac_pin(self, pin: PinId) -> bool {
        match self {
            Self::Esp32 => pin == 25 || pin == 26,
            Self::Esp32S3 => false,
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::detect()
    }
}
