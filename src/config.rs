//! Debugger configuration parameters
//!
//! Everything here is fixed at start-up.  The only value that changes at
//! runtime is the sampling interval, which starts at
//! [`DebuggerConfig::initial_interval_ms`] and is then owned by
//! [`RateState`](crate::app::rate::RateState).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pins::Target;

/// How frames are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingMode {
    /// A pinned background task emits a pass, then sleeps one interval.
    Continuous,
    /// The application calls [`SamplingDriver::tick`](crate::sampler::SamplingDriver::tick)
    /// from its own loop.
    Polled,
}

/// Placement of the continuous sampler task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskConfig {
    /// CPU core (0 = PRO, 1 = APP).
    pub core: u8,
    /// FreeRTOS priority.
    pub priority: u8,
    /// Stack size in KiB.
    pub stack_kb: usize,
}

/// Core debugger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebuggerConfig {
    // --- BLE ---
    /// GAP device name used while advertising.
    pub device_name: heapless::String<24>,

    // --- Sampling ---
    /// Sampling interval at boot (milliseconds).
    pub initial_interval_ms: u32,
    /// Lower clamp for remote rate requests (milliseconds).
    pub min_interval_ms: u32,
    /// Upper clamp for remote rate requests (milliseconds).
    pub max_interval_ms: u32,
    /// Continuous task or externally polled.
    pub mode: SamplingMode,
    /// Where the continuous sampler runs.
    pub sampler_task: TaskConfig,

    // --- Frames ---
    /// Serialized frames stay below this many bytes (one BLE notification).
    pub chunk_limit_bytes: usize,
    /// Include the die temperature (`temp`) in every header.
    pub report_temperature: bool,
    /// Full-scale voltage of the ADC / logic-high level (volts).
    pub reference_voltage: f64,

    // --- Pins ---
    /// Chip family, selects the safe-pin and DAC tables.
    pub target: Target,
    /// Seed placeholders for every safe pin at start-up.
    pub seed_safe_pins: bool,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        let _ = device_name.push_str("ESP32-device");

        Self {
            device_name,

            // Sampling
            initial_interval_ms: 500,
            min_interval_ms: 50,
            max_interval_ms: 60_000, // 1/min
            mode: SamplingMode::Continuous,
            sampler_task: TaskConfig {
                core: 1,
                priority: 1,
                // serde_json + executor; 4 KB overflows on Xtensa.
                stack_kb: 8,
            },

            // Frames
            chunk_limit_bytes: 240, // fits a 247-byte ATT MTU
            report_temperature: true,
            reference_voltage: 3.3,

            // Pins
            target: Target::detect(),
            seed_safe_pins: false,
        }
    }
}

impl DebuggerConfig {
    /// Reject values the core cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.min_interval_ms == 0 {
            return Err(Error::Config("min_interval_ms must be non-zero"));
        }
        if self.min_interval_ms > self.max_interval_ms {
            return Err(Error::Config("min_interval_ms > max_interval_ms"));
        }
        if !(self.min_interval_ms..=self.max_interval_ms).contains(&self.initial_interval_ms) {
            return Err(Error::Config("initial_interval_ms outside [min, max]"));
        }
        if self.chunk_limit_bytes == 0 {
            return Err(Error::Config("chunk_limit_bytes must be non-zero"));
        }
        if !(self.reference_voltage.is_finite() && self.reference_voltage > 0.0) {
            return Err(Error::Config("reference_voltage must be positive"));
        }
        if self.device_name.is_empty() {
            return Err(Error::Config("device_name must not be empty"));
        }
        Ok(())
    }
}
