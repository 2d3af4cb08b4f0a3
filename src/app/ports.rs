//! Port traits: the boundary between the telemetry core and the chip.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Debugger (domain)
//! ```
//!
//! Driven adapters (GPIO/ADC lines, the uptime clock, the BLE link)
//! implement these traits.  The [`Debugger`](super::service::Debugger)
//! and [`SamplingDriver`](crate::sampler::SamplingDriver) consume them via
//! generics, so the core never touches hardware directly and runs
//! unchanged on the host.

use crate::error::CommsError;
use crate::pins::PinId;

// ───────────────────────────────────────────────────────────────
// Hardware port (driven adapter: chip → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for physical lines.
///
/// Reads must be side-effect free: the resolver may call them for any
/// registered physical pin on every pass.
pub trait HardwarePort {
    /// Logic level of a digital line.  Lines that do not exist read low.
    fn digital_read(&mut self, pin: PinId) -> bool;

    /// Raw 12-bit ADC reading.  Values above 4095 are clamped by the caller.
    fn analog_read(&mut self, pin: PinId) -> u16;

    /// Die temperature in °C, or `None` when the sensor is unavailable.
    fn chip_temperature_c(&mut self) -> Option<f32>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source for frame timestamps and polled scheduling.
pub trait ClockPort {
    /// Milliseconds since boot.
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain → BLE central)
// ───────────────────────────────────────────────────────────────

/// Outbound telemetry channel.
pub trait TransportPort {
    /// Deliver one serialized frame as a single notification.
    ///
    /// Implementations must not split or merge frames.
    fn notify(&mut self, frame: &[u8]) -> Result<(), CommsError>;

    /// Make the device discoverable again after the central went away.
    fn restart_advertising(&mut self);
}

impl<T: HardwarePort + ?Sized> HardwarePort for &mut T {
    fn digital_read(&mut self, pin: PinId) -> bool {
        (**self).digital_read(pin)
    }

    fn analog_read(&mut self, pin: PinId) -> u16 {
        (**self).analog_read(pin)
    }

    fn chip_temperature_c(&mut self) -> Option<f32> {
        (**self).chip_temperature_c()
    }
}

impl<T: TransportPort + ?Sized> TransportPort for &mut T {
    fn notify(&mut self, frame: &[u8]) -> Result<(), CommsError> {
        (**self).notify(frame)
    }

    fn restart_advertising(&mut self) {
        (**self).restart_advertising();
    }
}
