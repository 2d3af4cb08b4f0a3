//! Debugger service: the telemetry core behind one shared handle.
//!
//! [`Debugger`] owns the pin registry, the rate state and the frame
//! encoders.  Every method takes `&self`, so one `Arc<Debugger>` is shared
//! by the application (registering pins), the BLE callbacks (via link
//! events) and the sampler.  All I/O flows through port traits passed in
//! at call sites.
//!
//! ```text
//!  HardwarePort ──▶ ┌─────────────────────────────┐ ──▶ TransportPort
//!  ClockPort    ──▶ │          Debugger           │
//!  LinkEvent    ──▶ │ registry · rate · assembler │
//!                   └─────────────────────────────┘
//! ```

use std::sync::Arc;

use log::{debug, info};

use crate::config::DebuggerConfig;
use crate::error::Result;
use crate::events::LinkEvent;
use crate::pins::PinId;

use super::commands::ControlCommand;
use super::packet::{FrameHeader, PacketAssembler};
use super::ports::{ClockPort, HardwarePort, TransportPort};
use super::rate::RateState;
use super::registry::{PinRegistry, ProbeCell, ValueSource};
use super::resolver::ValueResolver;

pub struct Debugger {
    config: DebuggerConfig,
    registry: PinRegistry,
    rate: RateState,
    resolver: ValueResolver,
    assembler: PacketAssembler,
}

impl Debugger {
    /// Validate `config` and build the core.  Seeds the safe-pin
    /// placeholders when `seed_safe_pins` is set.
    pub fn new(config: DebuggerConfig) -> Result<Self> {
        config.validate()?;

        let debugger = Self {
            registry: PinRegistry::new(),
            rate: RateState::new(
                config.initial_interval_ms,
                config.min_interval_ms,
                config.max_interval_ms,
            ),
            resolver: ValueResolver::new(config.target, config.reference_voltage),
            assembler: PacketAssembler::new(config.chunk_limit_bytes),
            config,
        };

        if debugger.config.seed_safe_pins {
            debugger.seed_safe_pins();
        }
        info!(
            "debugger ready: {:?}, interval {} ms, chunk limit {} B",
            debugger.config.target,
            debugger.rate.interval_ms(),
            debugger.config.chunk_limit_bytes
        );
        Ok(debugger)
    }

    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    pub fn registry(&self) -> &PinRegistry {
        &self.registry
    }

    pub fn rate(&self) -> &RateState {
        &self.rate
    }

    pub fn interval_ms(&self) -> u32 {
        self.rate.interval_ms()
    }

    // ── Application API ───────────────────────────────────────

    /// Register a pin or update an existing one.
    pub fn register_pin(
        &self,
        id: PinId,
        config: Option<&str>,
        direction: Option<&str>,
        source: ValueSource,
    ) {
        debug!("register pin {} config={:?} dir={:?}", id, config, direction);
        self.registry.register(id, config, direction, source);
    }

    /// Expose an application variable as a virtual pin.
    pub fn probe_virtual(&self, id: PinId, cell: Arc<ProbeCell>, label: &str) -> PinId {
        let effective = self.registry.probe_virtual(id, cell, label);
        if effective != id {
            info!("virtual probe '{}' moved from id {} to {}", label, id, effective);
        }
        effective
    }

    /// Set the cached value of a pin without an override source.
    pub fn set_value(&self, id: PinId, value: f32) -> bool {
        self.registry.set_value(id, value)
    }

    /// Add placeholders for the target's safe lines.  Idempotent.
    pub fn seed_safe_pins(&self) -> usize {
        let added = self.registry.seed(self.config.target.safe_pins());
        info!("seeded {} safe pins for {:?}", added, self.config.target);
        added
    }

    // ── Sampling ──────────────────────────────────────────────

    /// Resolve every pin once and emit the pass as one or more frames.
    /// Returns the number of frames sent.
    pub fn send_packet<H, C, T>(&self, hw: &mut H, clock: &C, transport: &mut T) -> Result<u16>
    where
        H: HardwarePort + ?Sized,
        C: ClockPort + ?Sized,
        T: TransportPort + ?Sized,
    {
        let temp = if self.config.report_temperature {
            hw.chip_temperature_c()
        } else {
            None
        };
        let header = FrameHeader {
            timestamp: clock.uptime_ms(),
            rate: self.rate.interval_ms(),
            temp,
        };

        let pins = self.registry.snapshot();
        let resolver = self.resolver;
        let entries = pins.iter().map(|pin| resolver.resolve(pin, hw));
        self.assembler
            .assemble(header, entries, |frame| transport.notify(frame))
    }

    // ── Link events ───────────────────────────────────────────

    /// Apply a control-characteristic write.  Malformed input is ignored.
    /// Returns the interval now in effect when a command was recognized.
    pub fn handle_control_write(&self, bytes: &[u8]) -> Option<u32> {
        match ControlCommand::parse(bytes) {
            Some(ControlCommand::SetRate(ms)) => Some(self.rate.set_clamped(ms)),
            None => {
                debug!("ignoring control write ({} bytes)", bytes.len());
                None
            }
        }
    }

    /// The central went away: become discoverable again.
    pub fn handle_disconnect<T: TransportPort + ?Sized>(&self, transport: &mut T) {
        info!("central disconnected, restarting advertising");
        transport.restart_advertising();
    }

    /// Route one queued link event to its handler.
    pub fn dispatch<T: TransportPort + ?Sized>(&self, event: LinkEvent, transport: &mut T) {
        match event {
            LinkEvent::ControlWrite(bytes) => {
                self.handle_control_write(&bytes);
            }
            LinkEvent::PeerDisconnected => self.handle_disconnect(transport),
        }
    }
}
