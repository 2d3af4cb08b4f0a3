//! PinScope firmware: demo entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                   │
//! │                                                          │
//! │   GpioLines        UptimeClock        BleLink            │
//! │   (HardwarePort)   (ClockPort)        (TransportPort)    │
//! │                                                          │
//! │  ─────────────── Port Trait Boundary ───────────────     │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │            Debugger (pure logic)                   │  │
//! │  │  Registry · Resolver · Assembler · Rate            │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │                                                          │
//! │  Sampler (continuous task or polled) · LINK_EVENTS       │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use pinscope::adapters::ble::BleLink;
use pinscope::adapters::hardware::GpioLines;
use pinscope::adapters::log_sink::LogTransport;
use pinscope::adapters::time::UptimeClock;
use pinscope::app::ports::TransportPort;
use pinscope::events::LINK_EVENTS;
use pinscope::sampler::{self, Sampler};
use pinscope::{Debugger, DebuggerConfig, ProbeCell, ValueSource};

/// On-board LED on most ESP32 dev kits.
const LED_GPIO: u8 = 2;

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("PinScope v{} starting", env!("CARGO_PKG_VERSION"));

    let config = DebuggerConfig::default();
    let debugger = Arc::new(Debugger::new(config.clone())?);

    // ── Demo signals ──────────────────────────────────────────
    let loops = Arc::new(ProbeCell::default());
    debugger.probe_virtual(100, Arc::clone(&loops), "loop_count");
    debugger.register_pin(
        101,
        Some("VIRTUAL"),
        Some("free_heap_kb"),
        ValueSource::callback(|| {
            // SAFETY: read-only heap statistics query.
            let free = unsafe { esp_idf_svc::sys::esp_get_free_heap_size() };
            free as f32 / 1024.0
        }),
    );
    debugger.register_pin(LED_GPIO, Some("DIGITAL"), Some("OUT"), ValueSource::None);

    // ── Transport + sampler ───────────────────────────────────
    let mut link = BleLink::new(config.device_name.clone());
    match link.start() {
        Ok(()) => run(debugger, &config, link, &loops),
        Err(e) => {
            warn!("BLE unavailable ({}), mirroring frames to the log", e);
            run(debugger, &config, LogTransport::new(), &loops)
        }
    }
}

/// Start the sampler on `transport` and keep the demo probe ticking.
fn run<T>(
    debugger: Arc<Debugger>,
    config: &DebuggerConfig,
    transport: T,
    loops: &ProbeCell,
) -> Result<()>
where
    T: TransportPort + Send + 'static,
{
    let hw = GpioLines::new(config.target);
    let sampler = sampler::start(debugger, hw, UptimeClock::new(), transport, &LINK_EVENTS)?;

    match sampler {
        Sampler::Continuous(_task) => loop {
            loops.set(loops.get() + 1.0);
            std::thread::sleep(Duration::from_millis(100));
        },
        Sampler::Polled(mut driver) => loop {
            loops.set(loops.get() + 1.0);
            driver.tick(&LINK_EVENTS);
            std::thread::sleep(Duration::from_millis(10));
        },
    }
}
