//! PinScope: live pin and variable telemetry over BLE.
//!
//! Exposes the telemetry core and its adapters for the firmware binary,
//! integration tests and fuzzing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; building for the
//! device requires the `espidf` feature.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod pins;
pub mod sampler;

// Host builds: link the std critical-section impl used by embassy-sync
// and the std time driver behind `async_io_mini::Timer`.
#[cfg(not(target_os = "espidf"))]
use critical_section as _;
#[cfg(not(target_os = "espidf"))]
use embassy_time as _;

pub use app::registry::{ProbeCell, ValueSource};
pub use app::service::Debugger;
pub use config::{DebuggerConfig, SamplingMode};
pub use error::{CommsError, Error};
