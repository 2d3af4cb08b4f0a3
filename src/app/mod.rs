//! Application core: pure telemetry logic, zero I/O.
//!
//! Pin bookkeeping, value encoding, frame chunking and the control
//! protocol live here.  All interaction with the chip and the BLE stack
//! happens through the port traits in [`ports`], so this layer is fully
//! testable without real peripherals.

pub mod commands;
pub mod packet;
pub mod ports;
pub mod rate;
pub mod registry;
pub mod resolver;
pub mod service;
