//! Peripheral helpers.

pub mod task_pin;
#[cfg(target_os = "espidf")]
pub mod time_driver;
