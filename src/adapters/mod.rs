//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements     | Connects to                    |
//! |-------------|----------------|--------------------------------|
//! | `ble`       | TransportPort  | Bluedroid GATT server          |
//! | `hardware`  | HardwarePort   | GPIO matrix, ADC oneshot, TSENS|
//! | `log_sink`  | TransportPort  | Serial log output              |
//! | `time`      | ClockPort      | ESP32 high-resolution timer    |

pub mod ble;
pub mod hardware;
pub mod log_sink;
pub mod time;
