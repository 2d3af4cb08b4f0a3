//! Log-based transport adapter.
//!
//! Implements [`TransportPort`] by writing every frame to the logger
//! (UART / USB-CDC on the device, stderr on the host).  Useful as a serial
//! mirror while bringing up a board, and for host runs with no BLE stack.

use log::info;

use crate::app::ports::TransportPort;
use crate::error::CommsError;

/// Transport that prints frames instead of notifying them.
#[derive(Debug, Default)]
pub struct LogTransport {
    frames: u64,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl TransportPort for LogTransport {
    fn notify(&mut self, frame: &[u8]) -> Result<(), CommsError> {
        self.frames += 1;
        match core::str::from_utf8(frame) {
            Ok(text) => info!("FRAME | {}", text),
            Err(_) => info!("FRAME | {} bytes (not UTF-8)", frame.len()),
        }
        Ok(())
    }

    fn restart_advertising(&mut self) {
        info!("FRAME | link reset (no advertising on log transport)");
    }
}
