//! Unified error types for the PinScope telemetry core.
//!
//! The core absorbs almost every failure into a fallback (ignore, clamp,
//! degrade), so this enum stays small: it covers invalid configuration,
//! transport delivery failures surfaced by adapters, and frame encoding.
//! All variants are `Copy` so they can be logged and passed around freely.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Configuration is invalid. The message names the offending field.
    Config(&'static str),
    /// The transport could not deliver a frame.
    Comms(CommsError),
    /// A telemetry frame could not be serialized.
    Encode,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Encode => write!(f, "frame encoding failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// No central is connected / subscribed.
    NotConnected,
    /// The BLE stack rejected the notification.
    NotifyFailed,
    /// The BLE stack could not be brought up.
    StackInitFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no central connected"),
            Self::NotifyFailed => write!(f, "notification rejected by BLE stack"),
            Self::StackInitFailed => write!(f, "BLE init failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        log::warn!("frame encoding failed: {}", e);
        Self::Encode
    }
}

impl std::error::Error for Error {}
impl std::error::Error for CommsError {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
