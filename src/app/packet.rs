//! Packet assembler: splits one sampling pass into notification-sized
//! JSON frames.
//!
//! ```text
//!  {"ver":"1.6","timestamp":…,"rate":…,"temp":…,"seq":0,"last":false,"pins":[…]}
//!  {"ver":"1.6","timestamp":…,"rate":…,"temp":…,"seq":1,"last":true, "pins":[…]}
//! ```
//!
//! Entries are appended while the serialized frame stays below the chunk
//! limit.  An entry that would reach the limit is carried over to the next
//! frame.  The receiver concatenates `pins` across `seq` 0..=k and stops at
//! `last`.

use log::{debug, warn};
use serde::Serialize;

use crate::app::resolver::PinEntry;
use crate::error::{CommsError, Result};

/// Version tag carried in every frame header.
pub const PROTOCOL_VERSION: &str = "1.6";

/// Per-pass header values shared by every frame of the pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    /// Milliseconds since boot.
    pub timestamp: u64,
    /// Sampling interval in effect (ms).
    pub rate: u32,
    /// Die temperature in °C.
    pub temp: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Frame {
    ver: &'static str,
    timestamp: u64,
    rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp: Option<f64>,
    seq: u16,
    last: bool,
    pins: Vec<PinEntry>,
}

/// Bounded-size frame builder.
#[derive(Debug, Clone, Copy)]
pub struct PacketAssembler {
    chunk_limit: usize,
}

impl PacketAssembler {
    pub fn new(chunk_limit: usize) -> Self {
        Self { chunk_limit }
    }

    /// Serialize `entries` into frames and hand each to `emit` in order.
    ///
    /// `entries` is consumed lazily, so each pin is resolved exactly once
    /// even when it is carried over to the next frame.  An empty input
    /// yields one final frame with an empty `pins` array.
    ///
    /// Returns the number of frames emitted.  The first `emit` failure
    /// aborts the pass.
    pub fn assemble<I, F>(&self, header: FrameHeader, entries: I, mut emit: F) -> Result<u16>
    where
        I: IntoIterator<Item = PinEntry>,
        F: FnMut(&[u8]) -> core::result::Result<(), CommsError>,
    {
        let mut entries = entries.into_iter().peekable();
        let temp = header
            .temp
            .filter(|t| t.is_finite())
            .map(|t| (f64::from(t) * 100.0).round() / 100.0);
        let mut seq: u16 = 0;

        loop {
            let mut frame = Frame {
                ver: PROTOCOL_VERSION,
                timestamp: header.timestamp,
                rate: header.rate,
                temp,
                seq,
                last: false,
                pins: Vec::new(),
            };

            // Size of the frame with an empty pin list; each entry adds its
            // own length plus a separating comma after the first.
            let mut size = serde_json::to_vec(&frame)?.len();

            while let Some(entry) = entries.peek() {
                let entry_len = serde_json::to_vec(entry)?.len();
                let grown = size + entry_len + usize::from(!frame.pins.is_empty());
                if grown >= self.chunk_limit && !frame.pins.is_empty() {
                    break;
                }
                size = grown;
                if let Some(entry) = entries.next() {
                    frame.pins.push(entry);
                }
            }

            frame.last = entries.peek().is_none();
            let bytes = serde_json::to_vec(&frame)?;
            if bytes.len() >= self.chunk_limit {
                warn!(
                    "frame {} is {} bytes (limit {}), sending oversized entry alone",
                    seq,
                    bytes.len(),
                    self.chunk_limit
                );
            }
            debug!(
                "frame seq={} pins={} bytes={} last={}",
                seq,
                frame.pins.len(),
                bytes.len(),
                frame.last
            );
            emit(&bytes)?;

            seq = seq.wrapping_add(1);
            if frame.last {
                return Ok(seq);
            }
        }
    }
}
