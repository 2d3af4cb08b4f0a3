//! Mock adapters for integration tests.
//!
//! The clock and transport share their state through `Arc`s so a test can
//! keep a handle after moving the adapter into a sampler (possibly on
//! another thread) and still drive time or inspect the notified frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use pinscope::CommsError;
use pinscope::app::ports::{ClockPort, TransportPort};
use serde_json::Value;

// ── ManualClock ───────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl ClockPort for ManualClock {
    fn uptime_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

// ── RecordingTransport ────────────────────────────────────────

#[derive(Default)]
struct Recorded {
    frames: Vec<Vec<u8>>,
    adverts: usize,
    refuse: bool,
}

/// Captures every notified frame.  Clones share one record.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recorded>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent notifications fail as if no central were subscribed.
    pub fn set_refuse(&self, refuse: bool) {
        self.inner.lock().unwrap().refuse = refuse;
    }

    pub fn frame_count(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }

    pub fn adverts(&self) -> usize {
        self.inner.lock().unwrap().adverts
    }

    /// Every frame so far, parsed as JSON.
    pub fn frames(&self) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap()
            .frames
            .iter()
            .map(|f| serde_json::from_slice(f).expect("frame is valid JSON"))
            .collect()
    }

    pub fn raw_frames(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().frames.clone()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().frames.clear();
    }
}

impl TransportPort for RecordingTransport {
    fn notify(&mut self, frame: &[u8]) -> Result<(), CommsError> {
        let mut rec = self.inner.lock().unwrap();
        if rec.refuse {
            return Err(CommsError::NotConnected);
        }
        rec.frames.push(frame.to_vec());
        Ok(())
    }

    fn restart_advertising(&mut self) {
        self.inner.lock().unwrap().adverts += 1;
    }
}

// ── Frame helpers ─────────────────────────────────────────────

/// Pin numbers carried by `frame`, in order.
#[allow(dead_code)]
pub fn pin_nums(frame: &Value) -> Vec<u64> {
    frame["pins"]
        .as_array()
        .expect("pins array")
        .iter()
        .map(|p| p["num"].as_u64().expect("num"))
        .collect()
}

/// The entry for pin `num` across all frames of a pass.
#[allow(dead_code)]
pub fn find_pin(frames: &[Value], num: u64) -> Option<Value> {
    frames
        .iter()
        .flat_map(|f| f["pins"].as_array().cloned().unwrap_or_default())
        .find(|p| p["num"].as_u64() == Some(num))
}
