//! BLE link events.
//!
//! GATT callbacks run on the Bluedroid task and must return quickly, so
//! they never touch the debugger directly.  They enqueue a [`LinkEvent`]
//! and the sampler side (continuous task or polled `tick`) dispatches it.
//!
//! ```text
//! ┌──────────────┐  LinkEvent  ┌─────────────────────┐
//! │  Bluedroid   │────────────▶│  Sampler / tick()   │
//! │  callbacks   │  (bounded)  │  Debugger::dispatch │
//! └──────────────┘             └─────────────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use log::warn;

/// Largest control write kept; longer payloads are dropped.
pub const MAX_CONTROL_WRITE: usize = 128;

/// Pending link events before new ones are dropped.
const EVENT_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Raw bytes written to the control characteristic.
    ControlWrite(Vec<u8, MAX_CONTROL_WRITE>),
    /// The central disconnected.
    PeerDisconnected,
}

/// Bounded MPMC queue between the BLE stack and the sampler.
pub struct LinkEventQueue {
    channel: Channel<CriticalSectionRawMutex, LinkEvent, EVENT_DEPTH>,
}

impl LinkEventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue a control write.  Returns `false` if it was dropped.
    pub fn push_control_write(&self, data: &[u8]) -> bool {
        let Ok(bytes) = Vec::from_slice(data) else {
            warn!(
                "control write of {} bytes exceeds {} byte buffer, dropped",
                data.len(),
                MAX_CONTROL_WRITE
            );
            return false;
        };
        self.push(LinkEvent::ControlWrite(bytes))
    }

    /// Enqueue a disconnect notification.  Returns `false` if it was dropped.
    pub fn push_disconnect(&self) -> bool {
        self.push(LinkEvent::PeerDisconnected)
    }

    fn push(&self, event: LinkEvent) -> bool {
        if self.channel.try_send(event).is_err() {
            warn!("link event queue full, dropping event");
            return false;
        }
        true
    }

    /// Next pending event, without waiting.
    pub fn try_next(&self) -> Option<LinkEvent> {
        self.channel.try_receive().ok()
    }

    /// Wait for the next event.
    pub async fn next(&self) -> LinkEvent {
        self.channel.receive().await
    }

    /// Remove and return every pending event, oldest first.
    pub fn drain(&self) -> impl Iterator<Item = LinkEvent> + '_ {
        core::iter::from_fn(|| self.try_next())
    }
}

impl Default for LinkEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue fed by the BLE adapter callbacks.
pub static LINK_EVENTS: LinkEventQueue = LinkEventQueue::new();
