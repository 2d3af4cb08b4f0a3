//! Sampling driver: decides *when* a pass is emitted.
//!
//! Two modes, picked by [`DebuggerConfig::mode`](crate::config::DebuggerConfig::mode):
//!
//! - **Continuous**: a pinned thread runs an `edge-executor` with two
//!   futures.  The sampling loop emits a pass and then sleeps one interval
//!   on an `async-io-mini` reactor timer.  The link loop wakes on every
//!   queued [`LinkEvent`](crate::events::LinkEvent) and dispatches it.
//! - **Polled**: the application calls [`SamplingDriver::tick`] from its
//!   own loop.  Each tick drains link events, then emits a pass once the
//!   interval has elapsed since the previous one.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────┐
//!  │  Sampler thread (core 1)                         │
//!  │  ┌────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor              │  │
//!  │  │  ┌──────────────────┐  ┌────────────────┐  │  │
//!  │  │  │ Sampling loop    │  │ Link loop      │  │  │
//!  │  │  │ pass, sleep ⏱    │  │ wake-on-event  │  │  │
//!  │  │  └──────────────────┘  └────────────────┘  │  │
//!  │  └────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────┘
//! ```
//!
//! Emission errors are logged and swallowed; the next cycle retries.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::app::ports::{ClockPort, HardwarePort, TransportPort};
use crate::app::service::Debugger;
use crate::config::SamplingMode;
use crate::drivers::task_pin::spawn_on_core;
use crate::error::{CommsError, Error};
use crate::events::LinkEventQueue;

// ── Shared transport ─────────────────────────────────────────

/// Transport handle shared by the two futures of the continuous sampler.
/// Both run on one thread and never hold the borrow across an `.await`.
pub struct SharedTransport<T>(Rc<RefCell<T>>);

impl<T> SharedTransport<T> {
    pub fn new(transport: T) -> Self {
        Self(Rc::new(RefCell::new(transport)))
    }
}

impl<T> Clone for SharedTransport<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: TransportPort> TransportPort for SharedTransport<T> {
    fn notify(&mut self, frame: &[u8]) -> Result<(), CommsError> {
        self.0.borrow_mut().notify(frame)
    }

    fn restart_advertising(&mut self) {
        self.0.borrow_mut().restart_advertising();
    }
}

// ── Driver ───────────────────────────────────────────────────

/// Owns the adapters a pass needs and the polled-mode baseline.
pub struct SamplingDriver<H, C, T> {
    debugger: Arc<Debugger>,
    hw: H,
    clock: C,
    transport: T,
    last_emit_ms: u64,
    passes: u64,
    failed_passes: u64,
}

impl<H, C, T> SamplingDriver<H, C, T>
where
    H: HardwarePort,
    C: ClockPort,
    T: TransportPort,
{
    /// The polled baseline starts at boot (0 ms).
    pub fn new(debugger: Arc<Debugger>, hw: H, clock: C, transport: T) -> Self {
        Self {
            debugger,
            hw,
            clock,
            transport,
            last_emit_ms: 0,
            passes: 0,
            failed_passes: 0,
        }
    }

    pub fn debugger(&self) -> &Arc<Debugger> {
        &self.debugger
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Completed passes (including failed ones).
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn failed_passes(&self) -> u64 {
        self.failed_passes
    }

    /// Emit one pass now.  Returns `true` if every frame was delivered.
    pub fn emit(&mut self) -> bool {
        self.passes += 1;
        match self
            .debugger
            .send_packet(&mut self.hw, &self.clock, &mut self.transport)
        {
            Ok(frames) => {
                debug!("pass {}: {} frame(s)", self.passes, frames);
                true
            }
            Err(Error::Comms(CommsError::NotConnected)) => {
                self.failed_passes += 1;
                debug!("pass {}: no subscribed central", self.passes);
                false
            }
            Err(e) => {
                self.failed_passes += 1;
                warn!("pass {} not delivered: {}", self.passes, e);
                false
            }
        }
    }

    /// Polled-mode entry point.  Dispatches pending link events, then
    /// emits a pass if at least one interval has elapsed.  Returns `true`
    /// when a pass was emitted.
    pub fn tick(&mut self, events: &LinkEventQueue) -> bool {
        for event in events.drain() {
            self.debugger.dispatch(event, &mut self.transport);
        }

        let now = self.clock.uptime_ms();
        let interval = u64::from(self.debugger.interval_ms());
        if now.saturating_sub(self.last_emit_ms) < interval {
            return false;
        }
        self.last_emit_ms = now;
        self.emit();
        true
    }

    /// Time to wait before the next continuous pass.
    pub fn cycle(&self) -> Duration {
        Duration::from_millis(u64::from(self.debugger.interval_ms()))
    }

    /// Continuous sampling loop: first pass immediately, then one pass
    /// per interval.  The interval is re-read every cycle.
    pub async fn run(&mut self) {
        loop {
            self.emit();
            async_io_mini::Timer::after(self.cycle()).await;
        }
    }
}

/// Dispatch queued link events as they arrive.
async fn link_event_loop<T: TransportPort>(
    debugger: Arc<Debugger>,
    events: &LinkEventQueue,
    mut transport: SharedTransport<T>,
) {
    loop {
        let event = events.next().await;
        debugger.dispatch(event, &mut transport);
    }
}

/// Run the continuous sampler on the calling thread.  Never returns.
pub fn run_continuous<H, C, T>(
    debugger: Arc<Debugger>,
    hw: H,
    clock: C,
    transport: T,
    events: &LinkEventQueue,
) where
    H: HardwarePort,
    C: ClockPort,
    T: TransportPort,
{
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

    let transport = SharedTransport::new(transport);
    let mut driver = SamplingDriver::new(Arc::clone(&debugger), hw, clock, transport.clone());

    executor
        .spawn(link_event_loop(debugger, events, transport))
        .detach();

    info!("sampler started (continuous, {} ms)", driver.cycle().as_millis());
    futures_lite::future::block_on(executor.run(driver.run()));
}

// ── Mode selection ───────────────────────────────────────────

/// A started sampler.
pub enum Sampler<H, C, T> {
    /// Background thread; runs for the life of the process.
    Continuous(JoinHandle<()>),
    /// Caller drives [`SamplingDriver::tick`].
    Polled(SamplingDriver<H, C, T>),
}

/// Start sampling in the mode the debugger was configured with.
pub fn start<H, C, T>(
    debugger: Arc<Debugger>,
    hw: H,
    clock: C,
    transport: T,
    events: &'static LinkEventQueue,
) -> std::io::Result<Sampler<H, C, T>>
where
    H: HardwarePort + Send + 'static,
    C: ClockPort + Send + 'static,
    T: TransportPort + Send + 'static,
{
    match debugger.config().mode {
        SamplingMode::Polled => {
            info!("sampler started (polled)");
            Ok(Sampler::Polled(SamplingDriver::new(
                debugger, hw, clock, transport,
            )))
        }
        SamplingMode::Continuous => {
            let task = debugger.config().sampler_task;
            let handle = spawn_on_core(task, "pin-sampler\0", move || {
                run_continuous(debugger, hw, clock, transport, events);
            })?;
            Ok(Sampler::Continuous(handle))
        }
    }
}
