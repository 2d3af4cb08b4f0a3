//! Sampling driver: polled tick cadence, link-event dispatch and the
//! continuous background task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pinscope::adapters::hardware::GpioLines;
use pinscope::events::LinkEventQueue;
use pinscope::pins::Target;
use pinscope::sampler::{self, Sampler, SamplingDriver};
use pinscope::{Debugger, DebuggerConfig, SamplingMode};

use crate::mock_hw::{ManualClock, RecordingTransport};

type Driver = SamplingDriver<GpioLines, ManualClock, RecordingTransport>;

fn polled() -> (Driver, ManualClock, RecordingTransport) {
    let config = DebuggerConfig {
        target: Target::Esp32,
        mode: SamplingMode::Polled,
        ..DebuggerConfig::default()
    };
    let debugger = Arc::new(Debugger::new(config).unwrap());
    let clock = ManualClock::new();
    let link = RecordingTransport::new();
    let driver = SamplingDriver::new(
        debugger,
        GpioLines::new(Target::Esp32),
        clock.clone(),
        link.clone(),
    );
    (driver, clock, link)
}

#[test]
fn tick_waits_one_interval_from_boot() {
    let (mut driver, clock, link) = polled();
    let events = LinkEventQueue::new();

    clock.set(499);
    assert!(!driver.tick(&events));
    assert_eq!(link.frame_count(), 0);

    clock.set(500);
    assert!(driver.tick(&events));
    assert_eq!(link.frame_count(), 1);

    clock.set(999);
    assert!(!driver.tick(&events));
    clock.set(1_000);
    assert!(driver.tick(&events));
    assert_eq!(driver.passes(), 2);
}

#[test]
fn late_tick_rebases_on_current_time() {
    let (mut driver, clock, _link) = polled();
    let events = LinkEventQueue::new();

    clock.set(1_700);
    assert!(driver.tick(&events));
    // Next pass is due 500 ms after the late one, not at 2 000.
    clock.set(2_100);
    assert!(!driver.tick(&events));
    clock.set(2_200);
    assert!(driver.tick(&events));
}

#[test]
fn tick_applies_queued_rate_before_deciding() {
    let (mut driver, clock, link) = polled();
    let events = LinkEventQueue::new();

    assert!(events.push_control_write(b"{\"dbg_int\": 100}"));
    clock.set(100);
    assert!(driver.tick(&events));
    assert_eq!(driver.debugger().interval_ms(), 100);
    assert_eq!(link.frames()[0]["rate"].as_u64(), Some(100));
    assert!(events.try_next().is_none());
}

#[test]
fn tick_restarts_advertising_on_disconnect() {
    let (mut driver, clock, link) = polled();
    let events = LinkEventQueue::new();

    events.push_disconnect();
    clock.set(10);
    assert!(!driver.tick(&events));
    assert_eq!(link.adverts(), 1);
}

#[test]
fn failed_pass_is_counted_and_retried() {
    let (mut driver, clock, link) = polled();
    let events = LinkEventQueue::new();

    link.set_refuse(true);
    clock.set(500);
    assert!(driver.tick(&events));
    assert_eq!(driver.failed_passes(), 1);

    link.set_refuse(false);
    clock.set(1_000);
    assert!(driver.tick(&events));
    assert_eq!(driver.failed_passes(), 1);
    assert_eq!(link.frame_count(), 1);
}

// ── Continuous mode ──────────────────────────────────────────

static CONTINUOUS_EVENTS: LinkEventQueue = LinkEventQueue::new();

fn wait_for(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn continuous_task_emits_and_dispatches() {
    let config = DebuggerConfig {
        target: Target::Esp32,
        initial_interval_ms: 50,
        ..DebuggerConfig::default()
    };
    let debugger = Arc::new(Debugger::new(config).unwrap());
    let link = RecordingTransport::new();

    let started = sampler::start(
        Arc::clone(&debugger),
        GpioLines::new(Target::Esp32),
        ManualClock::new(),
        link.clone(),
        &CONTINUOUS_EVENTS,
    )
    .unwrap();
    assert!(matches!(started, Sampler::Continuous(_)));

    assert!(
        wait_for(Duration::from_secs(5), || link.frame_count() >= 2),
        "continuous sampler produced {} frames",
        link.frame_count()
    );

    assert!(CONTINUOUS_EVENTS.push_control_write(b"60"));
    assert!(wait_for(Duration::from_secs(5), || debugger.interval_ms() == 60));

    CONTINUOUS_EVENTS.push_disconnect();
    assert!(wait_for(Duration::from_secs(5), || link.adverts() == 1));
}
