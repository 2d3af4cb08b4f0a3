//! BLE link (simulated Bluedroid) driving the debugger through the event
//! queue, the way the GATT callbacks do on the device.

use std::sync::Arc;

use pinscope::adapters::ble::{BleLink, BleState};
use pinscope::adapters::hardware::GpioLines;
use pinscope::app::ports::TransportPort;
use pinscope::events::{LinkEvent, LinkEventQueue, MAX_CONTROL_WRITE};
use pinscope::pins::Target;
use pinscope::sampler::SamplingDriver;
use pinscope::{CommsError, Debugger, DebuggerConfig, ProbeCell, SamplingMode};

use crate::mock_hw::ManualClock;

fn link() -> BleLink {
    let config = DebuggerConfig::default();
    let mut link = BleLink::new(config.device_name);
    link.start().unwrap();
    link
}

fn driver(link: BleLink) -> (SamplingDriver<GpioLines, ManualClock, BleLink>, ManualClock) {
    let config = DebuggerConfig {
        target: Target::Esp32,
        mode: SamplingMode::Polled,
        ..DebuggerConfig::default()
    };
    let debugger = Arc::new(Debugger::new(config).unwrap());
    let clock = ManualClock::new();
    let driver = SamplingDriver::new(debugger, GpioLines::new(Target::Esp32), clock.clone(), link);
    (driver, clock)
}

#[test]
fn advertises_under_configured_name() {
    let link = link();
    assert_eq!(link.state(), BleState::Advertising);
    assert_eq!(link.device_name(), "ESP32-device");
}

#[test]
fn frames_flow_only_to_a_subscribed_central() {
    let (mut driver, clock) = driver(link());
    let events = LinkEventQueue::new();
    let cell = Arc::new(ProbeCell::new(3.0));
    driver.debugger().probe_virtual(100, cell, "counter");

    clock.set(500);
    assert!(driver.tick(&events));
    assert_eq!(driver.failed_passes(), 1);
    assert!(driver.transport().sim_frames().is_empty());

    driver.transport_mut().sim_connect();
    clock.set(1_000);
    assert!(driver.tick(&events));
    let frames = driver.transport_mut().sim_take_frames();
    assert_eq!(frames.len(), 1);

    let frame: serde_json::Value = serde_json::from_slice(&frames[0]).unwrap();
    assert_eq!(frame["pins"][0]["num"].as_u64(), Some(100));
    assert_eq!(frame["pins"][0]["value"].as_f64(), Some(3.0));
}

#[test]
fn control_write_changes_rate_through_queue() {
    let (mut driver, _clock) = driver(link());
    let events = LinkEventQueue::new();
    driver.transport_mut().sim_connect();

    assert!(driver.transport().sim_control_write(&events, b"  1000\r\n"));
    driver.tick(&events);
    assert_eq!(driver.debugger().interval_ms(), 1_000);

    assert!(driver.transport().sim_control_write(&events, b"{\"rate\":999999}"));
    driver.tick(&events);
    assert_eq!(driver.debugger().interval_ms(), 60_000);
}

#[test]
fn oversized_control_write_is_dropped_at_the_queue() {
    let events = LinkEventQueue::new();
    let link = link();
    let big = vec![b'1'; MAX_CONTROL_WRITE + 1];

    assert!(!link.sim_control_write(&events, &big));
    assert!(events.try_next().is_none());
}

#[test]
fn disconnect_readvertises_and_stops_delivery() {
    let (mut driver, clock) = driver(link());
    let events = LinkEventQueue::new();
    driver.transport_mut().sim_connect();

    driver.transport_mut().sim_disconnect(&events);
    assert!(matches!(events.try_next(), Some(LinkEvent::PeerDisconnected)));
    events.push_disconnect();

    clock.set(500);
    driver.tick(&events);
    assert_eq!(driver.transport().sim_adverts(), 1);
    assert_eq!(driver.transport().state(), BleState::Advertising);
    assert_eq!(
        driver.transport_mut().notify(b"{}"),
        Err(CommsError::NotConnected)
    );
}
