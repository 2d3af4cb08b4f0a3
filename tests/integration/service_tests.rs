//! End-to-end passes through `Debugger::send_packet` with the simulated
//! GPIO adapter and a recording transport.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use pinscope::adapters::hardware::GpioLines;
use pinscope::pins::Target;
use pinscope::{Debugger, DebuggerConfig, Error, ProbeCell, ValueSource};

use crate::mock_hw::{ManualClock, RecordingTransport, find_pin, pin_nums};

fn esp32_config() -> DebuggerConfig {
    DebuggerConfig {
        target: Target::Esp32,
        ..DebuggerConfig::default()
    }
}

fn rig(config: DebuggerConfig) -> (Debugger, GpioLines, ManualClock, RecordingTransport) {
    let target = config.target;
    let debugger = Debugger::new(config).unwrap();
    (
        debugger,
        GpioLines::new(target),
        ManualClock::new(),
        RecordingTransport::new(),
    )
}

#[test]
fn seeded_pass_splits_into_ordered_bounded_frames() {
    let config = DebuggerConfig {
        seed_safe_pins: true,
        ..esp32_config()
    };
    let limit = config.chunk_limit_bytes;
    let (debugger, mut hw, clock, mut link) = rig(config);
    clock.set(12_345);

    let sent = debugger.send_packet(&mut hw, &clock, &mut link).unwrap();

    let frames = link.frames();
    assert!(sent > 1, "eleven seeded pins cannot fit one 240-byte frame");
    assert_eq!(usize::from(sent), frames.len());

    for raw in link.raw_frames() {
        assert!(raw.len() < limit, "frame of {} bytes", raw.len());
    }
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame["ver"], "1.6");
        assert_eq!(frame["seq"].as_u64(), Some(i as u64));
        assert_eq!(frame["last"].as_bool(), Some(i + 1 == frames.len()));
        assert_eq!(frame["timestamp"].as_u64(), Some(12_345));
        assert_eq!(frame["rate"].as_u64(), Some(500));
    }

    let carried: Vec<u64> = frames.iter().flat_map(pin_nums).collect();
    let expected: Vec<u64> = debugger.registry().ids().into_iter().map(u64::from).collect();
    assert_eq!(carried, expected);
}

#[test]
fn empty_registry_sends_one_final_frame() {
    let (debugger, mut hw, clock, mut link) = rig(esp32_config());

    assert_eq!(debugger.send_packet(&mut hw, &clock, &mut link).unwrap(), 1);

    let frames = link.frames();
    assert_eq!(frames[0]["seq"].as_u64(), Some(0));
    assert_eq!(frames[0]["last"].as_bool(), Some(true));
    assert!(frames[0]["pins"].as_array().unwrap().is_empty());
}

#[test]
fn virtual_probe_tracks_its_cell() {
    let (debugger, mut hw, clock, mut link) = rig(esp32_config());
    let cell = Arc::new(ProbeCell::default());

    let id = debugger.probe_virtual(7, Arc::clone(&cell), "speed");
    assert_eq!(id, 100);

    cell.set(1.23456);
    debugger.send_packet(&mut hw, &clock, &mut link).unwrap();
    cell.set(-2.0);
    debugger.send_packet(&mut hw, &clock, &mut link).unwrap();

    let frames = link.frames();
    let first = find_pin(&frames[..1], 100).unwrap();
    assert_eq!(first["config"], "VIRTUAL");
    assert_eq!(first["direction"], "speed");
    assert_eq!(first["src"], "virtual");
    assert_eq!(first["voltage"], "-");
    assert_eq!(first["value"].as_f64(), Some(1.235));
    assert!(first.get("digital").is_none());
    assert!(first.get("analog").is_none());

    let second = find_pin(&frames[1..], 100).unwrap();
    assert_eq!(second["value"].as_f64(), Some(-2.0));
    assert_eq!(hw.reads(), 0, "virtual pins never touch hardware");
}

#[test]
fn physical_lines_fall_back_to_hardware() {
    let (debugger, mut hw, clock, mut link) = rig(esp32_config());
    debugger.register_pin(2, Some("DIGITAL"), Some("IN"), ValueSource::None);
    debugger.register_pin(34, Some("ANALOG"), Some("IN"), ValueSource::None);
    hw.set_digital(2, true);
    hw.set_analog(34, 4095);

    debugger.send_packet(&mut hw, &clock, &mut link).unwrap();

    let frames = link.frames();
    let led = find_pin(&frames, 2).unwrap();
    assert_eq!(led["src"], "hw");
    assert_eq!(led["value"].as_i64(), Some(1));
    assert_eq!(led["digital"].as_u64(), Some(1));
    assert!((led["voltage"].as_f64().unwrap() - 3.3).abs() < 1e-9);

    let adc = find_pin(&frames, 34).unwrap();
    assert_eq!(adc["analog"].as_u64(), Some(4095));
    assert_eq!(adc["value"].as_i64(), Some(4095));
    assert!((adc["voltage"].as_f64().unwrap() - 3.3).abs() < 1e-9);
    assert_eq!(hw.reads(), 2);
}

#[test]
fn dac_output_cached_value_is_widened() {
    let (debugger, mut hw, clock, mut link) = rig(esp32_config());
    debugger.register_pin(25, Some("ANALOG"), Some("OUT"), ValueSource::None);
    assert!(debugger.set_value(25, 128.0));

    debugger.send_packet(&mut hw, &clock, &mut link).unwrap();

    let dac = find_pin(&link.frames(), 25).unwrap();
    assert_eq!(dac["src"], "dac");
    assert_eq!(dac["analog"].as_u64(), Some(2048));
    assert_eq!(hw.reads(), 0);
}

#[test]
fn callback_source_overrides_hardware() {
    let (debugger, mut hw, clock, mut link) = rig(esp32_config());
    debugger.register_pin(13, Some("DIGITAL"), None, ValueSource::callback(|| 1.0));
    hw.set_digital(13, false);

    debugger.send_packet(&mut hw, &clock, &mut link).unwrap();

    let pin = find_pin(&link.frames(), 13).unwrap();
    assert_eq!(pin["digital"].as_u64(), Some(1));
    assert_eq!(pin["direction"], "-");
    assert_eq!(hw.reads(), 0);
}

#[test]
fn temperature_header_follows_hardware() {
    let (debugger, mut hw, clock, mut link) = rig(esp32_config());

    debugger.send_packet(&mut hw, &clock, &mut link).unwrap();
    hw.set_temperature(Some(41.237));
    debugger.send_packet(&mut hw, &clock, &mut link).unwrap();

    let frames = link.frames();
    assert!(frames[0].get("temp").is_none());
    assert_eq!(frames[1]["temp"].as_f64(), Some(41.24));
}

#[test]
fn refused_notification_surfaces_as_comms_error() {
    let (debugger, mut hw, clock, mut link) = rig(esp32_config());
    link.set_refuse(true);

    let err = debugger.send_packet(&mut hw, &clock, &mut link).unwrap_err();
    assert!(matches!(err, Error::Comms(_)));
    assert_eq!(link.frame_count(), 0);
}

#[test]
fn rate_change_is_visible_in_next_header() {
    let (debugger, mut hw, clock, mut link) = rig(esp32_config());

    assert_eq!(debugger.handle_control_write(b"{\"rate\": 5}"), Some(50));
    debugger.send_packet(&mut hw, &clock, &mut link).unwrap();
    assert_eq!(debugger.handle_control_write(b"250"), Some(250));
    debugger.send_packet(&mut hw, &clock, &mut link).unwrap();
    assert_eq!(debugger.handle_control_write(b"not a rate"), None);

    let frames = link.frames();
    assert_eq!(frames[0]["rate"].as_u64(), Some(50));
    assert_eq!(frames[1]["rate"].as_u64(), Some(250));
    assert_eq!(debugger.interval_ms(), 250);
}

#[test]
fn registration_races_with_sampling() {
    let config = esp32_config();
    let limit = config.chunk_limit_bytes;
    let debugger = Arc::new(Debugger::new(config).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let debugger = Arc::clone(&debugger);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 0..2_000u32 {
                let id = (i % 90) as u8;
                let config = if i % 2 == 0 { "ANALOG" } else { "DIGITAL" };
                debugger.register_pin(id, Some(config), Some("IN"), ValueSource::None);
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut hw = GpioLines::new(Target::Esp32);
    let clock = ManualClock::new();
    let mut link = RecordingTransport::new();
    let mut passes = 0;
    while passes < 500 || !done.load(Ordering::SeqCst) {
        link.clear();
        let sent = debugger.send_packet(&mut hw, &clock, &mut link).unwrap();

        let raw = link.raw_frames();
        let frames = link.frames();
        assert_eq!(usize::from(sent), frames.len());
        let mut seen = HashSet::new();
        for (i, frame) in frames.iter().enumerate() {
            assert!(raw[i].len() < limit, "frame of {} bytes", raw[i].len());
            assert_eq!(frame["seq"].as_u64(), Some(i as u64));
            assert_eq!(frame["last"].as_bool(), Some(i + 1 == frames.len()));
            for num in pin_nums(frame) {
                assert!(seen.insert(num), "pin {num} repeated within a pass");
            }
        }
        passes += 1;
    }

    writer.join().unwrap();
    assert_eq!(debugger.registry().len(), 90);
}

#[test]
fn callback_may_register_pins_mid_pass() {
    let debugger = Arc::new(Debugger::new(esp32_config()).unwrap());
    let weak = Arc::downgrade(&debugger);
    debugger.register_pin(
        101,
        Some("VIRTUAL"),
        Some("spawner"),
        ValueSource::callback(move || {
            if let Some(d) = weak.upgrade() {
                d.register_pin(5, Some("DIGITAL"), Some("IN"), ValueSource::None);
            }
            1.0
        }),
    );

    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(&debugger);
    thread::spawn(move || {
        let mut hw = GpioLines::new(Target::Esp32);
        let clock = ManualClock::new();
        let mut link = RecordingTransport::new();
        worker.send_packet(&mut hw, &clock, &mut link).unwrap();
        worker.send_packet(&mut hw, &clock, &mut link).unwrap();
        tx.send(link.frames()).unwrap();
    });

    let frames = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("pass with a re-entrant callback finished");
    // The pin added during the first pass shows up from the second on.
    assert_eq!(pin_nums(&frames[0]), vec![101]);
    assert_eq!(pin_nums(&frames[1]), vec![101, 5]);
    assert!(debugger.registry().find(5).is_some());
}
