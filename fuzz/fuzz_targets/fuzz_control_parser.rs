//! Fuzz target: `ControlCommand::parse` and `Debugger::handle_control_write`
//!
//! Arbitrary control-characteristic writes must never panic, and whatever
//! rate they request must land inside the configured bounds.
//!
//! cargo fuzz run fuzz_control_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use pinscope::app::commands::ControlCommand;
use pinscope::{Debugger, DebuggerConfig};

fuzz_target!(|data: &[u8]| {
    let _ = ControlCommand::parse(data);

    let config = DebuggerConfig::default();
    let (min, max) = (config.min_interval_ms, config.max_interval_ms);
    let Ok(debugger) = Debugger::new(config) else {
        return;
    };
    if let Some(applied) = debugger.handle_control_write(data) {
        assert!((min..=max).contains(&applied), "rate {applied} escaped clamp");
    }
    let interval = debugger.interval_ms();
    assert!((min..=max).contains(&interval));
});
