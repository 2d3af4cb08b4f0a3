//! Fuzz target: `PacketAssembler::assemble`
//!
//! Builds a registry from the input bytes (id, kind, value triples), then
//! assembles one pass and checks that every frame is valid JSON, frames
//! are numbered from zero, only the final one is marked `last`, and each
//! frame stays under the limit unless it carries a single entry.
//!
//! cargo fuzz run fuzz_packet_assembler

#![no_main]

use libfuzzer_sys::fuzz_target;
use pinscope::app::packet::{FrameHeader, PacketAssembler};
use pinscope::app::ports::HardwarePort;
use pinscope::app::registry::{PinRegistry, ValueSource};
use pinscope::app::resolver::ValueResolver;
use pinscope::pins::{PinId, Target};

struct Lines(u8);

impl HardwarePort for Lines {
    fn digital_read(&mut self, pin: PinId) -> bool {
        (pin ^ self.0) & 1 == 1
    }

    fn analog_read(&mut self, pin: PinId) -> u16 {
        u16::from(pin ^ self.0) << 5
    }

    fn chip_temperature_c(&mut self) -> Option<f32> {
        Some(f32::from(self.0))
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&limit_byte, rest)) = data.split_first() else {
        return;
    };
    let limit = 64 + usize::from(limit_byte) * 2;

    let registry = PinRegistry::new();
    for chunk in rest.chunks_exact(3) {
        let (id, kind, value) = (chunk[0], chunk[1], chunk[2]);
        let config = match kind % 4 {
            0 => None,
            1 => Some("DIGITAL"),
            2 => Some("ANALOG"),
            _ => Some("VIRTUAL"),
        };
        let direction = if kind & 0x10 != 0 { Some("OUT") } else { Some("IN") };
        let source = if kind & 0x20 != 0 {
            let v = f32::from(value) - 64.0;
            ValueSource::callback(move || v)
        } else {
            ValueSource::None
        };
        registry.register(id, config, direction, source);
        if kind & 0x40 != 0 {
            registry.set_value(id, f32::from(value) / 3.0);
        }
    }

    let target = if limit_byte & 1 == 0 { Target::Esp32 } else { Target::Esp32S3 };
    let resolver = ValueResolver::new(target, 3.3);
    let mut lines = Lines(limit_byte);
    let pins = registry.snapshot();
    let entries = pins.iter().map(|p| resolver.resolve(p, &mut lines));
    let header = FrameHeader {
        timestamp: u64::from(limit_byte) * 1000,
        rate: 500,
        temp: Some(f32::from(limit_byte)),
    };

    let mut frames: Vec<Vec<u8>> = Vec::new();
    let count = PacketAssembler::new(limit)
        .assemble(header, entries, |f| {
            frames.push(f.to_vec());
            Ok(())
        })
        .expect("assembly with an infallible sink succeeds");
    assert_eq!(usize::from(count), frames.len());

    let mut carried = 0usize;
    for (i, raw) in frames.iter().enumerate() {
        let frame: serde_json::Value = serde_json::from_slice(raw).expect("frame is JSON");
        let n = frame["pins"].as_array().map_or(0, Vec::len);
        assert!(raw.len() < limit || n <= 1, "frame {i}: {} bytes, {n} pins", raw.len());
        assert_eq!(frame["seq"].as_u64(), Some(i as u64));
        assert_eq!(frame["last"].as_bool(), Some(i + 1 == frames.len()));
        carried += n;
    }
    assert_eq!(carried, registry.len());
});
