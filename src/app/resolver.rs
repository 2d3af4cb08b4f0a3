//! Value resolver: one [`Pin`] in, one serializable [`PinEntry`] out.
//!
//! The raw value comes from the pin's override source, then its cached
//! value, then (physical pins only) the hardware port.  A NaN anywhere in
//! that chain counts as "no value".
//!
//! | Pin kind          | `value`                       | `voltage`              |
//! |-------------------|-------------------------------|------------------------|
//! | virtual           | float, 3 decimals, NaN → 0    | `"-"`                  |
//! | physical digital  | 0 / 1                         | reference or 0.0       |
//! | physical analog   | 0..=4095 (DAC 8-bit × 16)     | reference × v / 4095   |

use serde::{Serialize, Serializer};

use crate::app::ports::HardwarePort;
use crate::app::registry::{CONFIG_VIRTUAL, Pin, ValueSource};
use crate::pins::{ANALOG_MAX, DAC_SCALE, PinId, Target};

/// Where a reported value physically originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Virtual,
    Dac,
    Hw,
}

/// Encoded pin value: floats for virtual probes, integers for lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PinValue {
    Float(f64),
    Int(i32),
}

/// Reported line voltage.  Virtual pins have none and serialize as `"-"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Voltage {
    Volts(f64),
    Unavailable,
}

impl Serialize for Voltage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Volts(v) => serializer.serialize_f64(*v),
            Self::Unavailable => serializer.serialize_str("-"),
        }
    }
}

/// One element of a frame's `pins` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinEntry {
    pub num: PinId,
    pub config: String,
    pub direction: String,
    pub src: SourceKind,
    pub value: PinValue,
    pub voltage: Voltage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digital: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analog: Option<u16>,
}

/// Stateless encoder parameterised by chip family and logic reference.
#[derive(Debug, Clone, Copy)]
pub struct ValueResolver {
    target: Target,
    reference_voltage: f64,
}

impl ValueResolver {
    pub fn new(target: Target, reference_voltage: f64) -> Self {
        Self {
            target,
            reference_voltage,
        }
    }

    /// Produce the transmitted encoding for `pin`.  Hardware is touched
    /// only for physical pins that have no usable raw value.
    pub fn resolve<H: HardwarePort + ?Sized>(&self, pin: &Pin, hw: &mut H) -> PinEntry {
        let raw = raw_value(pin);

        if pin.is_virtual() {
            return PinEntry {
                num: pin.id,
                config: CONFIG_VIRTUAL.into(),
                direction: pin.direction.clone(),
                src: SourceKind::Virtual,
                value: PinValue::Float(round3(raw.unwrap_or(0.0))),
                voltage: Voltage::Unavailable,
                digital: None,
                analog: None,
            };
        }

        let src = if self.target.is_dac_pin(pin.id) {
            SourceKind::Dac
        } else {
            SourceKind::Hw
        };

        let mut entry = PinEntry {
            num: pin.id,
            config: pin.config.clone(),
            direction: pin.direction.clone(),
            src,
            value: PinValue::Int(0),
            voltage: Voltage::Volts(0.0),
            digital: None,
            analog: None,
        };

        if pin.is_analog() {
            let a = match raw {
                Some(v) => self.scale_analog(pin, v),
                None => hw.analog_read(pin.id).min(ANALOG_MAX),
            };
            entry.value = PinValue::Int(i32::from(a));
            entry.analog = Some(a);
            entry.voltage =
                Voltage::Volts(self.reference_voltage * f64::from(a) / f64::from(ANALOG_MAX));
        } else {
            let high = match raw {
                Some(v) => v != 0.0,
                None => hw.digital_read(pin.id),
            };
            let d = u8::from(high);
            entry.value = PinValue::Int(i32::from(d));
            entry.digital = Some(d);
            entry.voltage = Voltage::Volts(if high { self.reference_voltage } else { 0.0 });
        }
        entry
    }

    /// Truncate toward zero, widen 8-bit DAC writes, clamp to 12 bits.
    fn scale_analog(&self, pin: &Pin, v: f32) -> u16 {
        // `as` saturates out-of-range floats.
        let mut a = v as i32;
        let dac_write = pin.is_output() && self.target.is_dac_pin(pin.id);
        if dac_write && (0..=255).contains(&a) {
            a *= DAC_SCALE;
        }
        a.clamp(0, i32::from(ANALOG_MAX)) as u16
    }
}

/// Callback → external cell → cached value, with NaN meaning absent.
fn raw_value(pin: &Pin) -> Option<f32> {
    let v = match &pin.source {
        ValueSource::Callback(f) => f(),
        ValueSource::External(cell) => cell.get(),
        ValueSource::None => pin.cached_value()?,
    };
    (!v.is_nan()).then_some(v)
}

fn round3(v: f32) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    (f64::from(v) * 1000.0).round() / 1000.0
}
