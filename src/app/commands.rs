//! Inbound control-channel commands.
//!
//! The write characteristic accepts two encodings of the same request:
//!
//! ```text
//!   "250"  /  " 250\n"                bare decimal interval (ms)
//!   {"rate":250}  /  {"dbg_int":250}  tiny JSON object
//! ```
//!
//! Anything else is ignored.  Parsing never fails loudly: a malformed
//! write simply produces no command.

use serde::Deserialize;
use serde_json::Value;

/// Requests a central can make of the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Change the sampling interval (ms, before clamping).
    SetRate(u32),
}

#[derive(Deserialize)]
struct ControlBody {
    rate: Option<Value>,
    dbg_int: Option<Value>,
}

impl ControlCommand {
    /// Decode one control write.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }

        if bytes.iter().all(|&b| b.is_ascii_digit() || is_space(b)) {
            return match leading_decimal(bytes) {
                0 => None,
                ms => Some(Self::SetRate(ms)),
            };
        }

        let body: ControlBody = serde_json::from_slice(bytes).ok()?;
        // Both fields are synonyms; `dbg_int` wins when both are valid.
        body.dbg_int
            .as_ref()
            .and_then(json_rate)
            .or_else(|| body.rate.as_ref().and_then(json_rate))
            .map(Self::SetRate)
    }
}

/// C `isspace`: includes vertical tab, unlike `u8::is_ascii_whitespace`.
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

/// Skip leading whitespace, then read digits until the first non-digit.
fn leading_decimal(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .skip_while(|&&b| is_space(b))
        .take_while(|b| b.is_ascii_digit())
        .fold(0u32, |acc, &b| {
            acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
        })
}

/// Integers pass through (saturating), floats truncate, negatives map to 0.
fn json_rate(v: &Value) -> Option<u32> {
    let Value::Number(n) = v else {
        return None;
    };
    if let Some(u) = n.as_u64() {
        return Some(u32::try_from(u).unwrap_or(u32::MAX));
    }
    if n.as_i64().is_some() {
        return Some(0);
    }
    // `as` saturates and maps negatives to 0.
    n.as_f64().map(|f| f as u32)
}
