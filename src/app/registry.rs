//! Pin registry: the ordered set of monitored signals.
//!
//! Pins are never removed.  Registration may happen from any task at any
//! time, including while a sampling pass is running: the pass works on a
//! [`PinRegistry::snapshot`] taken under the lock, so the lock is never
//! held across user callbacks, hardware reads, or BLE notifications.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::pins::{PinId, VIRTUAL_ID_FLOOR};

/// `config` value marking a software-backed pin.
pub const CONFIG_VIRTUAL: &str = "VIRTUAL";
/// `config` value marking a 12-bit analog pin.
pub const CONFIG_ANALOG: &str = "ANALOG";
/// `direction` value marking an output line.
pub const DIRECTION_OUT: &str = "OUT";
/// Placeholder for unset `config` / `direction`.
pub const PLACEHOLDER: &str = "-";

// ───────────────────────────────────────────────────────────────
// Probe cell
// ───────────────────────────────────────────────────────────────

/// An `f32` shared between the application (writer) and the registry
/// (reader).  Stored as raw bits in an atomic, so updates are lock-free
/// and safe from any task or ISR.
#[derive(Debug)]
pub struct ProbeCell(AtomicU32);

impl ProbeCell {
    pub const fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl Default for ProbeCell {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// ───────────────────────────────────────────────────────────────
// Value source
// ───────────────────────────────────────────────────────────────

/// Callback producing a pin value on demand.
pub type ValueCallback = Arc<dyn Fn() -> f32 + Send + Sync>;

/// Where a pin's value comes from when it is not read from hardware.
#[derive(Clone, Default)]
pub enum ValueSource {
    /// No override: use the cached value, then hardware.
    #[default]
    None,
    /// Value computed by an application callback on every read.
    Callback(ValueCallback),
    /// Value read from an application-owned cell.
    External(Arc<ProbeCell>),
}

impl ValueSource {
    pub fn callback(f: impl Fn() -> f32 + Send + Sync + 'static) -> Self {
        Self::Callback(Arc::new(f))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Callback(_) => write!(f, "Callback"),
            Self::External(cell) => write!(f, "External({})", cell.get()),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Pin
// ───────────────────────────────────────────────────────────────

/// One monitored signal, physical or virtual.
#[derive(Debug, Clone)]
pub struct Pin {
    pub id: PinId,
    pub config: String,
    /// `IN` / `OUT` / `-` for physical pins, the label for virtual ones.
    pub direction: String,
    pub source: ValueSource,
    cached: Option<f32>,
}

impl Pin {
    fn new(id: PinId, config: Option<&str>, direction: Option<&str>, source: ValueSource) -> Self {
        Self {
            id,
            config: non_empty(config).unwrap_or(PLACEHOLDER).into(),
            direction: non_empty(direction).unwrap_or(PLACEHOLDER).into(),
            source,
            cached: None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.config == CONFIG_VIRTUAL
    }

    pub fn is_analog(&self) -> bool {
        self.config == CONFIG_ANALOG
    }

    pub fn is_output(&self) -> bool {
        self.direction == DIRECTION_OUT
    }

    pub fn cached_value(&self) -> Option<f32> {
        self.cached
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

// ───────────────────────────────────────────────────────────────
// Registry
// ───────────────────────────────────────────────────────────────

/// Insertion-ordered, mutex-guarded pin collection.
#[derive(Debug, Default)]
pub struct PinRegistry {
    pins: Mutex<Vec<Pin>>,
}

impl PinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic inside a registration call cannot leave the Vec half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<Pin>> {
        self.pins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a pin or update an existing one.
    ///
    /// `None` or empty `config` / `direction` leave an existing pin's field
    /// untouched (or set the `-` placeholder on a new pin).  `source` is
    /// always applied, so passing [`ValueSource::None`] clears an override.
    pub fn register(
        &self,
        id: PinId,
        config: Option<&str>,
        direction: Option<&str>,
        source: ValueSource,
    ) {
        let mut pins = self.lock();
        match pins.iter_mut().find(|p| p.id == id) {
            Some(pin) => {
                if let Some(c) = non_empty(config) {
                    pin.config = c.into();
                }
                if let Some(d) = non_empty(direction) {
                    pin.direction = d.into();
                }
                pin.source = source;
            }
            None => pins.push(Pin::new(id, config, direction, source)),
        }
    }

    /// Attach a virtual probe to `cell`.  Ids below 100 are raised to 100.
    /// Returns the id the probe was registered under.
    pub fn probe_virtual(&self, id: PinId, cell: Arc<ProbeCell>, label: &str) -> PinId {
        let id = id.max(VIRTUAL_ID_FLOOR);
        let label = String::from(label);

        let mut pins = self.lock();
        match pins.iter_mut().find(|p| p.id == id) {
            Some(pin) => {
                pin.config = CONFIG_VIRTUAL.into();
                pin.direction = label;
                pin.source = ValueSource::External(cell);
            }
            None => pins.push(Pin {
                id,
                config: CONFIG_VIRTUAL.into(),
                direction: label,
                source: ValueSource::External(cell),
                cached: None,
            }),
        }
        id
    }

    /// Insert placeholders for every id in `ids` not already registered.
    /// Returns the number of pins added.
    pub fn seed(&self, ids: &[PinId]) -> usize {
        let mut pins = self.lock();
        let mut added = 0;
        for &id in ids {
            if !pins.iter().any(|p| p.id == id) {
                pins.push(Pin::new(id, None, None, ValueSource::None));
                added += 1;
            }
        }
        added
    }

    /// Store the fallback value used when a pin has no override source.
    /// Returns `false` if `id` is not registered.
    pub fn set_value(&self, id: PinId, value: f32) -> bool {
        match self.lock().iter_mut().find(|p| p.id == id) {
            Some(pin) => {
                pin.cached = Some(value);
                true
            }
            None => false,
        }
    }

    /// Look up a pin by id.
    pub fn find(&self, id: PinId) -> Option<Pin> {
        self.lock().iter().find(|p| p.id == id).cloned()
    }

    /// Consistent copy of all pins in registry order.
    pub fn snapshot(&self) -> Vec<Pin> {
        self.lock().clone()
    }

    pub fn ids(&self) -> Vec<PinId> {
        self.lock().iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────
