//! Contracts between the irrigation core and its collaborators.
//!
//! The control core never touches peripherals or transports directly:
//! everything flows through these traits so the core can be driven by
//! real GPIO, a simulator, or test doubles interchangeably.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Analog soil-moisture probe. Returns raw ADC counts.
pub trait MoistureProbe {
    fn read_raw(&mut self) -> Result<i32, DynError>;
}

/// Digital water-level switch (float switch). High means water present.
pub trait LevelSwitch {
    fn is_high(&mut self) -> Result<bool, DynError>;
}

/// Pump actuator. Commands are idempotent: turning an on pump on again
/// is a no-op at the hardware level.
pub trait Pump {
    fn set_on(&mut self, on: bool) -> Result<(), DynError>;
}

/// Named-value persistence for channel settings. The file format (or
/// NVS layout, or whatever backs it) is the implementor's concern.
pub trait ConfigStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), DynError>;
}

/// Point-in-time status of one plant channel, published every processed
/// tick and exposed over whatever status surface the application has.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub channel: String,
    pub plant_name: String,
    pub state: &'static str,
    pub moisture_pct: f32,
    pub raw_counts: i32,
    pub min_target_pct: f32,
    pub max_target_pct: f32,
    pub doses_this_cycle: u32,
    pub doses_today: u32,
    pub enabled: bool,
    pub pump_on: bool,
    pub seconds_since_dose: f32,
    pub reservoir_secs_remaining: f32,
}

/// How a metric should be presented by a monitoring integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Sensor,
    BinarySensor,
}

/// One exported metric: name, unit, and presentation hint. Channels
/// expose a static table of these; the telemetry collaborator iterates
/// it once at startup for autodiscovery registration.
#[derive(Debug, Clone, Copy)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub unit: &'static str,
    pub description: &'static str,
    pub kind: MetricKind,
}

/// Telemetry sink: one-time metric registration plus per-tick snapshot
/// publication. Delivery is best-effort; the core never waits on it.
pub trait Telemetry {
    fn register(&mut self, channel: &str, metric: &MetricDescriptor);
    fn publish(&mut self, snapshot: &ChannelSnapshot);
}
