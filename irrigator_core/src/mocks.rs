//! Shared-handle test doubles for the channel's collaborators.
//!
//! Each double clones into a handle the test keeps, so sensor values can
//! be scripted and pump commands inspected while the channel owns the
//! collaborator. Also used by the CLI simulator as a fallback store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use irrigator_traits::{
    ChannelSnapshot, ConfigStore, LevelSwitch, MetricDescriptor, MoistureProbe, Pump, Telemetry,
};

type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Default)]
struct ProbeState {
    raw: i32,
    fail_next: bool,
}

/// Moisture probe whose reading is set through a cloned handle.
#[derive(Debug, Clone)]
pub struct SharedProbe(Arc<Mutex<ProbeState>>);

impl SharedProbe {
    pub fn new(raw: i32) -> Self {
        Self(Arc::new(Mutex::new(ProbeState {
            raw,
            fail_next: false,
        })))
    }

    pub fn set(&self, raw: i32) {
        if let Ok(mut s) = self.0.lock() {
            s.raw = raw;
        }
    }

    /// Make the next read return an error, then recover.
    pub fn fail_next(&self) {
        if let Ok(mut s) = self.0.lock() {
            s.fail_next = true;
        }
    }
}

impl MoistureProbe for SharedProbe {
    fn read_raw(&mut self) -> Result<i32, DynError> {
        let mut s = self.0.lock().map_err(|_| "probe mutex poisoned")?;
        if s.fail_next {
            s.fail_next = false;
            return Err("simulated probe failure".into());
        }
        Ok(s.raw)
    }
}

#[derive(Debug, Default)]
struct LevelState {
    high: bool,
    fail_next: bool,
}

/// Float switch whose level is set through a cloned handle.
#[derive(Debug, Clone)]
pub struct SharedLevel(Arc<Mutex<LevelState>>);

impl SharedLevel {
    pub fn new(high: bool) -> Self {
        Self(Arc::new(Mutex::new(LevelState {
            high,
            fail_next: false,
        })))
    }

    pub fn set(&self, high: bool) {
        if let Ok(mut s) = self.0.lock() {
            s.high = high;
        }
    }

    pub fn fail_next(&self) {
        if let Ok(mut s) = self.0.lock() {
            s.fail_next = true;
        }
    }
}

impl LevelSwitch for SharedLevel {
    fn is_high(&mut self) -> Result<bool, DynError> {
        let mut s = self.0.lock().map_err(|_| "level mutex poisoned")?;
        if s.fail_next {
            s.fail_next = false;
            return Err("simulated switch failure".into());
        }
        Ok(s.high)
    }
}

#[derive(Debug, Default)]
struct PumpState {
    on: bool,
    commands: Vec<bool>,
    fail_next: bool,
}

/// Pump that records every command it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingPump(Arc<Mutex<PumpState>>);

impl RecordingPump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.0.lock().map(|s| s.on).unwrap_or(false)
    }

    /// Every set_on argument, in order.
    pub fn commands(&self) -> Vec<bool> {
        self.0.lock().map(|s| s.commands.clone()).unwrap_or_default()
    }

    pub fn on_count(&self) -> usize {
        self.0
            .lock()
            .map(|s| s.commands.iter().filter(|&&c| c).count())
            .unwrap_or(0)
    }

    pub fn fail_next(&self) {
        if let Ok(mut s) = self.0.lock() {
            s.fail_next = true;
        }
    }
}

impl Pump for RecordingPump {
    fn set_on(&mut self, on: bool) -> Result<(), DynError> {
        let mut s = self.0.lock().map_err(|_| "pump mutex poisoned")?;
        if s.fail_next {
            s.fail_next = false;
            return Err("simulated pump failure".into());
        }
        s.on = on;
        s.commands.push(on);
        Ok(())
    }
}

/// In-memory key/value store. The default persistence backend when no
/// real store is wired in.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        if let Ok(mut v) = self.values.lock() {
            v.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Make all subsequent writes fail, for persistence-error tests.
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut f) = self.fail_writes.lock() {
            *f = fail;
        }
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok().and_then(|v| v.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DynError> {
        if self.fail_writes.lock().map(|f| *f).unwrap_or(false) {
            return Err("simulated store failure".into());
        }
        let mut v = self.values.lock().map_err(|_| "store mutex poisoned")?;
        v.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Telemetry sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn register(&mut self, _channel: &str, _metric: &MetricDescriptor) {}
    fn publish(&mut self, _snapshot: &ChannelSnapshot) {}
}

/// Telemetry sink that keeps everything it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    registered: Arc<Mutex<Vec<String>>>,
    snapshots: Arc<Mutex<Vec<ChannelSnapshot>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered_metrics(&self) -> Vec<String> {
        self.registered.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn snapshots(&self) -> Vec<ChannelSnapshot> {
        self.snapshots.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<ChannelSnapshot> {
        self.snapshots.lock().ok().and_then(|s| s.last().cloned())
    }
}

impl Telemetry for RecordingTelemetry {
    fn register(&mut self, channel: &str, metric: &MetricDescriptor) {
        if let Ok(mut r) = self.registered.lock() {
            r.push(format!("{channel}/{}", metric.name));
        }
    }

    fn publish(&mut self, snapshot: &ChannelSnapshot) {
        if let Ok(mut s) = self.snapshots.lock() {
            s.push(snapshot.clone());
        }
    }
}
