//! Simulated plant hardware for running without GPIO.
//!
//! One `SimulatedPlant` per channel models soil that drains slowly and
//! wets while the pump runs, plus a reservoir that depletes with pump
//! runtime. The probe, float switch, and pump all share the plant state
//! so the control loop sees a consistent little world.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use irrigator_traits::{LevelSwitch, MoistureProbe, Pump};

type DynError = Box<dyn std::error::Error + Send + Sync>;

const DRAIN_PCT_PER_S: f32 = 0.02;
const WET_PCT_PER_S: f32 = 2.5;
/// Float switch reads low once the reservoir drops below this.
const FLOAT_DROP_SECS: f32 = 2.0;

#[derive(Debug)]
struct SimState {
    moisture_pct: f32,
    reservoir_secs: f32,
    pump_on: bool,
    last_update: Instant,
    counts_dry: i32,
    counts_wet: i32,
    reads: u64,
}

impl SimState {
    /// Integrate soil and reservoir dynamics up to now.
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        if self.pump_on {
            self.moisture_pct += WET_PCT_PER_S * dt;
            self.reservoir_secs -= dt;
        } else {
            self.moisture_pct -= DRAIN_PCT_PER_S * dt;
        }
        self.moisture_pct = self.moisture_pct.clamp(0.0, 100.0);
        self.reservoir_secs = self.reservoir_secs.max(0.0);
    }

    fn raw_counts(&mut self) -> i32 {
        let span = (self.counts_wet - self.counts_dry) as f32;
        let raw = self.counts_dry as f32 + self.moisture_pct / 100.0 * span;
        // Deterministic ADC jitter of a few counts.
        self.reads += 1;
        let jitter = (self.reads.wrapping_mul(37) % 11) as i32 - 5;
        raw as i32 + jitter
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPlant {
    pub fn new(moisture_pct: f32, reservoir_secs: f32, counts_dry: i32, counts_wet: i32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                moisture_pct,
                reservoir_secs,
                pump_on: false,
                last_update: Instant::now(),
                counts_dry,
                counts_wet,
                reads: 0,
            })),
        }
    }

    pub fn probe(&self) -> SimProbe {
        SimProbe(self.state.clone())
    }

    pub fn level(&self) -> SimLevel {
        SimLevel(self.state.clone())
    }

    pub fn pump(&self) -> SimPump {
        SimPump(self.state.clone())
    }
}

pub struct SimProbe(Arc<Mutex<SimState>>);

impl MoistureProbe for SimProbe {
    fn read_raw(&mut self) -> Result<i32, DynError> {
        let mut s = self.0.lock().map_err(|_| "sim state poisoned")?;
        s.advance();
        Ok(s.raw_counts())
    }
}

pub struct SimLevel(Arc<Mutex<SimState>>);

impl LevelSwitch for SimLevel {
    fn is_high(&mut self) -> Result<bool, DynError> {
        let mut s = self.0.lock().map_err(|_| "sim state poisoned")?;
        s.advance();
        Ok(s.reservoir_secs > FLOAT_DROP_SECS)
    }
}

pub struct SimPump(Arc<Mutex<SimState>>);

impl Pump for SimPump {
    fn set_on(&mut self, on: bool) -> Result<(), DynError> {
        let mut s = self.0.lock().map_err(|_| "sim state poisoned")?;
        s.advance();
        s.pump_on = on;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pumping_wets_the_soil_model() {
        let plant = SimulatedPlant::new(50.0, 120.0, 2900, 1470);
        let mut pump = plant.pump();
        let mut probe = plant.probe();

        pump.set_on(true).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(200));
        pump.set_on(false).unwrap();

        let raw = probe.read_raw().unwrap();
        // Wetter soil reads lower counts than the 50% starting point.
        let at_50 = 2900 + (1470 - 2900) / 2;
        assert!(raw < at_50 + 10);
    }

    #[test]
    fn float_drops_when_the_reservoir_empties() {
        let plant = SimulatedPlant::new(50.0, 1.0, 2900, 1470);
        let mut level = plant.level();
        assert!(!level.is_high().unwrap());
    }
}
