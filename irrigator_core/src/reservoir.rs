//! Reservoir availability from a float switch plus a depletion estimate.
//!
//! The switch only says "water present" or not; once it goes low a small
//! assumed runtime budget remains (water below the float but above the
//! intake). Pump runtime draws the budget down; a high reading refills
//! it. The component never fails, it degrades to "no water".

use irrigator_traits::LevelSwitch;

use crate::config::ReservoirCfg;

pub struct ReservoirMonitor<L: LevelSwitch> {
    switch: L,
    float_high: bool,
    secs_remaining: f32,
    low_water_secs: f32,
}

impl<L: LevelSwitch> ReservoirMonitor<L> {
    pub fn new(switch: L, cfg: ReservoirCfg) -> Self {
        Self {
            switch,
            float_high: false,
            secs_remaining: cfg.low_water_secs,
            low_water_secs: cfg.low_water_secs,
        }
    }

    /// Sample the float switch. High resets the runtime budget; a read
    /// error keeps the last observed level.
    pub fn read(&mut self) {
        match self.switch.is_high() {
            Ok(high) => {
                self.float_high = high;
                if high {
                    self.secs_remaining = self.low_water_secs;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "level switch read failed, keeping last level");
            }
        }
    }

    /// Deduct completed pump runtime from the budget. Pumping while the
    /// float is high does not deplete the estimate.
    pub fn pump_ran_for(&mut self, ms: u64) {
        if self.float_high {
            return;
        }
        self.secs_remaining = (self.secs_remaining - ms as f32 / 1000.0).max(0.0);
    }

    pub fn have_water(&self) -> bool {
        self.float_high || self.secs_remaining > 0.0
    }

    pub fn secs_remaining(&self) -> f32 {
        self.secs_remaining
    }

    pub fn float_is_high(&self) -> bool {
        self.float_high
    }
}
