//! Runtime configuration for a plant channel.
//!
//! Defaults match the shipped firmware tuning for a capacitive probe on a
//! 12-bit ADC and a small peristaltic pump.

/// Two-point moisture calibration plus the raw-count validity window.
/// `counts_dry` maps to 0% and `counts_wet` to 100%; capacitive probes
/// read lower when wet, so `counts_dry > counts_wet` is the normal case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationCfg {
    pub counts_dry: i32,
    pub counts_wet: i32,
    /// Raw counts outside [valid_min, valid_max] flag a sensor fault.
    pub valid_min: i32,
    pub valid_max: i32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            counts_dry: 2900,
            counts_wet: 1470,
            valid_min: 350,
            valid_max: 4095,
        }
    }
}

/// Temperature compensation applied before filtering:
/// `pct_per_deg_c * (reference_c - current_c)` is added to the mapped value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompensationCfg {
    pub pct_per_deg_c: f32,
    pub reference_c: f32,
}

impl Default for CompensationCfg {
    fn default() -> Self {
        Self {
            pct_per_deg_c: 0.075,
            reference_c: 20.0,
        }
    }
}

/// Bounds for the adaptive smoothing time constant. Sigma is pinned to
/// `dosing_sigma_s` while watering and widens toward `idle_sigma_max_s`
/// once the channel settles into waiting for the next cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingCfg {
    pub dosing_sigma_s: f32,
    pub idle_sigma_max_s: f32,
}

impl Default for SmoothingCfg {
    fn default() -> Self {
        Self {
            dosing_sigma_s: 300.0,
            idle_sigma_max_s: 1200.0,
        }
    }
}

/// Watering targets and timing for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct WateringCfg {
    /// Below this the soil is dry enough to start a cycle.
    pub min_target_pct: f32,
    /// Above this the soil is moist enough to stop.
    pub max_target_pct: f32,
    /// Pump-on duration of a single dose.
    pub dose_ms: u64,
    /// Minimum spacing between doses.
    pub inter_dose_ms: u64,
    /// Sensor settle delay after pump-off before the probe is trusted.
    pub settle_ms: u64,
    /// Periodic re-evaluation delay for non-immediate transitions.
    pub recheck_ms: u64,
    /// Enable-flag poll period while disabled.
    pub disabled_poll_ms: u64,
    /// Filtered estimates below this are implausible (probe out of soil).
    pub plausibility_floor_pct: f32,
    /// Un-clamped estimates above this are implausible (open probe reads
    /// far past saturation through the calibration map).
    pub plausibility_ceiling_pct: f32,
}

impl Default for WateringCfg {
    fn default() -> Self {
        Self {
            min_target_pct: 70.0,
            max_target_pct: 80.0,
            dose_ms: 3_000,
            inter_dose_ms: 900_000,
            settle_ms: 1_000,
            recheck_ms: 60_000,
            disabled_poll_ms: 10_000,
            plausibility_floor_pct: 5.0,
            plausibility_ceiling_pct: 120.0,
        }
    }
}

/// Dose-safety caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerCfg {
    /// Cap applied to both the per-cycle count and the rolling window.
    pub max_doses_per_cycle: u32,
    /// Rolling expiry horizon for dose records.
    pub expiry_window_s: u64,
}

impl Default for LedgerCfg {
    fn default() -> Self {
        Self {
            max_doses_per_cycle: 6,
            expiry_window_s: 86_400,
        }
    }
}

/// Reservoir depletion model and interlock switch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservoirCfg {
    /// Assumed pump runtime left once the float goes low.
    pub low_water_secs: f32,
    /// When true the pump is never commanded on without water.
    pub interlock_enabled: bool,
}

impl Default for ReservoirCfg {
    fn default() -> Self {
        Self {
            low_water_secs: 10.0,
            interlock_enabled: true,
        }
    }
}
