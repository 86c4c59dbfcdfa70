//! Kernel-smoothed soil-moisture estimation.
//!
//! Raw ADC counts are linearly mapped through a two-point calibration,
//! temperature-compensated, then folded into an exponentially
//! time-weighted running estimate. The time constant (sigma) is steered
//! by the channel controller: short while watering, wider once idle.

use irrigator_traits::MoistureProbe;

use crate::config::{CalibrationCfg, CompensationCfg};

pub struct MoistureEstimator<P: MoistureProbe> {
    probe: P,
    calibration: CalibrationCfg,
    compensation: CompensationCfg,
    current_temp_c: f32,

    smoothed: f32,
    sigma_s: f32,
    last_sample_s: f32,
    primed: bool,

    raw: i32,
    failed: bool,
}

impl<P: MoistureProbe> MoistureEstimator<P> {
    pub fn new(
        probe: P,
        calibration: CalibrationCfg,
        compensation: CompensationCfg,
        sigma_s: f32,
    ) -> Self {
        let reference_c = compensation.reference_c;
        Self {
            probe,
            calibration,
            compensation,
            current_temp_c: reference_c,
            smoothed: 0.0,
            sigma_s,
            last_sample_s: 0.0,
            primed: false,
            raw: 0,
            failed: false,
        }
    }

    /// Take one sample and fold it into the running estimate.
    ///
    /// Sets the fault flag (and leaves the estimate untouched) when the
    /// probe errors or the raw count falls outside the validity window.
    /// No retries; the caller's guards decide what a fault means.
    pub fn read(&mut self, now_ms: u64) {
        let raw = match self.probe.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "moisture probe read failed");
                self.failed = true;
                return;
            }
        };
        self.raw = raw;
        if raw < self.calibration.valid_min || raw > self.calibration.valid_max {
            tracing::warn!(
                raw,
                valid_min = self.calibration.valid_min,
                valid_max = self.calibration.valid_max,
                "raw moisture count out of range"
            );
            self.failed = true;
            return;
        }
        self.failed = false;

        let span = (self.calibration.counts_wet - self.calibration.counts_dry) as f32;
        let pct = (raw - self.calibration.counts_dry) as f32 * 100.0 / span;
        let compensated = pct
            + self.compensation.pct_per_deg_c * (self.compensation.reference_c - self.current_temp_c);

        let now_s = now_ms as f32 / 1000.0;
        if self.primed {
            let dt = (now_s - self.last_sample_s).max(0.0);
            let keep = (-dt / self.sigma_s).exp();
            self.smoothed = keep * self.smoothed + (1.0 - keep) * compensated;
        } else {
            self.smoothed = compensated;
            self.primed = true;
        }
        self.last_sample_s = now_s;
    }

    /// Estimate clamped into [0, 100]. Never NaN.
    pub fn filtered_value(&self) -> f32 {
        if self.smoothed.is_finite() {
            self.smoothed.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Un-clamped estimate, used for plausibility checks. A probe out of
    /// the soil maps far outside [0, 100] and must stay visible as such.
    pub fn estimate(&self) -> f32 {
        self.smoothed
    }

    pub fn raw_counts(&self) -> i32 {
        self.raw
    }

    pub fn reading_failed(&self) -> bool {
        self.failed
    }

    /// True once at least one valid sample has been folded in.
    pub fn primed(&self) -> bool {
        self.primed
    }

    pub fn sigma(&self) -> f32 {
        self.sigma_s
    }

    pub fn set_sigma(&mut self, seconds: f32) {
        self.sigma_s = seconds;
    }

    pub fn set_temperature_c(&mut self, current_c: f32) {
        self.current_temp_c = current_c;
    }

    pub fn set_reference_temperature_c(&mut self, reference_c: f32) {
        self.compensation.reference_c = reference_c;
    }

    pub fn set_temperature_coefficient(&mut self, pct_per_deg_c: f32) {
        self.compensation.pct_per_deg_c = pct_per_deg_c;
    }

    pub fn calibration(&self) -> CalibrationCfg {
        self.calibration
    }

    /// Swap the calibration endpoints. The caller validates `dry != wet`.
    pub fn set_calibration(&mut self, counts_dry: i32, counts_wet: i32) {
        self.calibration.counts_dry = counts_dry;
        self.calibration.counts_wet = counts_wet;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::SharedProbe;

    fn estimator(raw: i32) -> (MoistureEstimator<SharedProbe>, SharedProbe) {
        let probe = SharedProbe::new(raw);
        let handle = probe.clone();
        let est = MoistureEstimator::new(
            probe,
            CalibrationCfg::default(),
            CompensationCfg::default(),
            300.0,
        );
        (est, handle)
    }

    #[test]
    fn maps_calibration_endpoints() {
        let (mut est, probe) = estimator(2900);
        est.read(0);
        assert!(est.filtered_value().abs() < 0.01);

        probe.set(1470);
        // Many sigmas later the filter has fully converged.
        est.read(10_000_000);
        assert!((est.filtered_value() - 100.0).abs() < 0.01);
    }

    #[test]
    fn out_of_range_raw_sets_fault_and_preserves_estimate() {
        let (mut est, probe) = estimator(2185);
        est.read(0);
        assert!(!est.reading_failed());
        let before = est.filtered_value();

        probe.set(100);
        est.read(1_000);
        assert!(est.reading_failed());
        assert_eq!(est.filtered_value(), before);

        probe.set(2185);
        est.read(2_000);
        assert!(!est.reading_failed());
    }

    #[test]
    fn probe_error_sets_fault() {
        let (mut est, probe) = estimator(2185);
        probe.fail_next();
        est.read(0);
        assert!(est.reading_failed());
    }

    #[test]
    fn dislodged_probe_estimate_is_visible_unclamped() {
        let (mut est, _probe) = estimator(730);
        est.read(0);
        assert!(est.estimate() > 120.0);
        assert_eq!(est.filtered_value(), 100.0);
    }

    #[test]
    fn smoothing_weights_by_elapsed_time() {
        let (mut est, probe) = estimator(2900);
        est.read(0);
        probe.set(1470);

        // One sigma of elapsed time pulls the estimate most of the way.
        est.read(300_000);
        let after_one_sigma = est.filtered_value();
        assert!(after_one_sigma > 60.0 && after_one_sigma < 65.0);
    }

    #[test]
    fn temperature_compensation_shifts_before_filtering() {
        let (mut est, _probe) = estimator(2185);
        // 10 C below reference raises the estimate by 0.75%.
        est.set_temperature_c(10.0);
        est.read(0);
        assert!((est.filtered_value() - 50.75).abs() < 0.01);
    }
}
