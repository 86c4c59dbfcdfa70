//! The per-channel irrigation controller (`PlantChannel`).
//!
//! Ties the moisture estimator, dose ledger, and reservoir monitor
//! together under a tick-driven state machine. Each processed tick
//! refreshes the sensors, steps the state machine (which may command
//! the pump), and publishes a status snapshot. There are no blocking
//! waits; every transition schedules an absolute next-update time and
//! ticks arriving before it are no-ops.

use std::sync::Arc;
use std::time::Instant;

use eyre::WrapErr;
use irrigator_traits::clock::Clock;
use irrigator_traits::{
    ChannelSnapshot, ConfigStore, LevelSwitch, MetricDescriptor, MetricKind, MoistureProbe, Pump,
    Telemetry,
};

use crate::config::{
    CalibrationCfg, CompensationCfg, LedgerCfg, ReservoirCfg, SmoothingCfg, WateringCfg,
};
use crate::error::{BuildError, IrrigationError, Result, SettingError};
use crate::estimator::MoistureEstimator;
use crate::ledger::DoseLedger;
use crate::mocks::{MemoryStore, NullTelemetry};
use crate::reservoir::ReservoirMonitor;
use crate::status::{ChannelState, TickStatus};

/// Metrics every channel exports, registered once at construction.
pub const CHANNEL_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor {
        name: "state",
        unit: "",
        description: "controller state",
        kind: MetricKind::Sensor,
    },
    MetricDescriptor {
        name: "moisture",
        unit: "%",
        description: "filtered soil moisture",
        kind: MetricKind::Sensor,
    },
    MetricDescriptor {
        name: "raw_moisture",
        unit: "counts",
        description: "raw probe reading",
        kind: MetricKind::Sensor,
    },
    MetricDescriptor {
        name: "pump",
        unit: "",
        description: "pump running",
        kind: MetricKind::BinarySensor,
    },
    MetricDescriptor {
        name: "doses_this_cycle",
        unit: "doses",
        description: "doses in the current cycle",
        kind: MetricKind::Sensor,
    },
    MetricDescriptor {
        name: "doses_today",
        unit: "doses",
        description: "doses in the last 24 hours",
        kind: MetricKind::Sensor,
    },
    MetricDescriptor {
        name: "seconds_since_dose",
        unit: "s",
        description: "time since the last dose finished",
        kind: MetricKind::Sensor,
    },
    MetricDescriptor {
        name: "reservoir_seconds",
        unit: "s",
        description: "assumed reservoir runtime remaining",
        kind: MetricKind::Sensor,
    },
    MetricDescriptor {
        name: "watering_enabled",
        unit: "",
        description: "watering enabled",
        kind: MetricKind::BinarySensor,
    },
];

/// Keys accepted by the settings surface, also used to restore
/// persisted values at construction.
pub const SETTING_KEYS: &[&str] = &[
    "plant_name",
    "min_moisture_target",
    "max_moisture_target",
    "pump_dose_ms",
    "between_doses_ms",
    "max_doses_per_cycle",
    "watering_enabled",
    "moisture_counts_dry",
    "moisture_counts_wet",
];

pub struct PlantChannel<P: MoistureProbe, L: LevelSwitch, M: Pump> {
    id: String,
    plant_name: String,
    estimator: MoistureEstimator<P>,
    ledger: DoseLedger,
    reservoir: ReservoirMonitor<L>,
    pump: M,
    telemetry: Box<dyn Telemetry>,
    store: Box<dyn ConfigStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,

    watering: WateringCfg,
    smoothing: SmoothingCfg,
    interlock_enabled: bool,

    state: ChannelState,
    next_update_ms: u64,
    state_changed_ms: u64,
    enabled: bool,
    enable_request: Option<bool>,
    pump_test_request: bool,
    self_test_request: bool,
    pump_is_on: bool,
    last_pump_off_ms: Option<u64>,
    /// Power-on counts as a dose end, so a fresh channel waits out one
    /// inter-dose interval before its first dose.
    last_dose_end_ms: u64,
}

impl<P: MoistureProbe, L: LevelSwitch, M: Pump> core::fmt::Debug for PlantChannel<P, L, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PlantChannel")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .field("pump_on", &self.pump_is_on)
            .finish()
    }
}

impl<P: MoistureProbe, L: LevelSwitch, M: Pump> PlantChannel<P, L, M> {
    pub fn builder(
        id: impl Into<String>,
        probe: P,
        level: L,
        pump: M,
    ) -> PlantChannelBuilder<P, L, M> {
        PlantChannelBuilder::new(id.into(), probe, level, pump)
    }

    /// One scheduler tick. Applies pending external requests, then runs
    /// a full step if the scheduled next-update time has arrived.
    pub fn tick(&mut self) -> Result<TickStatus> {
        let now_ms = self.clock.ms_since(self.epoch);

        // External requests bypass the schedule so a disable cancels a
        // running dose on the very next tick.
        if self.apply_requests(now_ms)? {
            let snap = self.snapshot(now_ms);
            self.telemetry.publish(&snap);
            return Ok(TickStatus::Ran(snap));
        }

        if now_ms < self.next_update_ms {
            return Ok(TickStatus::Idle);
        }

        self.reservoir.read();
        self.ledger.tick(now_ms / 1000);
        self.refresh_moisture(now_ms);
        self.step(now_ms)?;

        let snap = self.snapshot(now_ms);
        self.telemetry.publish(&snap);
        Ok(TickStatus::Ran(snap))
    }

    // ── External command surface ─────────────────────────────────────

    /// Request enable/disable; applied at the start of the next tick.
    pub fn set_enabled(&mut self, on: bool) {
        self.enable_request = Some(on);
    }

    /// Request a timed pump exercise; the channel parks in Disabled
    /// afterwards.
    pub fn request_pump_test(&mut self) {
        self.pump_test_request = true;
    }

    /// Request a diagnostic moisture and reservoir read.
    pub fn request_self_test(&mut self) {
        self.self_test_request = true;
    }

    // ── Settings surface ─────────────────────────────────────────────

    /// Validate and apply a named setting, then persist it. A persist
    /// failure is surfaced but the in-memory value stays applied.
    pub fn apply_setting(
        &mut self,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), SettingError> {
        let key = self.apply_value(key, value)?;
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!(channel = %self.id, key, error = %e, "setting not persisted");
            return Err(SettingError::Persist {
                key,
                reason: e.to_string(),
            });
        }
        tracing::info!(channel = %self.id, key, value, "setting applied");
        Ok(())
    }

    /// Current value of a named setting, or None for an unknown key.
    pub fn setting(&self, key: &str) -> Option<String> {
        match key {
            "plant_name" => Some(self.plant_name.clone()),
            "min_moisture_target" => Some(self.watering.min_target_pct.to_string()),
            "max_moisture_target" => Some(self.watering.max_target_pct.to_string()),
            "pump_dose_ms" => Some(self.watering.dose_ms.to_string()),
            "between_doses_ms" => Some(self.watering.inter_dose_ms.to_string()),
            "max_doses_per_cycle" => Some(self.ledger.max_doses_per_cycle().to_string()),
            "watering_enabled" => Some(self.enable_request.unwrap_or(self.enabled).to_string()),
            "moisture_counts_dry" => Some(self.estimator.calibration().counts_dry.to_string()),
            "moisture_counts_wet" => Some(self.estimator.calibration().counts_wet.to_string()),
            _ => None,
        }
    }

    fn apply_value(
        &mut self,
        key: &str,
        value: &str,
    ) -> std::result::Result<&'static str, SettingError> {
        match key {
            "plant_name" => {
                if value.trim().is_empty() {
                    return Err(invalid("plant_name", "must not be empty"));
                }
                self.plant_name = value.to_string();
                Ok("plant_name")
            }
            "min_moisture_target" => {
                let v = parse_f32("min_moisture_target", value)?;
                if !(0.0..=100.0).contains(&v) || v >= self.watering.max_target_pct {
                    return Err(invalid(
                        "min_moisture_target",
                        "must be in [0, 100] and below the max target",
                    ));
                }
                self.watering.min_target_pct = v;
                Ok("min_moisture_target")
            }
            "max_moisture_target" => {
                let v = parse_f32("max_moisture_target", value)?;
                if !(0.0..=100.0).contains(&v) || v <= self.watering.min_target_pct {
                    return Err(invalid(
                        "max_moisture_target",
                        "must be in [0, 100] and above the min target",
                    ));
                }
                self.watering.max_target_pct = v;
                Ok("max_moisture_target")
            }
            "pump_dose_ms" => {
                let v = parse_u64("pump_dose_ms", value)?;
                if v == 0 {
                    return Err(invalid("pump_dose_ms", "must be positive"));
                }
                self.watering.dose_ms = v;
                Ok("pump_dose_ms")
            }
            "between_doses_ms" => {
                let v = parse_u64("between_doses_ms", value)?;
                self.watering.inter_dose_ms = v;
                Ok("between_doses_ms")
            }
            "max_doses_per_cycle" => {
                let v = parse_u32("max_doses_per_cycle", value)?;
                if v == 0 {
                    return Err(invalid("max_doses_per_cycle", "must be at least 1"));
                }
                self.ledger.set_max_doses_per_cycle(v);
                Ok("max_doses_per_cycle")
            }
            "watering_enabled" => {
                let v: bool = value.parse().map_err(|_| {
                    invalid("watering_enabled", "expected true or false")
                })?;
                self.set_enabled(v);
                Ok("watering_enabled")
            }
            "moisture_counts_dry" => {
                let v = parse_i32("moisture_counts_dry", value)?;
                if v == self.estimator.calibration().counts_wet {
                    return Err(invalid(
                        "moisture_counts_dry",
                        "must differ from the wet calibration point",
                    ));
                }
                let wet = self.estimator.calibration().counts_wet;
                self.estimator.set_calibration(v, wet);
                Ok("moisture_counts_dry")
            }
            "moisture_counts_wet" => {
                let v = parse_i32("moisture_counts_wet", value)?;
                if v == self.estimator.calibration().counts_dry {
                    return Err(invalid(
                        "moisture_counts_wet",
                        "must differ from the dry calibration point",
                    ));
                }
                let dry = self.estimator.calibration().counts_dry;
                self.estimator.set_calibration(dry, v);
                Ok("moisture_counts_wet")
            }
            _ => Err(SettingError::UnknownKey(key.to_string())),
        }
    }

    /// Replay persisted settings through the validation path. Invalid
    /// stored values are logged and skipped, never fatal.
    fn restore_settings(&mut self) {
        // The targets restore as a pair so a stored band that moved
        // wholesale does not wedge against the built-in default of the
        // other endpoint.
        let min = self.store.get("min_moisture_target");
        let max = self.store.get("max_moisture_target");
        if let (Some(min), Some(max)) = (min.as_deref(), max.as_deref()) {
            match (min.parse::<f32>(), max.parse::<f32>()) {
                (Ok(lo), Ok(hi))
                    if lo.is_finite()
                        && hi.is_finite()
                        && (0.0..=100.0).contains(&lo)
                        && (0.0..=100.0).contains(&hi)
                        && lo < hi =>
                {
                    self.watering.min_target_pct = lo;
                    self.watering.max_target_pct = hi;
                }
                _ => {
                    tracing::warn!(channel = %self.id, min, max, "ignoring stored moisture targets");
                }
            }
        } else {
            for key in ["min_moisture_target", "max_moisture_target"] {
                if let Some(value) = self.store.get(key)
                    && let Err(e) = self.apply_value(key, &value)
                {
                    tracing::warn!(channel = %self.id, key, value, error = %e, "ignoring stored setting");
                }
            }
        }

        for key in SETTING_KEYS.iter().copied() {
            if matches!(key, "min_moisture_target" | "max_moisture_target") {
                continue;
            }
            if let Some(value) = self.store.get(key)
                && let Err(e) = self.apply_value(key, &value)
            {
                tracing::warn!(channel = %self.id, key, value, error = %e, "ignoring stored setting");
            }
        }
    }

    // ── Tick internals ───────────────────────────────────────────────

    /// Apply pending external requests. Returns true when a request
    /// forced a transition, which consumes the tick.
    fn apply_requests(&mut self, now_ms: u64) -> Result<bool> {
        if let Some(on) = self.enable_request.take() {
            self.enabled = on;
            if on {
                if self.state == ChannelState::Disabled {
                    self.set_state(now_ms, ChannelState::Evaluate, 0, "operator enable");
                    return Ok(true);
                }
            } else if self.state != ChannelState::Disabled {
                self.pump_off(now_ms)?;
                self.set_state(
                    now_ms,
                    ChannelState::Disabled,
                    self.watering.disabled_poll_ms,
                    "operator disable",
                );
                return Ok(true);
            }
        }
        if self.pump_test_request {
            self.pump_test_request = false;
            self.reservoir.read();
            if self.interlock_enabled && !self.reservoir.have_water() {
                tracing::warn!(channel = %self.id, "pump test refused, reservoir empty");
                self.set_state(
                    now_ms,
                    ChannelState::Disabled,
                    self.watering.disabled_poll_ms,
                    "pump test refused",
                );
            } else {
                self.pump_on(now_ms)?;
                self.set_state(
                    now_ms,
                    ChannelState::PumpTest,
                    self.watering.dose_ms,
                    "pump test",
                );
            }
            return Ok(true);
        }
        if self.self_test_request {
            self.self_test_request = false;
            self.pump_off(now_ms)?;
            self.set_state(now_ms, ChannelState::SelfTest, 0, "self test");
            return Ok(true);
        }
        Ok(false)
    }

    /// Steer the smoothing time constant and, when the probe can be
    /// trusted, fold in a fresh sample. The probe is only read with the
    /// pump off and the settle delay elapsed since pump-off; supply
    /// voltage sags under pump load and the reading right after is junk.
    fn refresh_moisture(&mut self, now_ms: u64) {
        let sigma = if self.state == ChannelState::WaitForNextCycle {
            let since_s = now_ms.saturating_sub(self.state_changed_ms) as f32 / 1000.0;
            (self.smoothing.dosing_sigma_s + since_s)
                .clamp(self.smoothing.dosing_sigma_s, self.smoothing.idle_sigma_max_s)
        } else {
            self.smoothing.dosing_sigma_s
        };
        self.estimator.set_sigma(sigma);

        if self.pump_is_on {
            return;
        }
        if let Some(off) = self.last_pump_off_ms
            && now_ms.saturating_sub(off) < self.watering.settle_ms
        {
            return;
        }
        self.estimator.read(now_ms);
    }

    fn step(&mut self, now_ms: u64) -> Result<()> {
        match self.state {
            ChannelState::Evaluate => self.evaluate(now_ms),
            ChannelState::Dosing => {
                let dose_ms = self.watering.dose_ms;
                self.pump_off(now_ms)?;
                self.reservoir.pump_ran_for(dose_ms);
                self.last_dose_end_ms = now_ms;
                self.set_state(
                    now_ms,
                    ChannelState::EndOfDose,
                    self.watering.recheck_ms,
                    "dose complete",
                );
                Ok(())
            }
            ChannelState::EndOfDose => {
                self.set_state(now_ms, ChannelState::Evaluate, 0, "re-evaluating");
                Ok(())
            }
            ChannelState::WaitForNextCycle => {
                if self.estimator.filtered_value() < self.watering.min_target_pct {
                    self.set_state(now_ms, ChannelState::Evaluate, 0, "soil below min target");
                } else {
                    self.set_state(
                        now_ms,
                        ChannelState::WaitForNextCycle,
                        self.watering.recheck_ms,
                        "soil still moist",
                    );
                }
                Ok(())
            }
            ChannelState::Paused => {
                self.pump_off(now_ms)?;
                if self.estimator.filtered_value() > self.watering.max_target_pct {
                    self.set_state(
                        now_ms,
                        ChannelState::WaitForNextCycle,
                        self.watering.recheck_ms,
                        "soil above max target",
                    );
                } else if self.ledger.should_pause_watering() {
                    self.set_state(
                        now_ms,
                        ChannelState::Paused,
                        self.watering.recheck_ms,
                        "dose cap still reached",
                    );
                } else {
                    self.set_state(now_ms, ChannelState::Evaluate, 0, "dose cap cleared");
                }
                Ok(())
            }
            ChannelState::Disabled => {
                self.pump_off(now_ms)?;
                if self.enabled {
                    self.set_state(now_ms, ChannelState::Evaluate, 0, "enable flag set");
                } else {
                    self.set_state(
                        now_ms,
                        ChannelState::Disabled,
                        self.watering.disabled_poll_ms,
                        "still disabled",
                    );
                }
                Ok(())
            }
            ChannelState::PumpTest => {
                let dose_ms = self.watering.dose_ms;
                self.pump_off(now_ms)?;
                self.reservoir.pump_ran_for(dose_ms);
                self.set_state(
                    now_ms,
                    ChannelState::Disabled,
                    self.watering.disabled_poll_ms,
                    "pump test complete",
                );
                Ok(())
            }
            ChannelState::SelfTest => {
                self.reservoir.read();
                self.estimator.read(now_ms);
                tracing::info!(
                    channel = %self.id,
                    moisture = self.estimator.filtered_value(),
                    raw = self.estimator.raw_counts(),
                    sensor_fault = self.estimator.reading_failed(),
                    reservoir_secs = self.reservoir.secs_remaining(),
                    have_water = self.reservoir.have_water(),
                    "self test",
                );
                self.set_state(now_ms, ChannelState::Disabled, 1_000, "self test complete");
                Ok(())
            }
        }
    }

    /// Guards in priority order; the first that holds decides the
    /// transition.
    fn evaluate(&mut self, now_ms: u64) -> Result<()> {
        self.pump_off(now_ms)?;

        if now_ms.saturating_sub(self.last_dose_end_ms) < self.watering.inter_dose_ms {
            self.set_state(
                now_ms,
                ChannelState::Evaluate,
                self.watering.recheck_ms,
                "inter-dose interval",
            );
            return Ok(());
        }
        if self.interlock_enabled && !self.reservoir.have_water() {
            self.set_state(
                now_ms,
                ChannelState::Evaluate,
                self.watering.recheck_ms,
                "reservoir empty",
            );
            return Ok(());
        }
        if self.estimator.reading_failed() {
            self.fault(now_ms, "sensor read failure");
            return Ok(());
        }
        if self.estimator.primed() {
            let estimate = self.estimator.estimate();
            if estimate < self.watering.plausibility_floor_pct
                || estimate > self.watering.plausibility_ceiling_pct
            {
                tracing::warn!(
                    channel = %self.id,
                    estimate,
                    raw = self.estimator.raw_counts(),
                    "implausible moisture estimate, probe likely out of soil",
                );
                self.fault(now_ms, "implausible moisture");
                return Ok(());
            }
        }
        if self.estimator.filtered_value() > self.watering.max_target_pct {
            self.set_state(
                now_ms,
                ChannelState::WaitForNextCycle,
                self.watering.recheck_ms,
                "soil above max target",
            );
            return Ok(());
        }
        if self.ledger.should_pause_watering() {
            self.set_state(
                now_ms,
                ChannelState::Paused,
                self.watering.recheck_ms,
                "dose cap reached",
            );
            return Ok(());
        }

        if !self.ledger.is_cycle_open() {
            self.ledger.start_cycle(now_ms / 1000);
        }
        self.pump_on(now_ms)?;
        self.ledger.add_dose();
        self.set_state(now_ms, ChannelState::Dosing, self.watering.dose_ms, "dose start");
        Ok(())
    }

    /// A sensor fault clears the enabled flag so the channel stays down
    /// until an operator re-enables it; this distinguishes fault-driven
    /// disable from a plain operator disable only by the log trail.
    fn fault(&mut self, now_ms: u64, reason: &'static str) {
        tracing::error!(channel = %self.id, reason, "channel fault, disabling");
        self.enabled = false;
        self.set_state(
            now_ms,
            ChannelState::Disabled,
            self.watering.disabled_poll_ms,
            reason,
        );
    }

    fn set_state(&mut self, now_ms: u64, next: ChannelState, dwell_ms: u64, reason: &'static str) {
        if next != self.state {
            if !next.is_watering() && self.ledger.is_cycle_open() {
                self.ledger.end_cycle();
                tracing::debug!(channel = %self.id, "irrigation cycle closed");
            }
            tracing::info!(
                channel = %self.id,
                from = %self.state,
                to = %next,
                reason,
                "state change",
            );
            self.state = next;
            self.state_changed_ms = now_ms;
        } else {
            tracing::debug!(channel = %self.id, state = %self.state, reason, "recheck scheduled");
        }
        self.next_update_ms = now_ms + dwell_ms;
    }

    fn pump_on(&mut self, _now_ms: u64) -> Result<()> {
        if self.pump_is_on {
            return Ok(());
        }
        self.pump
            .set_on(true)
            .map_err(|e| eyre::Report::new(IrrigationError::Pump(e.to_string())))
            .wrap_err("pump on")?;
        self.pump_is_on = true;
        tracing::info!(channel = %self.id, "pump on");
        Ok(())
    }

    fn pump_off(&mut self, now_ms: u64) -> Result<()> {
        if !self.pump_is_on {
            return Ok(());
        }
        self.pump
            .set_on(false)
            .map_err(|e| eyre::Report::new(IrrigationError::Pump(e.to_string())))
            .wrap_err("pump off")?;
        self.pump_is_on = false;
        self.last_pump_off_ms = Some(now_ms);
        tracing::info!(channel = %self.id, "pump off");
        Ok(())
    }

    fn snapshot(&self, now_ms: u64) -> ChannelSnapshot {
        ChannelSnapshot {
            channel: self.id.clone(),
            plant_name: self.plant_name.clone(),
            state: self.state.name(),
            moisture_pct: self.estimator.filtered_value(),
            raw_counts: self.estimator.raw_counts(),
            min_target_pct: self.watering.min_target_pct,
            max_target_pct: self.watering.max_target_pct,
            doses_this_cycle: self.ledger.doses_this_cycle(),
            doses_today: self.ledger.doses_today(),
            enabled: self.enabled,
            pump_on: self.pump_is_on,
            seconds_since_dose: now_ms.saturating_sub(self.last_dose_end_ms) as f32 / 1000.0,
            reservoir_secs_remaining: self.reservoir.secs_remaining(),
        }
    }

    // ── Read surface ─────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn plant_name(&self) -> &str {
        &self.plant_name
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn pump_is_on(&self) -> bool {
        self.pump_is_on
    }

    pub fn moisture_pct(&self) -> f32 {
        self.estimator.filtered_value()
    }

    pub fn raw_counts(&self) -> i32 {
        self.estimator.raw_counts()
    }

    pub fn doses_this_cycle(&self) -> u32 {
        self.ledger.doses_this_cycle()
    }

    pub fn doses_today(&self) -> u32 {
        self.ledger.doses_today()
    }

    pub fn reservoir_secs_remaining(&self) -> f32 {
        self.reservoir.secs_remaining()
    }

    /// Current smoothing time constant, as steered by the state machine.
    pub fn sigma_seconds(&self) -> f32 {
        self.estimator.sigma()
    }

    /// Feed an ambient temperature reading into the compensation term.
    pub fn set_temperature_c(&mut self, current_c: f32) {
        self.estimator.set_temperature_c(current_c);
    }
}

fn invalid(key: &'static str, reason: &str) -> SettingError {
    SettingError::InvalidValue {
        key,
        reason: reason.to_string(),
    }
}

fn parse_f32(key: &'static str, value: &str) -> std::result::Result<f32, SettingError> {
    match value.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(key, "expected a finite number")),
    }
}

fn parse_u64(key: &'static str, value: &str) -> std::result::Result<u64, SettingError> {
    value
        .parse::<u64>()
        .map_err(|_| invalid(key, "expected a non-negative integer"))
}

fn parse_u32(key: &'static str, value: &str) -> std::result::Result<u32, SettingError> {
    value
        .parse::<u32>()
        .map_err(|_| invalid(key, "expected a non-negative integer"))
}

fn parse_i32(key: &'static str, value: &str) -> std::result::Result<i32, SettingError> {
    value
        .parse::<i32>()
        .map_err(|_| invalid(key, "expected an integer"))
}

/// Builder for `PlantChannel`. Peripherals are required up front; the
/// collaborators and tuning all have working defaults.
pub struct PlantChannelBuilder<P: MoistureProbe, L: LevelSwitch, M: Pump> {
    id: String,
    plant_name: Option<String>,
    probe: P,
    level: L,
    pump: M,
    telemetry: Box<dyn Telemetry>,
    store: Box<dyn ConfigStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    calibration: CalibrationCfg,
    compensation: CompensationCfg,
    smoothing: SmoothingCfg,
    watering: WateringCfg,
    ledger: LedgerCfg,
    reservoir: ReservoirCfg,
    enabled: bool,
}

impl<P: MoistureProbe, L: LevelSwitch, M: Pump> PlantChannelBuilder<P, L, M> {
    fn new(id: String, probe: P, level: L, pump: M) -> Self {
        Self {
            id,
            plant_name: None,
            probe,
            level,
            pump,
            telemetry: Box::new(NullTelemetry),
            store: Box::new(MemoryStore::new()),
            clock: Arc::new(irrigator_traits::MonotonicClock::new()),
            calibration: CalibrationCfg::default(),
            compensation: CompensationCfg::default(),
            smoothing: SmoothingCfg::default(),
            watering: WateringCfg::default(),
            ledger: LedgerCfg::default(),
            reservoir: ReservoirCfg::default(),
            enabled: false,
        }
    }

    pub fn plant_name(mut self, name: impl Into<String>) -> Self {
        self.plant_name = Some(name.into());
        self
    }

    pub fn calibration(mut self, cfg: CalibrationCfg) -> Self {
        self.calibration = cfg;
        self
    }

    pub fn compensation(mut self, cfg: CompensationCfg) -> Self {
        self.compensation = cfg;
        self
    }

    pub fn smoothing(mut self, cfg: SmoothingCfg) -> Self {
        self.smoothing = cfg;
        self
    }

    pub fn watering(mut self, cfg: WateringCfg) -> Self {
        self.watering = cfg;
        self
    }

    pub fn ledger(mut self, cfg: LedgerCfg) -> Self {
        self.ledger = cfg;
        self
    }

    pub fn reservoir(mut self, cfg: ReservoirCfg) -> Self {
        self.reservoir = cfg;
        self
    }

    pub fn telemetry(mut self, telemetry: Box<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config_store(mut self, store: Box<dyn ConfigStore>) -> Self {
        self.store = store;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn enabled(mut self, on: bool) -> Self {
        self.enabled = on;
        self
    }

    pub fn try_build(self) -> Result<PlantChannel<P, L, M>> {
        self.validate().map_err(eyre::Report::new)?;

        let epoch = self.clock.now();
        let estimator = MoistureEstimator::new(
            self.probe,
            self.calibration,
            self.compensation,
            self.smoothing.dosing_sigma_s,
        );
        let mut channel = PlantChannel {
            plant_name: self.plant_name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            estimator,
            ledger: DoseLedger::new(self.ledger),
            reservoir: ReservoirMonitor::new(self.level, self.reservoir),
            pump: self.pump,
            telemetry: self.telemetry,
            store: self.store,
            clock: self.clock,
            epoch,
            watering: self.watering,
            smoothing: self.smoothing,
            interlock_enabled: self.reservoir.interlock_enabled,
            state: ChannelState::Disabled,
            next_update_ms: 0,
            state_changed_ms: 0,
            enabled: self.enabled,
            enable_request: None,
            pump_test_request: false,
            self_test_request: false,
            pump_is_on: false,
            last_pump_off_ms: None,
            last_dose_end_ms: 0,
        };
        channel.restore_settings();
        for metric in CHANNEL_METRICS {
            channel.telemetry.register(&channel.id, metric);
        }
        Ok(channel)
    }

    fn validate(&self) -> std::result::Result<(), BuildError> {
        if self.id.trim().is_empty() {
            return Err(BuildError::InvalidConfig("channel id must not be empty"));
        }
        let w = &self.watering;
        if !w.min_target_pct.is_finite() || !w.max_target_pct.is_finite() {
            return Err(BuildError::InvalidConfig("moisture targets must be finite"));
        }
        if !(0.0..=100.0).contains(&w.min_target_pct)
            || !(0.0..=100.0).contains(&w.max_target_pct)
            || w.min_target_pct >= w.max_target_pct
        {
            return Err(BuildError::InvalidConfig(
                "moisture targets must satisfy 0 <= min < max <= 100",
            ));
        }
        if w.dose_ms == 0 {
            return Err(BuildError::InvalidConfig("dose_ms must be positive"));
        }
        if w.recheck_ms == 0 || w.disabled_poll_ms == 0 {
            return Err(BuildError::InvalidConfig(
                "recheck and disabled-poll periods must be positive",
            ));
        }
        if w.plausibility_floor_pct >= w.plausibility_ceiling_pct {
            return Err(BuildError::InvalidConfig(
                "plausibility floor must be below the ceiling",
            ));
        }
        if self.calibration.counts_dry == self.calibration.counts_wet {
            return Err(BuildError::InvalidConfig(
                "calibration points must differ",
            ));
        }
        if self.calibration.valid_min >= self.calibration.valid_max {
            return Err(BuildError::InvalidConfig(
                "raw validity window must satisfy min < max",
            ));
        }
        if !(self.smoothing.dosing_sigma_s > 0.0)
            || self.smoothing.idle_sigma_max_s < self.smoothing.dosing_sigma_s
        {
            return Err(BuildError::InvalidConfig(
                "smoothing sigma bounds must satisfy 0 < dosing <= idle",
            ));
        }
        if self.ledger.max_doses_per_cycle == 0 {
            return Err(BuildError::InvalidConfig(
                "max_doses_per_cycle must be at least 1",
            ));
        }
        if !(self.reservoir.low_water_secs >= 0.0) {
            return Err(BuildError::InvalidConfig(
                "low_water_secs must be non-negative",
            ));
        }
        Ok(())
    }
}
