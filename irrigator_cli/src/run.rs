//! Channel assembly and the controller loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use irrigator_config::{ChannelToml, Config};
use irrigator_core::mocks::MemoryStore;
use irrigator_core::{
    CalibrationCfg, CompensationCfg, LedgerCfg, PlantChannel, ReservoirCfg, SmoothingCfg,
    TickStatus, WateringCfg,
};
use irrigator_traits::clock::{Clock, MonotonicClock};
use irrigator_traits::{ChannelSnapshot, MetricDescriptor, Telemetry};

use crate::sim::{SimLevel, SimProbe, SimPump, SimulatedPlant};

pub type SimChannel = PlantChannel<SimProbe, SimLevel, SimPump>;

/// Telemetry sink that writes status lines to stdout, one per snapshot,
/// as JSON or a compact human line.
pub struct StdoutTelemetry {
    json: bool,
}

impl StdoutTelemetry {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl Telemetry for StdoutTelemetry {
    fn register(&mut self, channel: &str, metric: &MetricDescriptor) {
        tracing::debug!(channel, metric = metric.name, "metric registered");
    }

    fn publish(&mut self, s: &ChannelSnapshot) {
        if self.json {
            let line = serde_json::json!({
                "channel": s.channel,
                "plant": s.plant_name,
                "state": s.state,
                "moisture_pct": s.moisture_pct,
                "raw": s.raw_counts,
                "target": [s.min_target_pct, s.max_target_pct],
                "doses_this_cycle": s.doses_this_cycle,
                "doses_today": s.doses_today,
                "enabled": s.enabled,
                "pump_on": s.pump_on,
                "seconds_since_dose": s.seconds_since_dose,
                "reservoir_secs": s.reservoir_secs_remaining,
            });
            println!("{line}");
        } else {
            println!(
                "{} [{}] {:.1}% ({}..{}) doses {}/{} pump {} water {:.1}s",
                s.channel,
                s.state,
                s.moisture_pct,
                s.min_target_pct,
                s.max_target_pct,
                s.doses_this_cycle,
                s.doses_today,
                if s.pump_on { "on" } else { "off" },
                s.reservoir_secs_remaining,
            );
        }
    }
}

fn watering_cfg(ch: &ChannelToml) -> WateringCfg {
    WateringCfg {
        min_target_pct: ch.min_moisture_target,
        max_target_pct: ch.max_moisture_target,
        dose_ms: ch.pump_dose_ms,
        inter_dose_ms: ch.between_doses_ms,
        ..WateringCfg::default()
    }
}

fn calibration_cfg(ch: &ChannelToml) -> eyre::Result<CalibrationCfg> {
    let mut cfg = CalibrationCfg {
        counts_dry: ch.calibration.counts_dry,
        counts_wet: ch.calibration.counts_wet,
        valid_min: ch.calibration.valid_min,
        valid_max: ch.calibration.valid_max,
    };
    if let Some(path) = &ch.calibration.csv {
        let fitted = irrigator_config::load_calibration_csv(std::path::Path::new(path))
            .wrap_err_with(|| format!("channel '{}': calibration CSV", ch.id))?;
        cfg.counts_dry = fitted.counts_dry;
        cfg.counts_wet = fitted.counts_wet;
    }
    Ok(cfg)
}

/// Build one simulated channel per `[[channels]]` entry.
pub fn build_channels(cfg: &Config, json: bool) -> eyre::Result<Vec<SimChannel>> {
    let mut channels = Vec::with_capacity(cfg.channels.len());
    for ch in &cfg.channels {
        let calibration = calibration_cfg(ch)?;
        // Simulated soil starts just below the watering band so a run
        // shows a full dose cycle quickly.
        let start_pct = (ch.min_moisture_target - 5.0).max(0.0);
        let plant = SimulatedPlant::new(
            start_pct,
            120.0,
            calibration.counts_dry,
            calibration.counts_wet,
        );
        let channel = PlantChannel::builder(
            ch.id.clone(),
            plant.probe(),
            plant.level(),
            plant.pump(),
        )
        .plant_name(ch.plant_name.clone().unwrap_or_else(|| ch.id.clone()))
        .watering(watering_cfg(ch))
        .calibration(calibration)
        .compensation(CompensationCfg {
            pct_per_deg_c: ch.compensation.pct_per_deg_c,
            reference_c: ch.compensation.reference_c,
        })
        .smoothing(SmoothingCfg {
            dosing_sigma_s: ch.smoothing.dosing_sigma_s,
            idle_sigma_max_s: ch.smoothing.idle_sigma_max_s,
        })
        .ledger(LedgerCfg {
            max_doses_per_cycle: ch.max_doses_per_cycle,
            ..LedgerCfg::default()
        })
        .reservoir(ReservoirCfg {
            low_water_secs: ch.reservoir.low_water_secs,
            interlock_enabled: ch.reservoir.interlock,
        })
        .telemetry(Box::new(StdoutTelemetry::new(json)))
        .config_store(Box::new(MemoryStore::new()))
        .enabled(ch.enabled)
        .try_build()
        .wrap_err_with(|| format!("building channel '{}'", ch.id))?;
        channels.push(channel);
    }
    Ok(channels)
}

/// Tick all channels round-robin until Ctrl-C or the tick budget runs
/// out. Channels are disabled on the way out so pumps are left off.
pub fn run_loop(
    cfg: &Config,
    channels: &mut [SimChannel],
    max_ticks: Option<u64>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let clock = MonotonicClock::new();
    let tick = Duration::from_millis(cfg.scheduler.tick_ms);
    tracing::info!(
        channels = channels.len(),
        tick_ms = cfg.scheduler.tick_ms,
        "controller loop started",
    );

    let mut ticks = 0u64;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            break;
        }
        if let Some(limit) = max_ticks
            && ticks >= limit
        {
            tracing::info!(ticks, "tick budget exhausted");
            break;
        }
        for channel in channels.iter_mut() {
            if let TickStatus::Ran(snap) = channel.tick()? {
                tracing::debug!(
                    channel = %snap.channel,
                    state = snap.state,
                    moisture = snap.moisture_pct,
                    "tick",
                );
            }
        }
        ticks += 1;
        clock.sleep(tick);
    }

    for channel in channels.iter_mut() {
        channel.set_enabled(false);
        channel.tick()?;
    }
    Ok(())
}
