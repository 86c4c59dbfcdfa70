#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration parsing for the irrigation controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The calibration CSV loader enforces headers and fits the two-point
//!   moisture calibration by least squares over all probe readings.

use serde::Deserialize;

/// Calibration CSV schema.
///
/// Expected headers:
/// raw,percent
///
/// Example:
/// raw,percent
/// 2900,0.0
/// 1470,100.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub raw: i32,
    pub percent: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerCfg {
    /// Tick period of the controller loop in milliseconds.
    pub tick_ms: u64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self { tick_ms: 250 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationToml {
    pub counts_dry: i32,
    pub counts_wet: i32,
    pub valid_min: i32,
    pub valid_max: i32,
    /// Optional CSV with probe readings; when set, the fitted endpoints
    /// override `counts_dry`/`counts_wet`.
    pub csv: Option<String>,
}

impl Default for CalibrationToml {
    fn default() -> Self {
        Self {
            counts_dry: 2900,
            counts_wet: 1470,
            valid_min: 350,
            valid_max: 4095,
            csv: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CompensationToml {
    pub pct_per_deg_c: f32,
    pub reference_c: f32,
}

impl Default for CompensationToml {
    fn default() -> Self {
        Self {
            pct_per_deg_c: 0.075,
            reference_c: 20.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SmoothingToml {
    pub dosing_sigma_s: f32,
    pub idle_sigma_max_s: f32,
}

impl Default for SmoothingToml {
    fn default() -> Self {
        Self {
            dosing_sigma_s: 300.0,
            idle_sigma_max_s: 1200.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReservoirToml {
    pub low_water_secs: f32,
    pub interlock: bool,
}

impl Default for ReservoirToml {
    fn default() -> Self {
        Self {
            low_water_secs: 10.0,
            interlock: true,
        }
    }
}

/// One `[[channels]]` entry.
#[derive(Debug, Deserialize)]
pub struct ChannelToml {
    pub id: String,
    pub plant_name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_target")]
    pub min_moisture_target: f32,
    #[serde(default = "default_max_target")]
    pub max_moisture_target: f32,
    #[serde(default = "default_dose_ms")]
    pub pump_dose_ms: u64,
    #[serde(default = "default_between_doses_ms")]
    pub between_doses_ms: u64,
    #[serde(default = "default_max_doses")]
    pub max_doses_per_cycle: u32,
    #[serde(default)]
    pub calibration: CalibrationToml,
    #[serde(default)]
    pub compensation: CompensationToml,
    #[serde(default)]
    pub smoothing: SmoothingToml,
    #[serde(default)]
    pub reservoir: ReservoirToml,
}

fn default_enabled() -> bool {
    true
}
fn default_min_target() -> f32 {
    70.0
}
fn default_max_target() -> f32 {
    80.0
}
fn default_dose_ms() -> u64 {
    3_000
}
fn default_between_doses_ms() -> u64 {
    900_000
}
fn default_max_doses() -> u32 {
    6
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub channels: Vec<ChannelToml>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.scheduler.tick_ms == 0 {
            eyre::bail!("scheduler.tick_ms must be >= 1");
        }
        if self.channels.is_empty() {
            eyre::bail!("at least one [[channels]] entry is required");
        }
        for (i, ch) in self.channels.iter().enumerate() {
            if ch.id.trim().is_empty() {
                eyre::bail!("channels[{i}].id must not be empty");
            }
            if self.channels.iter().filter(|c| c.id == ch.id).count() > 1 {
                eyre::bail!("duplicate channel id '{}'", ch.id);
            }
            if !(0.0..=100.0).contains(&ch.min_moisture_target)
                || !(0.0..=100.0).contains(&ch.max_moisture_target)
                || ch.min_moisture_target >= ch.max_moisture_target
            {
                eyre::bail!(
                    "channel '{}': moisture targets must satisfy 0 <= min < max <= 100",
                    ch.id
                );
            }
            if ch.pump_dose_ms == 0 {
                eyre::bail!("channel '{}': pump_dose_ms must be > 0", ch.id);
            }
            if ch.pump_dose_ms > 60_000 {
                eyre::bail!(
                    "channel '{}': pump_dose_ms is unreasonably large (>60s)",
                    ch.id
                );
            }
            if ch.max_doses_per_cycle == 0 {
                eyre::bail!("channel '{}': max_doses_per_cycle must be >= 1", ch.id);
            }
            if ch.calibration.counts_dry == ch.calibration.counts_wet {
                eyre::bail!("channel '{}': calibration points must differ", ch.id);
            }
            if ch.calibration.valid_min >= ch.calibration.valid_max {
                eyre::bail!(
                    "channel '{}': calibration validity window must satisfy min < max",
                    ch.id
                );
            }
            if !(ch.smoothing.dosing_sigma_s > 0.0)
                || ch.smoothing.idle_sigma_max_s < ch.smoothing.dosing_sigma_s
            {
                eyre::bail!(
                    "channel '{}': smoothing sigmas must satisfy 0 < dosing <= idle",
                    ch.id
                );
            }
            if !(ch.reservoir.low_water_secs >= 0.0) {
                eyre::bail!("channel '{}': reservoir.low_water_secs must be >= 0", ch.id);
            }
        }
        Ok(())
    }
}

/// Fitted two-point moisture calibration: the raw counts the probe
/// reads in dry (0%) and saturated (100%) soil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoistureCalibration {
    pub counts_dry: i32,
    pub counts_wet: i32,
}

impl MoistureCalibration {
    /// Fit `percent = a*raw + b` by ordinary least squares over all
    /// rows, then evaluate the inverse at 0% and 100% to recover the
    /// calibration endpoints.
    pub fn from_rows(rows: Vec<CalibrationRow>) -> eyre::Result<Self> {
        if rows.len() < 2 {
            eyre::bail!("calibration requires at least two rows, got {}", rows.len());
        }

        // Raw values must be strictly monotonic; duplicates or direction
        // flips mean the capture is unusable.
        let mut dir: i8 = 0;
        for i in 1..rows.len() {
            let d = rows[i].raw - rows[i - 1].raw;
            if d == 0 {
                eyre::bail!(
                    "calibration rows have duplicate raw values at index {} and {}",
                    i - 1,
                    i
                );
            }
            let step_dir = if d > 0 { 1 } else { -1 };
            if dir == 0 {
                dir = step_dir;
            } else if dir != step_dir {
                eyre::bail!(
                    "calibration raw values must be monotonic (strictly increasing or strictly decreasing)"
                );
            }
        }

        // OLS fit in f64 for numerical stability.
        let n = rows.len() as f64;
        let sum_x: f64 = rows.iter().map(|r| r.raw as f64).sum();
        let sum_y: f64 = rows.iter().map(|r| r.percent as f64).sum();
        let mean_x = sum_x / n;
        let mean_y = sum_y / n;
        let mut sxx = 0.0f64;
        let mut sxy = 0.0f64;
        for r in &rows {
            let x = r.raw as f64 - mean_x;
            let y = r.percent as f64 - mean_y;
            sxx += x * x;
            sxy += x * y;
        }
        if !sxx.is_finite() || sxx == 0.0 {
            eyre::bail!("calibration cannot determine slope (degenerate raw variance)");
        }
        let a = sxy / sxx;
        if !a.is_finite() || a == 0.0 {
            eyre::bail!("calibration produced a flat or non-finite slope");
        }
        let b = mean_y - a * mean_x;

        let raw_at_dry = -b / a;
        let raw_at_wet = (100.0 - b) / a;
        if !raw_at_dry.is_finite() || !raw_at_wet.is_finite() {
            eyre::bail!("calibration produced non-finite endpoints");
        }
        let counts_dry = raw_at_dry.round() as i32;
        let counts_wet = raw_at_wet.round() as i32;
        if counts_dry == counts_wet {
            eyre::bail!("calibration endpoints collapsed to the same raw count");
        }

        Ok(Self {
            counts_dry,
            counts_wet,
        })
    }
}

impl TryFrom<Vec<CalibrationRow>> for MoistureCalibration {
    type Error = eyre::Report;
    fn try_from(rows: Vec<CalibrationRow>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<MoistureCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["raw", "percent"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'raw,percent', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    MoistureCalibration::try_from(rows)
}
