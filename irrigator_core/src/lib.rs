//! Hardware-agnostic irrigation control core.
//!
//! One `PlantChannel` per plant: a tick-driven state machine that keeps
//! soil moisture inside a configured band, bounded by dose-safety caps
//! and a reservoir interlock. Peripherals, persistence, and telemetry
//! are injected through the `irrigator_traits` contracts, so the same
//! core runs against GPIO, a simulator, or test doubles.

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![deny(rust_2018_idioms)]

pub mod channel;
pub mod config;
pub mod error;
pub mod estimator;
pub mod ledger;
pub mod mocks;
pub mod reservoir;
pub mod status;

pub use channel::{CHANNEL_METRICS, PlantChannel, PlantChannelBuilder, SETTING_KEYS};
pub use config::{
    CalibrationCfg, CompensationCfg, LedgerCfg, ReservoirCfg, SmoothingCfg, WateringCfg,
};
pub use error::{BuildError, IrrigationError, Result, SettingError};
pub use estimator::MoistureEstimator;
pub use ledger::DoseLedger;
pub use reservoir::ReservoirMonitor;
pub use status::{ChannelState, TickStatus};
