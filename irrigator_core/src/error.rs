use thiserror::Error;

/// Runtime errors surfaced from a channel tick. Sensor faults are not
/// errors: they are flags consumed by the state machine's guards and
/// resolve into the Disabled state instead.
#[derive(Debug, Error, Clone)]
pub enum IrrigationError {
    #[error("pump error: {0}")]
    Pump(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Failures from the per-channel settings write surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    /// The value was applied in memory but could not be persisted.
    /// Non-fatal: the channel keeps operating on the applied value.
    #[error("failed to persist {key}: {reason}")]
    Persist { key: &'static str, reason: String },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
