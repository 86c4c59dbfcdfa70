//! Channel state and tick outcome types.

use irrigator_traits::ChannelSnapshot;

/// Controller state of one plant channel. External code may only force
/// transitions through the enable/disable/test request surface; every
/// other transition is internal to the tick step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Deciding whether a dose is due.
    Evaluate,
    /// Pump on for one timed dose.
    Dosing,
    /// Dose just finished, pump off, bookkeeping done.
    EndOfDose,
    /// Soil above target, waiting for it to dry out.
    WaitForNextCycle,
    /// Dose caps reached, watering suspended.
    Paused,
    /// Off. Entered by operator request or by a sensor fault.
    Disabled,
    /// Operator-requested timed pump exercise.
    PumpTest,
    /// Operator-requested diagnostic read.
    SelfTest,
}

impl ChannelState {
    /// Display name as published to status surfaces.
    pub fn name(self) -> &'static str {
        match self {
            ChannelState::Evaluate => "evaluating",
            ChannelState::Dosing => "dosing",
            ChannelState::EndOfDose => "end of dose",
            ChannelState::WaitForNextCycle => "soil is moist",
            ChannelState::Paused => "watering paused",
            ChannelState::Disabled => "watering disabled",
            ChannelState::PumpTest => "pump test",
            ChannelState::SelfTest => "self test",
        }
    }

    /// States that belong to an active irrigation cycle.
    pub fn is_watering(self) -> bool {
        matches!(
            self,
            ChannelState::Evaluate | ChannelState::Dosing | ChannelState::EndOfDose
        )
    }
}

impl core::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one tick invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum TickStatus {
    /// Invoked before the scheduled next-update time; nothing ran.
    Idle,
    /// A full step ran; the published snapshot is returned.
    Ran(ChannelSnapshot),
}
