use crate::core::program::{ProgramId, RaceProgram};

/// Command is the closed set of messages the engine accepts from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartRace(ProgramId),
    ResetRace(ProgramId),
    StartAllRaces,
    ResetAllRaces,
    TogglePause,
    SetPaused(bool),
    SetPrograms(Vec<RaceProgram>),
    /// Stops the real-time driver, ignored by the engine itself
    Shutdown,
}
