//! Error types of the race simulation engine.

use crate::core::program::ProgramId;
use thiserror::Error;

/// Errors reported by the engine. Duplicate starts and resets of idle programs are not errors,
/// they are ignored by the engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// No program with this id is known to the engine
    #[error("Program {0} not found")]
    ProgramNotFound(ProgramId),

    /// Program does not fulfil the requirements for racing
    #[error("Invalid program {id}: {reason}")]
    InvalidProgram { id: ProgramId, reason: String },

    /// Simulation constants are out of range
    #[error("Invalid simulation constants: {0}")]
    InvalidConstants(String),

    /// The other end of a command or snapshot channel is gone
    #[error("Channel closed")]
    ChannelClosed,
}

impl EngineError {
    pub fn invalid_program(id: ProgramId, reason: impl Into<String>) -> Self {
        Self::InvalidProgram {
            id,
            reason: reason.into(),
        }
    }
}
