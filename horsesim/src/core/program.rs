use crate::core::horse::{Horse, HorseId};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub type ProgramId = u32;

/// A scheduled race. Horses are shared with the horse supply and never copied.
///
/// * `id` - Unique program number
/// * `distance` - (m) Race distance
/// * `horses` - Participating horses in their fixed program order
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RaceProgram {
    pub id: ProgramId,
    pub distance: f64,
    pub horses: Vec<Arc<Horse>>,
}

impl RaceProgram {
    pub fn new(id: ProgramId, distance: f64, horses: Vec<Arc<Horse>>) -> RaceProgram {
        RaceProgram {
            id,
            distance,
            horses,
        }
    }

    /// validate checks the contract the engine relies on: positive distance, at least one
    /// horse, unique horse ids and conditions in range.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.distance.is_finite() && self.distance > 0.0) {
            return Err(EngineError::invalid_program(
                self.id,
                format!("distance must be positive, but is {}", self.distance),
            ));
        }

        if self.horses.is_empty() {
            return Err(EngineError::invalid_program(self.id, "no horses assigned"));
        }

        let mut seen = HashSet::with_capacity(self.horses.len());
        for horse in self.horses.iter() {
            if !seen.insert(horse.id) {
                return Err(EngineError::invalid_program(
                    self.id,
                    format!("horse {} appears more than once", horse.id),
                ));
            }
            if !horse.condition_valid() {
                return Err(EngineError::invalid_program(
                    self.id,
                    format!(
                        "condition of horse {} must be in [1, 100], but is {}",
                        horse.id, horse.condition
                    ),
                ));
            }
        }

        Ok(())
    }

    pub fn get_horse(&self, horse_id: HorseId) -> Option<&Horse> {
        self.horses
            .iter()
            .find(|horse| horse.id == horse_id)
            .map(|horse| horse.as_ref())
    }
}

/// position_key returns the key of a horse in the engine's position map.
pub fn position_key(program_id: ProgramId, horse_id: HorseId) -> String {
    format!("{}-{}", program_id, horse_id)
}
