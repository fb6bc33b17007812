use crate::core::horse::Horse;
use crate::core::program::{ProgramId, RaceProgram};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;

/// * `no_programs` - Number of race programs per meeting
/// * `horses_per_program` - Number of horses drawn for each program
/// * `base_distance` - (m) Distance of the first program
/// * `distance_step` - (m) Distance increase from one program to the next
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProgramBuilderPars {
    pub no_programs: u32,
    pub horses_per_program: usize,
    pub base_distance: f64,
    pub distance_step: f64,
}

impl Default for ProgramBuilderPars {
    fn default() -> Self {
        ProgramBuilderPars {
            no_programs: 6,
            horses_per_program: 10,
            base_distance: 1200.0,
            distance_step: 200.0,
        }
    }
}

/// build_programs partitions the available horses into race programs. Program i (1-based) runs
/// over base_distance + (i - 1) * distance_step and gets a random subset of the horses. No
/// programs are built if no horses are available.
pub fn build_programs<R: Rng + ?Sized>(
    horses: &[Arc<Horse>],
    pars: &ProgramBuilderPars,
    rng: &mut R,
) -> Vec<RaceProgram> {
    if horses.is_empty() {
        return Vec::new();
    }

    let no_horses = pars.horses_per_program.clamp(1, horses.len());

    (0..pars.no_programs)
        .map(|idx| {
            let mut field: Vec<Arc<Horse>> = horses.to_vec();
            field.shuffle(rng);
            field.truncate(no_horses);

            RaceProgram::new(
                idx as ProgramId + 1,
                pars.base_distance + idx as f64 * pars.distance_step,
                field,
            )
        })
        .collect()
}
