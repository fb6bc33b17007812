use crate::core::horse::HorseId;
use crate::core::program::{ProgramId, RaceProgram};
use crate::core::speed_source::SpeedSource;
use crate::error::EngineError;
use crate::post::race_result::{FinalResult, LivePlacing, LiveResult, Placing};
use helpers::general::{argmax, argsort, SortOrder};
use serde::{Deserialize, Serialize};

/// Simulation constants. The defaults reproduce the reference race behaviour and change the
/// distribution of race outcomes when modified.
///
/// * `tick_interval_ms` - (ms) Simulated time per tick
/// * `finish_threshold` - (%) Track position at which a horse crosses the line
/// * `max_race_time_ms` - (ms) Unpaused race time after which a race is force-completed
/// * `jitter_min` - Lower bound of the per-tick speed jitter
/// * `jitter_max` - Upper bound (exclusive) of the per-tick speed jitter
/// * `distance_reference_m` - (m) Distance at which the distance factor is 1.0
/// * `condition_weight` - Weight of the condition in the base speed
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimConstants {
    pub tick_interval_ms: u64,
    pub finish_threshold: f64,
    pub max_race_time_ms: u64,
    pub jitter_min: f64,
    pub jitter_max: f64,
    pub distance_reference_m: f64,
    pub condition_weight: f64,
}

impl Default for SimConstants {
    fn default() -> Self {
        SimConstants {
            tick_interval_ms: 100,
            finish_threshold: 95.0,
            max_race_time_ms: 60_000,
            jitter_min: 0.5,
            jitter_max: 1.5,
            distance_reference_m: 1000.0,
            condition_weight: 2.0,
        }
    }
}

impl SimConstants {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.tick_interval_ms == 0 {
            return Err(EngineError::InvalidConstants(
                "tick_interval_ms must be positive".to_owned(),
            ));
        }
        if !(self.finish_threshold > 0.0 && self.finish_threshold <= 100.0) {
            return Err(EngineError::InvalidConstants(format!(
                "finish_threshold must be in ]0, 100], but is {}",
                self.finish_threshold
            )));
        }
        if self.max_race_time_ms == 0 {
            return Err(EngineError::InvalidConstants(
                "max_race_time_ms must be positive".to_owned(),
            ));
        }
        if !(self.jitter_min >= 0.0 && self.jitter_min < self.jitter_max) {
            return Err(EngineError::InvalidConstants(format!(
                "jitter range [{}, {}[ is empty or negative",
                self.jitter_min, self.jitter_max
            )));
        }
        if !(self.distance_reference_m > 0.0 && self.condition_weight >= 0.0) {
            return Err(EngineError::InvalidConstants(
                "distance_reference_m must be positive and condition_weight non-negative"
                    .to_owned(),
            ));
        }
        Ok(())
    }
}

/// calc_base_speed returns the speed (% of track per tick) before jitter is applied.
pub fn calc_base_speed(condition: u32, distance: f64, consts: &SimConstants) -> f64 {
    let distance_factor = consts.distance_reference_m / distance;
    1.0 + (condition as f64 / 100.0) * consts.condition_weight * distance_factor
}

/// HorseRunState tracks the progress of one horse within a race run.
///
/// * `position` - (%) Track position in [0, 100]
/// * `finish_time_ms` - (ms) Race time at which the horse crossed the line
/// * `finish_rank` - Order in which the horse crossed the line (1-based)
#[derive(Debug, Clone, PartialEq)]
pub struct HorseRunState {
    pub horse_id: HorseId,
    pub condition: u32,
    pub position: f64,
    pub finished: bool,
    pub finish_time_ms: Option<u64>,
    pub finish_rank: Option<u32>,
}

/// RaceRun is the state of one active program. It is created when the race starts and dropped
/// when the race completes or is reset.
#[derive(Debug, Clone)]
pub struct RaceRun {
    pub program: RaceProgram,
    entries: Vec<HorseRunState>,
    racetime_ms: u64,
    next_rank: u32,
}

impl RaceRun {
    pub fn new(program: &RaceProgram) -> RaceRun {
        let entries = program
            .horses
            .iter()
            .map(|horse| HorseRunState {
                horse_id: horse.id,
                condition: horse.condition,
                position: 0.0,
                finished: false,
                finish_time_ms: None,
                finish_rank: None,
            })
            .collect();

        RaceRun {
            program: program.clone(),
            entries,
            racetime_ms: 0,
            next_rank: 1,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// simulate_tick advances every unfinished horse by one tick and returns the ids of the horses
    /// that crossed the line during this tick (in program order).
    pub fn simulate_tick(
        &mut self,
        consts: &SimConstants,
        speed_source: &mut dyn SpeedSource,
    ) -> Vec<HorseId> {
        // increment discretization variable
        self.racetime_ms += consts.tick_interval_ms;

        let mut finished_now = Vec::new();

        for entry in self.entries.iter_mut().filter(|entry| !entry.finished) {
            let speed = calc_base_speed(entry.condition, self.program.distance, consts)
                * speed_source.jitter(consts.jitter_min, consts.jitter_max);

            entry.position = (entry.position + speed).clamp(0.0, 100.0);

            if entry.position >= consts.finish_threshold {
                entry.finished = true;
                entry.finish_time_ms = Some(self.racetime_ms);
                entry.finish_rank = Some(self.next_rank);
                self.next_rank += 1;
                finished_now.push(entry.horse_id);
            }
        }

        finished_now
    }

    // ---------------------------------------------------------------------------------------------
    // RESULTS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// get_standings_order returns entry indices ranked by: finished before unfinished, finished
    /// horses by finish rank, unfinished horses by descending position, remaining ties by program
    /// order.
    fn get_standings_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len())
            .filter(|&i| self.entries[i].finished)
            .collect();
        order.sort_by_key(|&i| self.entries[i].finish_rank);

        let unfinished: Vec<usize> = (0..self.entries.len())
            .filter(|&i| !self.entries[i].finished)
            .collect();
        let positions: Vec<f64> = unfinished
            .iter()
            .map(|&i| self.entries[i].position)
            .collect();

        order.extend(
            argsort(&positions, SortOrder::Descending)
                .into_iter()
                .map(|j| unfinished[j]),
        );
        order
    }

    pub fn live_result(&self) -> LiveResult {
        let result = self
            .get_standings_order()
            .into_iter()
            .enumerate()
            .map(|(rank, i)| LivePlacing {
                horse_id: self.entries[i].horse_id,
                position: rank as u32 + 1,
                is_finished: self.entries[i].finished,
            })
            .collect();

        LiveResult {
            program_id: self.program.id,
            result,
            is_live: true,
        }
    }

    pub fn final_result(&self) -> FinalResult {
        let result = self
            .get_standings_order()
            .into_iter()
            .enumerate()
            .map(|(rank, i)| Placing {
                horse_id: self.entries[i].horse_id,
                position: rank as u32 + 1,
                finish_time_ms: self.entries[i].finish_time_ms,
            })
            .collect();

        FinalResult {
            program_id: self.program.id,
            result,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // GETTERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn get_all_finished(&self) -> bool {
        self.entries.iter().all(|entry| entry.finished)
    }

    /// is_complete checks if every horse finished or the race exceeded the time cap.
    pub fn is_complete(&self, consts: &SimConstants) -> bool {
        self.get_all_finished() || self.racetime_ms > consts.max_race_time_ms
    }

    /// get_leader returns the horse furthest along the track.
    pub fn get_leader(&self) -> Option<HorseId> {
        let positions: Vec<f64> = self.entries.iter().map(|entry| entry.position).collect();
        argmax(&positions).map(|idx| self.entries[idx].horse_id)
    }

    pub fn program_id(&self) -> ProgramId {
        self.program.id
    }

    pub fn racetime_ms(&self) -> u64 {
        self.racetime_ms
    }

    pub fn entries(&self) -> &[HorseRunState] {
        &self.entries
    }

    pub fn get_entry(&self, horse_id: HorseId) -> Option<&HorseRunState> {
        self.entries.iter().find(|entry| entry.horse_id == horse_id)
    }
}
