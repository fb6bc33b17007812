use crate::core::horse::HorseId;
use crate::core::program::{position_key, ProgramId, RaceProgram};
use crate::core::race_run::{RaceRun, SimConstants};
use crate::core::scheduler::TickScheduler;
use crate::core::speed_source::{RandomSpeedSource, SpeedSource};
use crate::error::EngineError;
use crate::interfaces::command::Command;
use crate::interfaces::observer_interface::{EngineSnapshot, HorseState, RgbColor};
use crate::post::race_result::{FinalResult, LiveResult, ResultsStore};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// RaceEngine owns every active race run, the tick timers, the position map and the results
/// store. All mutations go through its methods; observers read snapshots.
pub struct RaceEngine {
    consts: SimConstants,
    programs: Vec<RaceProgram>,
    runs: HashMap<ProgramId, RaceRun>,
    scheduler: TickScheduler,
    horse_positions: BTreeMap<String, f64>,
    running_programs: BTreeSet<ProgramId>,
    is_racing: bool,
    is_paused: bool,
    store: ResultsStore,
    speed_source: Box<dyn SpeedSource>,
}

impl std::fmt::Debug for RaceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceEngine")
            .field("consts", &self.consts)
            .field("programs", &self.programs.len())
            .field("running_programs", &self.running_programs)
            .field("is_racing", &self.is_racing)
            .field("is_paused", &self.is_paused)
            .field("now_ms", &self.scheduler.now_ms())
            .finish()
    }
}

impl Default for RaceEngine {
    fn default() -> Self {
        RaceEngine::with_parts(SimConstants::default(), Box::new(RandomSpeedSource::new()))
    }
}

impl RaceEngine {
    pub fn new(
        consts: SimConstants,
        speed_source: Box<dyn SpeedSource>,
    ) -> Result<RaceEngine, EngineError> {
        consts.validate()?;
        Ok(RaceEngine::with_parts(consts, speed_source))
    }

    fn with_parts(consts: SimConstants, speed_source: Box<dyn SpeedSource>) -> RaceEngine {
        RaceEngine {
            consts,
            programs: Vec::new(),
            runs: HashMap::new(),
            scheduler: TickScheduler::new(),
            horse_positions: BTreeMap::new(),
            running_programs: BTreeSet::new(),
            is_racing: false,
            is_paused: false,
            store: ResultsStore::new(),
            speed_source,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // COMMANDS ------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// handle dispatches a command. Shutdown is meant for the driver owning the engine and does
    /// nothing here.
    pub fn handle(&mut self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::StartRace(program_id) => self.start_race_by_id(program_id),
            Command::ResetRace(program_id) => {
                self.reset_race(program_id);
                Ok(())
            }
            Command::StartAllRaces => {
                self.start_all_races();
                Ok(())
            }
            Command::ResetAllRaces => {
                self.reset_all_races();
                Ok(())
            }
            Command::TogglePause => {
                self.toggle_pause();
                Ok(())
            }
            Command::SetPaused(paused) => {
                self.set_paused(paused);
                Ok(())
            }
            Command::SetPrograms(programs) => self.set_programs(programs),
            Command::Shutdown => Ok(()),
        }
    }

    /// set_programs installs the programs of a new meeting. Races and results of the previous
    /// meeting are reset first.
    pub fn set_programs(&mut self, programs: Vec<RaceProgram>) -> Result<(), EngineError> {
        let mut ids = HashSet::with_capacity(programs.len());
        for program in programs.iter() {
            program.validate()?;
            if !ids.insert(program.id) {
                return Err(EngineError::invalid_program(
                    program.id,
                    "program id is used more than once",
                ));
            }
        }

        self.reset_all_races();
        self.horse_positions.clear();
        info!("Installed {} race programs", programs.len());
        self.programs = programs;
        Ok(())
    }

    /// start_race starts the race of the given program. Starting a program that is already
    /// running is ignored.
    pub fn start_race(&mut self, program: &RaceProgram) -> Result<(), EngineError> {
        if self.running_programs.contains(&program.id) {
            debug!("Program {} is already running, start ignored", program.id);
            return Ok(());
        }
        program.validate()?;
        self.launch_run(program);
        Ok(())
    }

    pub fn start_race_by_id(&mut self, program_id: ProgramId) -> Result<(), EngineError> {
        let program = self.program(program_id)?.clone();
        self.start_race(&program)
    }

    pub fn start_all_races(&mut self) {
        let programs = self.programs.clone();
        for program in programs.iter() {
            if self.running_programs.contains(&program.id) {
                debug!("Program {} is already running, start ignored", program.id);
                continue;
            }
            // installed programs were validated by set_programs
            self.launch_run(program);
        }
    }

    fn launch_run(&mut self, program: &RaceProgram) {
        for horse in program.horses.iter() {
            self.horse_positions
                .insert(position_key(program.id, horse.id), 0.0);
        }
        self.runs.insert(program.id, RaceRun::new(program));
        self.running_programs.insert(program.id);
        self.is_racing = true;
        self.scheduler
            .arm(program.id, self.consts.tick_interval_ms);

        info!(
            "Started program {} ({:.0}m, {} horses)",
            program.id,
            program.distance,
            program.horses.len()
        );
    }

    /// reset_race cancels the race of the program and discards its positions and results.
    /// Resetting an idle program without results does nothing.
    pub fn reset_race(&mut self, program_id: ProgramId) {
        let cancelled = self.scheduler.cancel(program_id);
        let had_run = self.runs.remove(&program_id).is_some();
        self.running_programs.remove(&program_id);
        if self.running_programs.is_empty() {
            self.is_racing = false;
        }

        // reset recorded positions, programs that never ran have none
        let prefix = format!("{}-", program_id);
        for (_, position) in self
            .horse_positions
            .iter_mut()
            .filter(|(key, _)| key.starts_with(&prefix))
        {
            *position = 0.0;
        }

        let had_live = self.store.remove_live_result(program_id);
        let had_result = self.store.remove_result(program_id);

        if cancelled || had_run || had_live || had_result {
            info!("Reset program {}", program_id);
        } else {
            debug!("Program {} is idle, reset ignored", program_id);
        }
    }

    /// reset_all_races resets every program, clears all results and unpauses.
    pub fn reset_all_races(&mut self) {
        let mut program_ids: BTreeSet<ProgramId> =
            self.programs.iter().map(|program| program.id).collect();
        program_ids.extend(self.running_programs.iter().copied());

        for program_id in program_ids {
            self.reset_race(program_id);
        }

        self.scheduler.cancel_all();
        self.runs.clear();
        self.running_programs.clear();
        self.is_racing = false;
        self.is_paused = false;
        self.store.clear_all_results();
        self.store.clear_live_results();
        info!("Reset all races");
    }

    pub fn toggle_pause(&mut self) {
        self.set_paused(!self.is_paused);
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.is_paused != paused {
            info!("Races {}", if paused { "paused" } else { "resumed" });
        }
        self.is_paused = paused;
    }

    // ---------------------------------------------------------------------------------------------
    // CLOCK ---------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// advance_clock moves the virtual clock forward and fires every tick that falls due. The clock
    /// stops at u64::MAX. While paused the due ticks would do nothing, so they are skipped at once.
    pub fn advance_clock(&mut self, delta_ms: u64) {
        let target_ms = self.scheduler.now_ms().saturating_add(delta_ms);
        if self.is_paused {
            self.scheduler.skip_to(target_ms);
            self.scheduler.advance_to(target_ms);
            return;
        }
        while let Some(program_id) = self.scheduler.pop_due(target_ms) {
            self.tick_program(program_id);
        }
        self.scheduler.advance_to(target_ms);
    }

    /// tick_program is the timer handler of one program. While paused the timer keeps firing but
    /// the handler does nothing.
    pub fn tick_program(&mut self, program_id: ProgramId) {
        if self.is_paused {
            return;
        }
        let run = match self.runs.get_mut(&program_id) {
            Some(run) => run,
            None => return,
        };

        let finished_now = run.simulate_tick(&self.consts, self.speed_source.as_mut());

        for entry in run.entries() {
            self.horse_positions
                .insert(position_key(program_id, entry.horse_id), entry.position);
        }
        for horse_id in finished_now {
            debug!(
                "Program {}: horse {} finished after {:.1}s",
                program_id,
                horse_id,
                run.racetime_ms() as f64 / 1000.0
            );
        }

        self.store.update_live_result(run.live_result());

        if run.is_complete(&self.consts) {
            self.complete_race(program_id);
        }
    }

    fn complete_race(&mut self, program_id: ProgramId) {
        self.scheduler.cancel(program_id);
        let run = match self.runs.remove(&program_id) {
            Some(run) => run,
            None => return,
        };
        self.running_programs.remove(&program_id);
        if self.running_programs.is_empty() {
            self.is_racing = false;
        }

        if !run.get_all_finished() {
            warn!(
                "Program {} hit the time cap of {}ms, unfinished horses ranked by position",
                program_id, self.consts.max_race_time_ms
            );
        }

        let result = run.final_result();
        info!(
            "Program {} finished after {:.1}s, winner is horse {}",
            program_id,
            run.racetime_ms() as f64 / 1000.0,
            result
                .get_winner()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_owned())
        );

        self.store.remove_live_result(program_id);
        self.store.add_result(result);
    }

    // ---------------------------------------------------------------------------------------------
    // QUERIES -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn consts(&self) -> &SimConstants {
        &self.consts
    }

    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    pub fn programs(&self) -> &[RaceProgram] {
        &self.programs
    }

    /// program looks up an installed program.
    pub fn program(&self, program_id: ProgramId) -> Result<&RaceProgram, EngineError> {
        self.programs
            .iter()
            .find(|program| program.id == program_id)
            .ok_or(EngineError::ProgramNotFound(program_id))
    }

    pub fn horse_positions(&self) -> &BTreeMap<String, f64> {
        &self.horse_positions
    }

    pub fn horse_position(&self, program_id: ProgramId, horse_id: HorseId) -> Option<f64> {
        self.horse_positions
            .get(&position_key(program_id, horse_id))
            .copied()
    }

    pub fn running_programs(&self) -> &BTreeSet<ProgramId> {
        &self.running_programs
    }

    pub fn is_racing(&self) -> bool {
        self.is_racing
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn results(&self) -> &[FinalResult] {
        self.store.results()
    }

    pub fn live_results(&self) -> &[LiveResult] {
        self.store.live_results()
    }

    pub fn results_store(&self) -> &ResultsStore {
        &self.store
    }

    pub fn race_run(&self, program_id: ProgramId) -> Option<&RaceRun> {
        self.runs.get(&program_id)
    }

    pub fn is_armed(&self, program_id: ProgramId) -> bool {
        self.scheduler.is_armed(program_id)
    }

    /// leader returns the horse furthest along in a running program.
    pub fn leader(&self, program_id: ProgramId) -> Option<HorseId> {
        self.runs.get(&program_id).and_then(|run| run.get_leader())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let mut horse_states = Vec::new();
        for program_id in self.running_programs.iter() {
            let run = match self.runs.get(program_id) {
                Some(run) => run,
                None => continue,
            };
            for entry in run.entries() {
                let horse = run.program.get_horse(entry.horse_id);
                horse_states.push(HorseState {
                    program_id: *program_id,
                    horse_id: entry.horse_id,
                    name: horse.map(|h| h.name.to_owned()).unwrap_or_default(),
                    color: horse
                        .map(|h| RgbColor::parse(&h.color))
                        .unwrap_or(RgbColor::GREY),
                    position: entry.position,
                    is_finished: entry.finished,
                });
            }
        }

        EngineSnapshot {
            now_ms: self.scheduler.now_ms(),
            is_racing: self.is_racing,
            is_paused: self.is_paused,
            running_programs: self.running_programs.clone(),
            horse_positions: self.horse_positions.clone(),
            horse_states,
            live_results: self.store.live_results().to_vec(),
            results: self.store.results().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::horse::Horse;
    use crate::core::speed_source::FixedSpeedSource;
    use std::sync::Arc;

    fn horse(id: HorseId, condition: u32) -> Arc<Horse> {
        Arc::new(Horse::new(id, &format!("Horse {}", id), "#336699", condition))
    }

    fn engine(jitter: f64) -> RaceEngine {
        RaceEngine::new(SimConstants::default(), Box::new(FixedSpeedSource(jitter))).unwrap()
    }

    #[test]
    fn start_race_arms_timer_and_sets_racing() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(1, 1200.0, vec![horse(1, 80), horse(2, 70)]);

        engine.start_race(&program).unwrap();

        assert!(engine.is_racing());
        assert!(engine.running_programs().contains(&1));
        assert!(engine.is_armed(1));
        assert_eq!(engine.horse_position(1, 1), Some(0.0));
        assert!(engine.live_results().is_empty());
    }

    #[test]
    fn duplicate_start_is_ignored() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(1, 1000.0, vec![horse(1, 100)]);

        engine.start_race(&program).unwrap();
        engine.advance_clock(300);
        engine.start_race(&program).unwrap();

        let run = engine.race_run(1).unwrap();
        assert_eq!(run.racetime_ms(), 300);
        assert_eq!(engine.running_programs().len(), 1);
    }

    #[test]
    fn invalid_program_is_rejected() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(1, -5.0, vec![horse(1, 100)]);
        assert!(engine.start_race(&program).is_err());
        assert!(!engine.is_racing());
    }

    #[test]
    fn tick_publishes_live_result_and_positions() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(1, 1000.0, vec![horse(1, 50), horse(2, 100)]);
        engine.start_race(&program).unwrap();

        engine.advance_clock(100);

        assert_eq!(engine.horse_position(1, 1), Some(2.0));
        assert_eq!(engine.horse_position(1, 2), Some(3.0));
        assert_eq!(engine.live_results().len(), 1);
        let live = &engine.live_results()[0];
        assert_eq!(live.result[0].horse_id, 2);
        assert_eq!(engine.leader(1), Some(2));
    }

    #[test]
    fn completed_race_moves_live_to_final() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(1, 1000.0, vec![horse(1, 100), horse(2, 50)]);
        engine.start_race(&program).unwrap();

        // horse 2 needs 48 ticks at 2% per tick
        engine.advance_clock(4800);

        assert!(!engine.is_racing());
        assert!(engine.running_programs().is_empty());
        assert!(!engine.is_armed(1));
        assert!(engine.race_run(1).is_none());
        assert!(engine.live_results().is_empty());
        let result = engine.results_store().result_for(1).unwrap();
        assert_eq!(result.get_winner(), Some(1));
        assert_eq!(result.result[0].finish_time_ms, Some(3200));
        assert_eq!(result.result[1].finish_time_ms, Some(4800));
        // positions survive completion
        assert_eq!(engine.horse_position(1, 2), Some(96.0));
    }

    #[test]
    fn pause_freezes_positions_and_racetime() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(1, 1000.0, vec![horse(1, 100)]);
        engine.start_race(&program).unwrap();
        engine.advance_clock(500);

        engine.toggle_pause();
        let position = engine.horse_position(1, 1);
        engine.advance_clock(5000);
        assert_eq!(engine.horse_position(1, 1), position);
        assert_eq!(engine.race_run(1).unwrap().racetime_ms(), 500);
        assert!(engine.running_programs().contains(&1));
        assert!(engine.is_armed(1));

        engine.toggle_pause();
        engine.advance_clock(100);
        assert_eq!(engine.race_run(1).unwrap().racetime_ms(), 600);
    }

    #[test]
    fn reset_race_clears_everything_for_program() {
        let mut engine = engine(1.0);
        let programs = vec![
            RaceProgram::new(1, 1000.0, vec![horse(1, 100)]),
            RaceProgram::new(2, 1000.0, vec![horse(2, 100)]),
        ];
        engine.set_programs(programs).unwrap();
        engine.start_all_races();
        engine.advance_clock(300);

        engine.reset_race(1);

        assert!(!engine.running_programs().contains(&1));
        assert!(engine.running_programs().contains(&2));
        assert!(engine.is_racing());
        assert!(!engine.is_armed(1));
        assert_eq!(engine.horse_position(1, 1), Some(0.0));
        assert!(engine.results_store().live_result_for(1).is_none());
        assert!(engine.results_store().live_result_for(2).is_some());

        engine.reset_race(2);
        assert!(!engine.is_racing());
    }

    #[test]
    fn reset_of_idle_program_is_noop() {
        let mut engine = engine(1.0);
        engine.reset_race(42);
        assert!(!engine.is_racing());
        assert!(engine.horse_positions().is_empty());
        assert!(engine.results().is_empty());
    }

    #[test]
    fn reset_of_installed_but_unstarted_program_is_noop() {
        let mut engine = engine(1.0);
        engine
            .set_programs(vec![RaceProgram::new(1, 1000.0, vec![horse(7, 50)])])
            .unwrap();
        let positions_before = engine.horse_positions().clone();

        engine.reset_race(1);

        assert_eq!(engine.horse_positions(), &positions_before);
        assert!(engine.horse_positions().is_empty());
        assert!(!engine.is_racing());
        assert!(engine.live_results().is_empty());
    }

    #[test]
    fn huge_clock_steps_saturate() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(1, 1000.0, vec![horse(1, 50), horse(2, 80)]);
        engine.start_race(&program).unwrap();

        engine.advance_clock(10);
        engine.advance_clock(u64::MAX);
        engine.advance_clock(u64::MAX);

        assert_eq!(engine.now_ms(), u64::MAX);
        assert!(!engine.is_racing());
        assert_eq!(engine.results().len(), 1);
        assert_eq!(engine.results()[0].result.len(), 2);
    }

    #[test]
    fn huge_clock_steps_while_paused_keep_race_frozen() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(1, 1000.0, vec![horse(1, 50)]);
        engine.start_race(&program).unwrap();
        engine.advance_clock(300);
        engine.set_paused(true);
        let frozen = engine.horse_position(1, 1);

        engine.advance_clock(u64::MAX);
        engine.advance_clock(u64::MAX);

        assert_eq!(engine.horse_position(1, 1), frozen);
        assert!(engine.is_racing());
        assert!(engine.is_armed(1));
        assert_eq!(engine.race_run(1).map(|run| run.racetime_ms()), Some(300));

        engine.set_paused(false);
        engine.advance_clock(u64::MAX);
        assert!(!engine.is_racing());
        assert_eq!(engine.results().len(), 1);
    }

    #[test]
    fn rerun_replaces_final_result() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(1, 1000.0, vec![horse(1, 100)]);

        engine.start_race(&program).unwrap();
        engine.advance_clock(10_000);
        engine.start_race(&program).unwrap();
        engine.advance_clock(10_000);

        assert_eq!(engine.results().len(), 1);
    }

    #[test]
    fn unknown_program_lookup_fails() {
        let mut engine = engine(1.0);
        assert_eq!(
            engine.program(999).unwrap_err(),
            EngineError::ProgramNotFound(999)
        );
        assert_eq!(
            engine.handle(Command::StartRace(999)),
            Err(EngineError::ProgramNotFound(999))
        );
    }

    #[test]
    fn set_programs_rejects_duplicate_ids() {
        let mut engine = engine(1.0);
        let programs = vec![
            RaceProgram::new(1, 1000.0, vec![horse(1, 100)]),
            RaceProgram::new(1, 1200.0, vec![horse(2, 100)]),
        ];
        assert!(engine.set_programs(programs).is_err());
        assert!(engine.programs().is_empty());
    }

    #[test]
    fn commands_drive_the_engine() {
        let mut engine = engine(1.0);
        let programs = vec![RaceProgram::new(1, 1000.0, vec![horse(1, 100)])];
        engine.handle(Command::SetPrograms(programs)).unwrap();
        engine.handle(Command::StartAllRaces).unwrap();
        engine.handle(Command::SetPaused(true)).unwrap();
        assert!(engine.is_paused());
        engine.handle(Command::TogglePause).unwrap();
        assert!(!engine.is_paused());
        engine.handle(Command::ResetRace(1)).unwrap();
        assert!(!engine.is_racing());
        engine.handle(Command::StartRace(1)).unwrap();
        engine.handle(Command::ResetAllRaces).unwrap();
        assert!(engine.running_programs().is_empty());
        engine.handle(Command::Shutdown).unwrap();
    }

    #[test]
    fn snapshot_reflects_running_horses() {
        let mut engine = engine(1.0);
        let program = RaceProgram::new(3, 1000.0, vec![horse(1, 100), horse(2, 50)]);
        engine.start_race(&program).unwrap();
        engine.advance_clock(200);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.now_ms, 200);
        assert!(snapshot.is_racing);
        assert_eq!(snapshot.horse_states.len(), 2);
        assert_eq!(snapshot.horse_states[0].name, "Horse 1");
        assert_eq!(snapshot.horse_states[0].color, RgbColor { r: 0x33, g: 0x66, b: 0x99 });
        assert_eq!(snapshot.get_leader(3).map(|s| s.horse_id), Some(1));
        assert_eq!(snapshot.horse_positions.get("3-2"), Some(&4.0));
    }

    #[test]
    fn invalid_constants_are_rejected() {
        let consts = SimConstants {
            finish_threshold: 120.0,
            ..SimConstants::default()
        };
        assert!(RaceEngine::new(consts, Box::new(FixedSpeedSource(1.0))).is_err());
    }
}
