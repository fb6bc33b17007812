use approx::assert_relative_eq;
use horsesim::core::horse::Horse;
use horsesim::core::program::RaceProgram;
use horsesim::core::race_run::SimConstants;
use horsesim::core::speed_source::{FixedSpeedSource, SequenceSpeedSource, SpeedSource};
use horsesim::interfaces::command::Command;
use horsesim::{EngineError, RaceEngine};
use std::sync::Arc;

fn program(id: u32, distance: f64, conditions: &[u32]) -> RaceProgram {
    let horses = conditions
        .iter()
        .enumerate()
        .map(|(idx, &condition)| {
            let horse_id = id * 100 + idx as u32 + 1;
            Arc::new(Horse::new(
                horse_id,
                &format!("Horse {}", horse_id),
                "hsl(120, 70%, 50%)",
                condition,
            ))
        })
        .collect();
    RaceProgram::new(id, distance, horses)
}

fn engine_with(source: Box<dyn SpeedSource>, programs: Vec<RaceProgram>) -> RaceEngine {
    let mut engine = RaceEngine::new(SimConstants::default(), source).unwrap();
    engine.set_programs(programs).unwrap();
    engine
}

#[test]
fn single_fast_horse_finishes_within_cap() {
    let mut engine = engine_with(
        Box::new(FixedSpeedSource(1.0)),
        vec![program(1, 1200.0, &[100])],
    );
    engine.start_race_by_id(1).unwrap();

    // (1 + 2 * 1000 / 1200) % per tick needs 36 ticks to pass 95 %
    while engine.is_racing() {
        engine.advance_clock(100);
        assert!(engine.now_ms() <= 60_000);
    }

    let results = engine.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].program_id, 1);
    assert_eq!(results[0].result.len(), 1);
    assert_eq!(results[0].result[0].horse_id, 101);
    assert_eq!(results[0].result[0].position, 1);
    assert_eq!(results[0].result[0].finish_time_ms, Some(3600));
    assert!(engine.live_results().is_empty());
    assert!(!engine.is_armed(1));
}

#[test]
fn start_all_then_reset_all_clears_everything() {
    let mut engine = engine_with(
        Box::new(FixedSpeedSource(1.0)),
        vec![program(1, 1200.0, &[50, 60]), program(2, 1400.0, &[70, 80])],
    );

    engine.start_all_races();
    assert!(engine.running_programs().contains(&1));
    assert!(engine.running_programs().contains(&2));
    assert!(engine.is_racing());

    engine.advance_clock(500);
    engine.toggle_pause();
    assert_eq!(engine.live_results().len(), 2);

    engine.reset_all_races();
    assert!(engine.running_programs().is_empty());
    assert!(engine.live_results().is_empty());
    assert!(engine.results().is_empty());
    assert!(!engine.is_paused());
    assert!(!engine.is_racing());
    assert!(!engine.is_armed(1));
    assert!(!engine.is_armed(2));
    assert!(engine.horse_positions().values().all(|&p| p == 0.0));
}

#[test]
fn pause_freezes_and_resumes_all_programs() {
    let mut engine = engine_with(
        Box::new(FixedSpeedSource(1.0)),
        vec![program(1, 2000.0, &[30, 40]), program(2, 2400.0, &[50])],
    );
    engine.start_all_races();
    engine.advance_clock(1000);

    engine.toggle_pause();
    assert!(engine.is_paused());
    let frozen = engine.horse_positions().clone();
    let racetime = engine.race_run(1).map(|run| run.racetime_ms());
    assert!(frozen.values().all(|&p| p > 0.0));

    engine.advance_clock(5000);
    assert_eq!(engine.horse_positions(), &frozen);
    assert_eq!(engine.race_run(1).map(|run| run.racetime_ms()), racetime);
    assert!(engine.is_armed(1) && engine.is_armed(2));

    engine.toggle_pause();
    engine.advance_clock(100);
    for (key, &position) in engine.horse_positions().iter() {
        assert!(position > frozen[key], "{} did not move after resume", key);
    }
}

#[test]
fn unknown_program_is_reported_as_not_found() {
    let mut engine = engine_with(
        Box::new(FixedSpeedSource(1.0)),
        vec![program(1, 1200.0, &[50])],
    );

    assert_eq!(
        engine.program(42).unwrap_err(),
        EngineError::ProgramNotFound(42)
    );
    assert_eq!(
        engine.start_race_by_id(42),
        Err(EngineError::ProgramNotFound(42))
    );
    assert!(engine.running_programs().is_empty());
}

#[test]
fn trajectory_follows_injected_jitter() {
    let mut engine = engine_with(
        Box::new(SequenceSpeedSource::new(vec![0.5, 1.5])),
        vec![program(1, 1000.0, &[50])],
    );
    engine.start_race_by_id(1).unwrap();

    // base speed (1 + 50 / 100 * 2) = 2 % per tick
    let expected = [1.0, 4.0, 5.0, 8.0];
    for &position in expected.iter() {
        engine.advance_clock(100);
        assert_relative_eq!(engine.horse_position(1, 101).unwrap(), position);
    }
}

#[test]
fn repeated_commands_are_idempotent() {
    let mut engine = engine_with(
        Box::new(FixedSpeedSource(1.0)),
        vec![program(1, 1200.0, &[50]), program(2, 1200.0, &[50])],
    );

    // resetting an idle program changes nothing
    engine.reset_race(1);
    assert!(engine.running_programs().is_empty());

    engine.handle(Command::StartRace(1)).unwrap();
    engine.advance_clock(300);
    let position = engine.horse_position(1, 101);
    engine.handle(Command::StartRace(1)).unwrap();
    assert_eq!(engine.horse_position(1, 101), position);
    assert_eq!(engine.running_programs().len(), 1);

    engine.handle(Command::ResetRace(1)).unwrap();
    engine.handle(Command::ResetRace(1)).unwrap();
    assert_eq!(engine.horse_position(1, 101), Some(0.0));
    assert!(!engine.is_racing());
}

#[test]
fn reset_during_race_allows_clean_restart() {
    let mut engine = engine_with(
        Box::new(FixedSpeedSource(1.0)),
        vec![program(1, 1200.0, &[100])],
    );
    engine.start_race_by_id(1).unwrap();
    engine.advance_clock(1000);
    engine.reset_race(1);

    engine.start_race_by_id(1).unwrap();
    while engine.is_racing() {
        engine.advance_clock(100);
    }
    // race time starts again from zero after the reset
    assert_eq!(engine.results()[0].result[0].finish_time_ms, Some(3600));
}
