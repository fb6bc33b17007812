use clap::Parser;
use horsesim::core::handle_races::{handle_races, run_to_completion};
use horsesim::core::horse::Horse;
use horsesim::core::program::RaceProgram;
use horsesim::core::race_run::SimConstants;
use horsesim::core::speed_source::RandomSpeedSource;
use horsesim::interfaces::command::Command;
use horsesim::post::race_result::{write_results_csv, FinalResult};
use horsesim::post::win_tally::WinTally;
use horsesim::pre::horse_supply::{HorseSupply, RandomHorseSupply, RosterSupply};
use horsesim::pre::program_builder::{build_programs, ProgramBuilderPars};
use horsesim::pre::read_sim_pars::{read_meeting_pars, MeetingPars};
use horsesim::pre::sim_opts::SimOpts;
use horsesim::RaceEngine;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Interval in which the leaders are logged in real-time mode.
const LEADER_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Derives an independent seed for every random component of a meeting.
fn sub_seed(seed: Option<u64>, run: u32, component: u64) -> Option<u64> {
    seed.map(|s| s.wrapping_add((run as u64) << 8).wrapping_add(component))
}

fn create_engine(consts: &SimConstants, seed: Option<u64>) -> anyhow::Result<RaceEngine> {
    let speed_source = match seed {
        Some(s) => RandomSpeedSource::from_seed(s),
        None => RandomSpeedSource::new(),
    };
    Ok(RaceEngine::new(consts.clone(), Box::new(speed_source))?)
}

fn create_programs(
    horses: &[Arc<Horse>],
    pars: &ProgramBuilderPars,
    seed: Option<u64>,
) -> Vec<RaceProgram> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    build_programs(horses, pars, &mut rng)
}

/// Runs one meeting on the virtual clock.
fn run_meeting(
    meeting_pars: &MeetingPars,
    horses: &[Arc<Horse>],
    seed: Option<u64>,
    run: u32,
) -> anyhow::Result<(Vec<RaceProgram>, Vec<FinalResult>)> {
    let programs = create_programs(horses, &meeting_pars.program_pars, sub_seed(seed, run, 1));
    let mut engine = create_engine(&meeting_pars.sim_consts, sub_seed(seed, run, 2))?;
    engine.set_programs(programs.clone())?;
    let results = run_to_completion(&mut engine);
    Ok((programs, results))
}

fn print_results(programs: &[RaceProgram], results: &[FinalResult]) {
    for result in results.iter() {
        let program = programs.iter().find(|p| p.id == result.program_id);
        result.print_standings(program);
    }
}

fn run_realtime(
    meeting_pars: &MeetingPars,
    horses: &[Arc<Horse>],
    seed: Option<u64>,
    realtime_factor: f64,
) -> anyhow::Result<(Vec<RaceProgram>, Vec<FinalResult>)> {
    let programs = create_programs(horses, &meeting_pars.program_pars, sub_seed(seed, 0, 1));
    if programs.is_empty() {
        anyhow::bail!("No race programs could be built, the meeting has no horses!");
    }
    let mut engine = create_engine(&meeting_pars.sim_consts, sub_seed(seed, 0, 2))?;
    engine.set_programs(programs.clone())?;

    // the worker thread becomes the single owner of the engine
    let (tx_cmd, rx_cmd) = flume::unbounded();
    let (tx_state, rx_state) = flume::unbounded();
    let worker = thread::spawn(move || handle_races(engine, &rx_cmd, &tx_state, realtime_factor));

    tx_cmd
        .send(Command::StartAllRaces)
        .map_err(|_| anyhow::anyhow!("Race loop stopped before the races were started!"))?;

    let mut t_last_log = Instant::now();
    let mut results = Vec::new();
    while let Ok(snapshot) = rx_state.recv() {
        if t_last_log.elapsed() >= LEADER_LOG_INTERVAL {
            for program_id in snapshot.running_programs.iter() {
                if let Some(leader) = snapshot.get_leader(*program_id) {
                    info!(
                        "t = {:.1}s, program {}: {} leads at {:.1}%",
                        snapshot.now_ms as f64 / 1000.0,
                        program_id,
                        leader.name,
                        leader.position
                    );
                }
            }
            t_last_log = Instant::now();
        }

        if snapshot.results.len() == programs.len() {
            results = snapshot.results;
            break;
        }
    }

    // the worker may already be gone if it failed, its error is reported below
    let _ = tx_cmd.send(Command::Shutdown);
    match worker.join() {
        Ok(worker_result) => {
            worker_result?;
        }
        Err(_) => anyhow::bail!("Race loop thread panicked!"),
    }

    Ok((programs, results))
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    // set up logging
    let level = if sim_opts.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // get meeting parameters
    let meeting_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        info!("Reading meeting parameters from {:?}", parfile_path);
        read_meeting_pars(parfile_path)?
    } else {
        info!("No parameter file provided, using default meeting parameters");
        MeetingPars::default()
    };

    // get horses
    let mut horse_supply: Box<dyn HorseSupply> = if let Some(roster_path) = &sim_opts.roster_path
    {
        info!("Reading horse roster from {:?}", roster_path);
        Box::new(RosterSupply::from_csv(roster_path)?)
    } else if let Some(horses) = &meeting_pars.horses {
        Box::new(RosterSupply::new(horses.clone()))
    } else {
        match sim_opts.seed {
            Some(s) => Box::new(RandomHorseSupply::from_seed(meeting_pars.no_horses, s)),
            None => Box::new(RandomHorseSupply::new(meeting_pars.no_horses)),
        }
    };
    let horses: Vec<Arc<Horse>> = horse_supply.horses().into_iter().map(Arc::new).collect();

    info!(
        "Simulating {} programs with up to {} of {} horses each",
        meeting_pars.program_pars.no_programs,
        meeting_pars.program_pars.horses_per_program,
        horses.len()
    );

    // EXECUTION -----------------------------------------------------------------------------------
    let t_start = Instant::now();

    let results = if sim_opts.realtime {
        info!(
            "Running races in real time (factor {})",
            sim_opts.realtime_factor
        );
        if sim_opts.no_sim_runs > 1 {
            warn!("Number of simulation runs is ignored in real-time mode");
        }
        let (programs, results) = run_realtime(
            &meeting_pars,
            &horses,
            sim_opts.seed,
            sim_opts.realtime_factor,
        )?;
        print_results(&programs, &results);
        results
    } else if sim_opts.no_sim_runs <= 1 {
        let (programs, results) = run_meeting(&meeting_pars, &horses, sim_opts.seed, 0)?;
        print_results(&programs, &results);
        results
    } else {
        info!("Running {} meetings in parallel", sim_opts.no_sim_runs);
        let meetings: Vec<Vec<FinalResult>> = (0..sim_opts.no_sim_runs)
            .into_par_iter()
            .map(|run| {
                run_meeting(&meeting_pars, &horses, sim_opts.seed, run).map(|(_, results)| results)
            })
            .collect::<anyhow::Result<Vec<Vec<FinalResult>>>>()?;

        let tally = meetings
            .par_iter()
            .map(|results| {
                let mut tally = WinTally::new();
                tally.add_meeting(results);
                tally
            })
            .reduce(WinTally::new, WinTally::merge);
        tally.print_tally();

        // only the last meeting is exported
        meetings.into_iter().last().unwrap_or_default()
    };

    info!("Execution time: {}ms", t_start.elapsed().as_millis());

    // POST-PROCESSING -----------------------------------------------------------------------------
    if let Some(output_path) = &sim_opts.output_path {
        write_results_csv(&results, output_path)?;
        info!("Results written to {:?}", output_path);
    }

    Ok(())
}
