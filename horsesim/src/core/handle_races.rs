use crate::core::engine::RaceEngine;
use crate::error::EngineError;
use crate::interfaces::command::Command;
use crate::interfaces::observer_interface::{EngineSnapshot, MAX_SNAPSHOT_FREQUENCY};
use crate::post::race_result::FinalResult;
use anyhow::Context;
use flume::{Receiver, Sender, TryRecvError};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// run_to_completion starts all installed programs and steps the virtual clock tick by tick until
/// no race is running anymore. Returns the final results of the meeting.
pub fn run_to_completion(engine: &mut RaceEngine) -> Vec<FinalResult> {
    engine.set_paused(false);
    engine.start_all_races();

    let tick_interval_ms = engine.consts().tick_interval_ms;
    while engine.is_racing() {
        engine.advance_clock(tick_interval_ms);
    }

    engine.results().to_vec()
}

/// checked_realtime_factor falls back to 1.0 for factors that are not positive and finite.
fn checked_realtime_factor(realtime_factor: f64) -> f64 {
    if realtime_factor.is_finite() && realtime_factor > 0.0 {
        realtime_factor
    } else {
        warn!(
            "Real-time factor must be positive and finite, but is {}, using 1.0",
            realtime_factor
        );
        1.0
    }
}

/// handle_races runs the engine in real time. The calling thread becomes the single owner of the
/// engine: commands arrive through `rx`, snapshots leave through `tx`. The loop ends on
/// Command::Shutdown or when all command senders are dropped, and hands the engine back.
pub fn handle_races(
    mut engine: RaceEngine,
    rx: &Receiver<Command>,
    tx: &Sender<EngineSnapshot>,
    realtime_factor: f64,
) -> anyhow::Result<RaceEngine> {
    let t_loop = Duration::from_secs_f64(1.0 / MAX_SNAPSHOT_FREQUENCY);
    let realtime_factor = checked_realtime_factor(realtime_factor);

    let mut t_prev = Instant::now();
    let mut carry_ms = 0.0;

    loop {
        let t_start = Instant::now();

        // apply all pending commands
        loop {
            match rx.try_recv() {
                Ok(Command::Shutdown) => {
                    info!("Shutdown requested, stopping race loop");
                    return Ok(engine);
                }
                Ok(command) => {
                    debug!("Handling command {:?}", command);
                    if let Err(e) = engine.handle(command) {
                        warn!("Command rejected: {}", e);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Command channel closed, stopping race loop");
                    return Ok(engine);
                }
            }
        }

        // advance the virtual clock by the scaled wall time since the last iteration
        carry_ms += (t_start - t_prev).as_secs_f64() * 1000.0 * realtime_factor;
        t_prev = t_start;
        let delta_ms = carry_ms.floor();
        carry_ms -= delta_ms;
        engine.advance_clock(delta_ms as u64);

        // send current engine state
        tx.send(engine.snapshot())
            .map_err(|_| EngineError::ChannelClosed)
            .context("Failed to send engine snapshot to observer!")?;

        // sleep until the loop period is finished in real time as well
        match t_loop.checked_sub(t_start.elapsed()) {
            Some(t_sleep) => sleep(t_sleep),
            None => warn!("Could not keep up with real-time!"),
        }
    }
}
