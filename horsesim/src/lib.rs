//! Horse race simulation engine.
//!
//! A race meeting consists of several race programs. Every program is raced by its own
//! independently armed tick timer; all timers share one virtual clock that is advanced either
//! manually (tests, headless runs) or from wall-clock time by the real-time driver in
//! [`core::handle_races`].

pub mod error;

pub mod core {
    pub mod engine;
    pub mod handle_races;
    pub mod horse;
    pub mod program;
    pub mod race_run;
    pub mod scheduler;
    pub mod speed_source;
}

pub mod interfaces {
    pub mod command;
    pub mod observer_interface;
}

pub mod post {
    pub mod race_result;
    pub mod win_tally;
}

pub mod pre {
    pub mod horse_supply;
    pub mod program_builder;
    pub mod read_sim_pars;
    pub mod sim_opts;
}

pub use crate::core::engine::RaceEngine;
pub use crate::error::EngineError;
