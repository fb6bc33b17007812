use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "horsesim",
    about = "A tick-driven horse race simulator running concurrent race programs"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    /// Run the races in real time on a worker thread and follow them live
    #[clap(short, long)]
    pub realtime: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set path to the meeting parameter file (JSON), defaults are used if not set
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set path to a horse roster (CSV with id,name,color,condition), horses are generated if not
    /// set
    #[clap(long)]
    pub roster_path: Option<PathBuf>,

    /// Set seed for horse generation, program building and race jitter
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Set number of simulated meetings (only for headless mode, ignored in real-time mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set real-time factor (only relevant in real-time mode)
    #[clap(short = 'f', long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set path of a CSV file the final results are written to
    #[clap(short, long)]
    pub output_path: Option<PathBuf>,
}
