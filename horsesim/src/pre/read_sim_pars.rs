use crate::core::horse::Horse;
use crate::core::race_run::SimConstants;
use crate::pre::program_builder::ProgramBuilderPars;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// MeetingPars is used to store everything needed to set up a race meeting. Missing sections are
/// filled with defaults.
///
/// * `sim_consts` - Simulation constants of the engine
/// * `program_pars` - Parameters of the program builder
/// * `no_horses` - Number of horses to generate if no roster is given
/// * `horses` - Optional fixed roster
#[derive(Debug, Deserialize, Clone)]
pub struct MeetingPars {
    #[serde(default)]
    pub sim_consts: SimConstants,
    #[serde(default)]
    pub program_pars: ProgramBuilderPars,
    #[serde(default = "default_no_horses")]
    pub no_horses: u32,
    #[serde(default)]
    pub horses: Option<Vec<Horse>>,
}

fn default_no_horses() -> u32 {
    20
}

impl Default for MeetingPars {
    fn default() -> Self {
        MeetingPars {
            sim_consts: SimConstants::default(),
            program_pars: ProgramBuilderPars::default(),
            no_horses: default_no_horses(),
            horses: None,
        }
    }
}

fn read_json_file<T: DeserializeOwned>(filepath: &Path, description: &str) -> anyhow::Result<T> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open {} file {}!",
            description,
            filepath.display()
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse {} file {}!",
        description,
        filepath.display()
    ))?;
    Ok(pars)
}

/// read_meeting_pars reads the JSON file and decodes it into the meeting parameters struct.
pub fn read_meeting_pars(filepath: &Path) -> anyhow::Result<MeetingPars> {
    let pars: MeetingPars = read_json_file(filepath, "meeting parameter")?;
    pars.sim_consts
        .validate()
        .context(format!("Invalid constants in {}!", filepath.display()))?;
    Ok(pars)
}

/// read_sim_constants reads only the simulation constants from a JSON file.
pub fn read_sim_constants(filepath: &Path) -> anyhow::Result<SimConstants> {
    let consts: SimConstants = read_json_file(filepath, "simulation constants")?;
    consts
        .validate()
        .context(format!("Invalid constants in {}!", filepath.display()))?;
    Ok(consts)
}
