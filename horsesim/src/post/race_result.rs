use crate::core::horse::HorseId;
use crate::core::program::{ProgramId, RaceProgram};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::Path;

/// LivePlacing is one row of the in-progress standings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LivePlacing {
    pub horse_id: HorseId,
    pub position: u32,
    pub is_finished: bool,
}

/// LiveResult contains the current standings of a running program. It is superseded on every
/// tick.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LiveResult {
    pub program_id: ProgramId,
    pub result: Vec<LivePlacing>,
    pub is_live: bool,
}

/// Placing is one row of a final result. Horses stopped by the time cap have no finish time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Placing {
    pub horse_id: HorseId,
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time_ms: Option<u64>,
}

/// FinalResult contains the ranked outcome of a completed program. Positions form a permutation
/// of 1..=N.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FinalResult {
    pub program_id: ProgramId,
    pub result: Vec<Placing>,
}

impl FinalResult {
    pub fn get_winner(&self) -> Option<HorseId> {
        self.result
            .iter()
            .find(|placing| placing.position == 1)
            .map(|placing| placing.horse_id)
    }

    /// format_standings renders the result as a table, using the program for horse names.
    pub fn format_standings(&self, program: Option<&RaceProgram>) -> String {
        let mut tmp_string = String::new();

        match program {
            Some(program) => {
                let _ = writeln!(
                    &mut tmp_string,
                    "RESULT: Program {} ({:.0}m)",
                    self.program_id, program.distance
                );
            }
            None => {
                let _ = writeln!(&mut tmp_string, "RESULT: Program {}", self.program_id);
            }
        }
        let _ = writeln!(&mut tmp_string, "pos, horse, name                , time");

        for placing in self.result.iter() {
            let name = program
                .and_then(|p| p.get_horse(placing.horse_id))
                .map(|horse| horse.name.as_str())
                .unwrap_or("-");
            let time = match placing.finish_time_ms {
                Some(t) => format!("{:7.1}s", t as f64 / 1000.0),
                None => "     DNF".to_owned(),
            };
            let _ = writeln!(
                &mut tmp_string,
                "{:3}, {:5}, {:20}, {}",
                placing.position, placing.horse_id, name, time
            );
        }

        tmp_string
    }

    /// print_standings prints the resulting ranking to the console output.
    pub fn print_standings(&self, program: Option<&RaceProgram>) {
        println!("{}", self.format_standings(program));
    }
}

#[derive(Debug, Serialize)]
struct CsvPlacingRow {
    program_id: ProgramId,
    position: u32,
    horse_id: HorseId,
    finish_time_ms: Option<u64>,
}

/// write_results_csv writes all final results to a CSV file, one row per placing.
pub fn write_results_csv(results: &[FinalResult], path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .context(format!("Failed to create output directory {}!", dir.display()))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to open result file {}!", path.display()))?;

    for result in results.iter() {
        for placing in result.result.iter() {
            writer.serialize(CsvPlacingRow {
                program_id: result.program_id,
                position: placing.position,
                horse_id: placing.horse_id,
                finish_time_ms: placing.finish_time_ms,
            })?;
        }
    }
    writer.flush()?;

    Ok(())
}

/// ResultsStore holds the final results and the live results, both keyed by program id.
#[derive(Debug, Default, Clone)]
pub struct ResultsStore {
    results: Vec<FinalResult>,
    live_results: Vec<LiveResult>,
}

impl ResultsStore {
    pub fn new() -> ResultsStore {
        ResultsStore::default()
    }

    /// add_result replaces an earlier result of the same program or appends the result.
    pub fn add_result(&mut self, result: FinalResult) {
        match self
            .results
            .iter_mut()
            .find(|r| r.program_id == result.program_id)
        {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    pub fn remove_result(&mut self, program_id: ProgramId) -> bool {
        let len_before = self.results.len();
        self.results.retain(|r| r.program_id != program_id);
        self.results.len() != len_before
    }

    pub fn clear_all_results(&mut self) {
        self.results.clear();
    }

    /// update_live_result overwrites the live result of the program in place.
    pub fn update_live_result(&mut self, live_result: LiveResult) {
        match self
            .live_results
            .iter_mut()
            .find(|r| r.program_id == live_result.program_id)
        {
            Some(existing) => *existing = live_result,
            None => self.live_results.push(live_result),
        }
    }

    pub fn remove_live_result(&mut self, program_id: ProgramId) -> bool {
        let len_before = self.live_results.len();
        self.live_results.retain(|r| r.program_id != program_id);
        self.live_results.len() != len_before
    }

    pub fn clear_live_results(&mut self) {
        self.live_results.clear();
    }

    pub fn results(&self) -> &[FinalResult] {
        &self.results
    }

    pub fn live_results(&self) -> &[LiveResult] {
        &self.live_results
    }

    pub fn result_for(&self, program_id: ProgramId) -> Option<&FinalResult> {
        self.results.iter().find(|r| r.program_id == program_id)
    }

    pub fn live_result_for(&self, program_id: ProgramId) -> Option<&LiveResult> {
        self.live_results.iter().find(|r| r.program_id == program_id)
    }
}
