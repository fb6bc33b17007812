use crate::core::horse::HorseId;
use crate::core::program::ProgramId;
use crate::post::race_result::{FinalResult, LiveResult};
use std::collections::{BTreeMap, BTreeSet};

pub const MAX_SNAPSHOT_FREQUENCY: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const GREY: RgbColor = RgbColor {
        r: 128,
        g: 128,
        b: 128,
    };

    /// parse accepts any CSS color (hsl(...), #rrggbb, names). Unparsable colors become grey.
    pub fn parse(color: &str) -> RgbColor {
        match color.parse::<css_color_parser::Color>() {
            Ok(tmp_color) => RgbColor {
                r: tmp_color.r,
                g: tmp_color.g,
                b: tmp_color.b,
            },
            Err(_) => RgbColor::GREY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HorseState {
    pub program_id: ProgramId,
    pub horse_id: HorseId,
    pub name: String,
    pub color: RgbColor,
    pub position: f64,
    pub is_finished: bool,
}

/// EngineSnapshot is the read-only view of the engine handed to observers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSnapshot {
    pub now_ms: u64,
    pub is_racing: bool,
    pub is_paused: bool,
    pub running_programs: BTreeSet<ProgramId>,
    pub horse_positions: BTreeMap<String, f64>,
    pub horse_states: Vec<HorseState>,
    pub live_results: Vec<LiveResult>,
    pub results: Vec<FinalResult>,
}

impl EngineSnapshot {
    /// get_leader returns the horse of a running program that is furthest along.
    pub fn get_leader(&self, program_id: ProgramId) -> Option<&HorseState> {
        self.horse_states
            .iter()
            .filter(|state| state.program_id == program_id)
            .fold(None, |leader: Option<&HorseState>, state| match leader {
                Some(l) if l.position >= state.position => Some(l),
                _ => Some(state),
            })
    }
}
