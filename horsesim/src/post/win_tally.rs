use crate::core::horse::HorseId;
use crate::post::race_result::FinalResult;
use helpers::general::{argsort, SortOrder};
use std::collections::BTreeMap;
use std::fmt::Write;

/// WinTally counts wins and podium places of every horse over many simulated meetings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WinTally {
    pub no_meetings: u32,
    pub no_races: u32,
    pub wins: BTreeMap<HorseId, u32>,
    pub podiums: BTreeMap<HorseId, u32>,
}

impl WinTally {
    pub fn new() -> WinTally {
        WinTally::default()
    }

    /// add_meeting adds the final results of one simulated meeting.
    pub fn add_meeting(&mut self, results: &[FinalResult]) {
        self.no_meetings += 1;
        for result in results.iter() {
            self.no_races += 1;
            for placing in result.result.iter() {
                if placing.position == 1 {
                    *self.wins.entry(placing.horse_id).or_insert(0) += 1;
                }
                if placing.position <= 3 {
                    *self.podiums.entry(placing.horse_id).or_insert(0) += 1;
                }
            }
        }
    }

    /// merge combines two tallies, e.g. from parallel workers.
    pub fn merge(mut self, other: WinTally) -> WinTally {
        self.no_meetings += other.no_meetings;
        self.no_races += other.no_races;
        for (horse_id, wins) in other.wins {
            *self.wins.entry(horse_id).or_insert(0) += wins;
        }
        for (horse_id, podiums) in other.podiums {
            *self.podiums.entry(horse_id).or_insert(0) += podiums;
        }
        self
    }

    /// format_tally renders horses sorted by number of wins.
    pub fn format_tally(&self) -> String {
        let horse_ids: Vec<HorseId> = self.podiums.keys().copied().collect();
        let wins: Vec<u32> = horse_ids
            .iter()
            .map(|id| self.wins.get(id).copied().unwrap_or(0))
            .collect();

        let mut tmp_string = String::new();
        let _ = writeln!(
            &mut tmp_string,
            "RESULT: Win tally over {} meetings ({} races)",
            self.no_meetings, self.no_races
        );
        let _ = writeln!(&mut tmp_string, "horse, wins, podiums");
        for idx in argsort(&wins, SortOrder::Descending) {
            let horse_id = horse_ids[idx];
            let _ = writeln!(
                &mut tmp_string,
                "{:5}, {:4}, {:7}",
                horse_id,
                wins[idx],
                self.podiums.get(&horse_id).copied().unwrap_or(0)
            );
        }
        tmp_string
    }

    pub fn print_tally(&self) {
        println!("{}", self.format_tally());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::race_result::Placing;

    fn result(program_id: u32, horse_ids: &[HorseId]) -> FinalResult {
        FinalResult {
            program_id,
            result: horse_ids
                .iter()
                .enumerate()
                .map(|(i, &horse_id)| Placing {
                    horse_id,
                    position: i as u32 + 1,
                    finish_time_ms: None,
                })
                .collect(),
        }
    }

    #[test]
    fn counts_wins_and_podiums() {
        let mut tally = WinTally::new();
        tally.add_meeting(&[result(1, &[1, 2, 3, 4]), result(2, &[2, 1, 4, 3])]);

        assert_eq!(tally.no_meetings, 1);
        assert_eq!(tally.no_races, 2);
        assert_eq!(tally.wins.get(&1), Some(&1));
        assert_eq!(tally.wins.get(&2), Some(&1));
        assert_eq!(tally.podiums.get(&3), Some(&1));
        assert_eq!(tally.podiums.get(&4), Some(&1));
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = WinTally::new();
        a.add_meeting(&[result(1, &[1, 2])]);
        let mut b = WinTally::new();
        b.add_meeting(&[result(1, &[1, 2])]);

        let merged = a.merge(b);
        assert_eq!(merged.no_meetings, 2);
        assert_eq!(merged.wins.get(&1), Some(&2));
        assert!(merged.format_tally().contains("over 2 meetings"));
    }
}
