use crate::core::horse::{Horse, MAX_CONDITION, MIN_CONDITION};
use anyhow::Context;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::path::Path;

const NAME_ADJECTIVES: [&str; 16] = [
    "Silver", "Golden", "Midnight", "Thunder", "Wild", "Swift", "Crimson", "Northern", "Lucky",
    "Royal", "Desert", "Iron", "Velvet", "Storm", "Shadow", "Copper",
];

const NAME_NOUNS: [&str; 16] = [
    "Comet", "Arrow", "Spirit", "Dancer", "Blaze", "Runner", "Legend", "Echo", "Falcon", "Mist",
    "Rebel", "Star", "Breeze", "Knight", "Flame", "Ghost",
];

const MAX_COLOR_ATTEMPTS: u32 = 100;

/// A HorseSupply provides the horses a meeting is built from.
pub trait HorseSupply {
    fn horses(&mut self) -> Vec<Horse>;
}

/// RandomHorseSupply generates `count` horses with ids 1..=count, unique names, well
/// distinguishable colors and a random condition.
#[derive(Debug)]
pub struct RandomHorseSupply {
    pub count: u32,
    rng: StdRng,
}

impl RandomHorseSupply {
    pub fn new(count: u32) -> RandomHorseSupply {
        RandomHorseSupply {
            count,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn from_seed(count: u32, seed: u64) -> RandomHorseSupply {
        RandomHorseSupply {
            count,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn gen_names(&mut self) -> Vec<String> {
        let mut names: Vec<String> = NAME_ADJECTIVES
            .iter()
            .flat_map(|adj| NAME_NOUNS.iter().map(move |noun| format!("{} {}", adj, noun)))
            .collect();
        names.shuffle(&mut self.rng);

        let no_combinations = names.len();
        (0..self.count as usize)
            .map(|idx| {
                let name = &names[idx % no_combinations];
                if idx < no_combinations {
                    name.to_owned()
                } else {
                    // all combinations used up, enumerate the repetitions
                    format!("{} {}", name, idx / no_combinations + 1)
                }
            })
            .collect()
    }

    fn gen_color(&mut self) -> String {
        let hue = self.rng.gen_range(0..360);
        let saturation = self.rng.gen_range(60..90);
        let lightness = self.rng.gen_range(40..60);
        format!("hsl({}, {}%, {}%)", hue, saturation, lightness)
    }
}

impl Default for RandomHorseSupply {
    fn default() -> Self {
        RandomHorseSupply::new(20)
    }
}

impl HorseSupply for RandomHorseSupply {
    fn horses(&mut self) -> Vec<Horse> {
        let names = self.gen_names();
        let mut used_colors = HashSet::new();

        names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let mut color = self.gen_color();
                let mut attempts = 1;
                while used_colors.contains(&color) && attempts < MAX_COLOR_ATTEMPTS {
                    color = self.gen_color();
                    attempts += 1;
                }
                used_colors.insert(color.clone());

                let condition = self.rng.gen_range(MIN_CONDITION..=MAX_CONDITION);
                Horse::new(idx as u32 + 1, name, &color, condition)
            })
            .collect()
    }
}

/// RosterSupply hands out a fixed list of horses, e.g. read from a roster file.
#[derive(Debug, Clone)]
pub struct RosterSupply {
    roster: Vec<Horse>,
}

impl RosterSupply {
    pub fn new(roster: Vec<Horse>) -> RosterSupply {
        RosterSupply { roster }
    }

    pub fn from_csv(filepath: &Path) -> anyhow::Result<RosterSupply> {
        Ok(RosterSupply::new(read_roster_csv(filepath)?))
    }
}

impl HorseSupply for RosterSupply {
    fn horses(&mut self) -> Vec<Horse> {
        self.roster.clone()
    }
}

/// read_roster_csv reads horses from a CSV file with the header id,name,color,condition.
pub fn read_roster_csv(filepath: &Path) -> anyhow::Result<Vec<Horse>> {
    let mut reader = csv::Reader::from_path(filepath)
        .context(format!("Failed to open roster file {}!", filepath.display()))?;

    let mut horses: Vec<Horse> = Vec::new();
    for (idx, record) in reader.deserialize().enumerate() {
        let horse: Horse = record.context(format!(
            "Failed to parse record {} of roster file {}!",
            idx + 1,
            filepath.display()
        ))?;
        if !horse.condition_valid() {
            anyhow::bail!(
                "Horse {} in roster file {} has condition {} outside [{}, {}]!",
                horse.id,
                filepath.display(),
                horse.condition,
                MIN_CONDITION,
                MAX_CONDITION
            );
        }
        horses.push(horse);
    }
    Ok(horses)
}
