use serde::{Deserialize, Serialize};

pub type HorseId = u32;

pub const MIN_CONDITION: u32 = 1;
pub const MAX_CONDITION: u32 = 100;

/// * `id` - Unique horse number
/// * `name` - Display name, e.g. Silver Comet
/// * `color` - Display color as CSS color string, e.g. hsl(210, 70%, 50%)
/// * `condition` - Speed bias in [1, 100], higher is faster on average
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Horse {
    pub id: HorseId,
    pub name: String,
    pub color: String,
    pub condition: u32,
}

impl Horse {
    pub fn new(id: HorseId, name: &str, color: &str, condition: u32) -> Horse {
        Horse {
            id,
            name: name.to_owned(),
            color: color.to_owned(),
            condition,
        }
    }

    /// condition_valid checks if the condition lies within [MIN_CONDITION, MAX_CONDITION].
    pub fn condition_valid(&self) -> bool {
        (MIN_CONDITION..=MAX_CONDITION).contains(&self.condition)
    }
}
