//! Spells, their unlock rules and the per-color energy that powers them.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::RuneColor;
use crate::error::SpellError;

/// Energy a color can hold; also what every spell costs.
pub const MAX_ENERGY: f32 = 1.0;

/// Completed levels shown as the long-term goal.
pub const AWAKENING_GOAL: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpellId {
    /// Stops the level timer for a while.
    FreezeTime,
    /// Destroys a whole row.
    FireEgg,
    /// Destroys every rune of one color.
    Teleport,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpellDefinition {
    pub id: SpellId,
    pub title: &'static str,
    /// The color whose energy charges the spell.
    pub color: RuneColor,
    pub awakenings_to_unlock: u32,
    pub energy_cost: f32,
}

static SPELLS: [SpellDefinition; 3] = [
    SpellDefinition {
        id: SpellId::FreezeTime,
        title: "Frozen Hourglass",
        color: RuneColor::Blue,
        awakenings_to_unlock: 0,
        energy_cost: MAX_ENERGY,
    },
    SpellDefinition {
        id: SpellId::FireEgg,
        title: "Shattering Chant",
        color: RuneColor::Yellow,
        awakenings_to_unlock: 3,
        energy_cost: MAX_ENERGY,
    },
    SpellDefinition {
        id: SpellId::Teleport,
        title: "Storm Surge",
        color: RuneColor::Pink,
        awakenings_to_unlock: 5,
        energy_cost: MAX_ENERGY,
    },
];

impl SpellId {
    pub const ALL: [SpellId; 3] = [SpellId::FreezeTime, SpellId::FireEgg, SpellId::Teleport];

    pub fn definition(&self) -> &'static SpellDefinition {
        match self {
            SpellId::FreezeTime => &SPELLS[0],
            SpellId::FireEgg => &SPELLS[1],
            SpellId::Teleport => &SPELLS[2],
        }
    }
}

/// What a spell looks like to the player right now.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpellState {
    pub definition: &'static SpellDefinition,
    pub is_unlocked: bool,
    /// Fraction of the awakenings needed to unlock, in `[0, 1]`.
    pub unlock_progress: f32,
    pub current_energy: f32,
    /// Fraction of the energy cost collected, in `[0, 1]`.
    pub energy_progress: f32,
    /// Unlocked and fully charged.
    pub is_active: bool,
    pub remaining_awakenings: u32,
}

/// Long-lived progress across levels: awakenings and stored energy per color.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spellbook {
    pub awakenings_completed: u32,
    pub energy_by_color: BTreeMap<RuneColor, f32>,
}

impl Spellbook {
    pub fn energy(&self, color: RuneColor) -> f32 {
        self.energy_by_color.get(&color).copied().unwrap_or(0.0)
    }

    /// Adds energy per color, capped at `MAX_ENERGY`. Non-positive gains are
    /// ignored. Returns `true` if anything changed.
    pub fn add_energy(&mut self, gains: &BTreeMap<RuneColor, f32>) -> bool {
        let mut changed = false;
        for (&color, &gain) in gains {
            if gain <= 0.0 {
                continue;
            }
            let current = self.energy(color);
            let new_value = (current + gain).min(MAX_ENERGY);
            if new_value != current {
                self.energy_by_color.insert(color, new_value);
                changed = true;
            }
        }
        changed
    }

    /// Drains the stored energy of `color`.
    pub fn consume_energy(&mut self, color: RuneColor) {
        if let Some(energy) = self.energy_by_color.get_mut(&color) {
            *energy = 0.0;
        }
    }

    pub fn increment_awakenings(&mut self) {
        self.awakenings_completed += 1;
    }

    pub fn reset(&mut self) {
        *self = Spellbook::default();
    }

    pub fn spell_state(&self, id: SpellId) -> SpellState {
        let definition = id.definition();
        let current_energy = self.energy(definition.color);
        let is_unlocked = self.awakenings_completed >= definition.awakenings_to_unlock;
        let unlock_progress = if definition.awakenings_to_unlock == 0 {
            1.0
        } else {
            (self.awakenings_completed as f32 / definition.awakenings_to_unlock as f32).clamp(0.0, 1.0)
        };
        SpellState {
            definition,
            is_unlocked,
            unlock_progress,
            current_energy,
            energy_progress: (current_energy / definition.energy_cost).clamp(0.0, 1.0),
            is_active: is_unlocked && current_energy >= definition.energy_cost,
            remaining_awakenings: definition
                .awakenings_to_unlock
                .saturating_sub(self.awakenings_completed),
        }
    }

    /// Checks that `id` can be cast and pays for it.
    pub fn try_cast(&mut self, id: SpellId) -> Result<&'static SpellDefinition, SpellError> {
        let state = self.spell_state(id);
        if !state.is_unlocked {
            return Err(SpellError::Locked {
                remaining: state.remaining_awakenings,
            });
        }
        if state.current_energy < state.definition.energy_cost {
            return Err(SpellError::NotEnoughEnergy);
        }
        self.consume_energy(state.definition.color);
        Ok(state.definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_energy_caps_and_ignores_non_positive() {
        let mut book = Spellbook::default();
        assert!(book.add_energy(&BTreeMap::from([(RuneColor::Blue, 0.7)])));
        assert!(book.add_energy(&BTreeMap::from([(RuneColor::Blue, 0.7), (RuneColor::Green, -1.0)])));
        assert_eq!(book.energy(RuneColor::Blue), MAX_ENERGY);
        assert_eq!(book.energy(RuneColor::Green), 0.0);
        assert!(!book.add_energy(&BTreeMap::from([(RuneColor::Blue, 0.2)])), "already full");
    }

    #[test]
    fn test_unlock_progress() {
        let mut book = Spellbook::default();
        assert!(book.spell_state(SpellId::FreezeTime).is_unlocked);
        let fire = book.spell_state(SpellId::FireEgg);
        assert!(!fire.is_unlocked);
        assert_eq!(fire.remaining_awakenings, 3);
        assert_eq!(fire.unlock_progress, 0.0);

        for _ in 0..3 {
            book.increment_awakenings();
        }
        assert!(book.spell_state(SpellId::FireEgg).is_unlocked);
        let storm = book.spell_state(SpellId::Teleport);
        assert!(!storm.is_unlocked);
        assert!((storm.unlock_progress - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_try_cast() {
        let mut book = Spellbook::default();
        assert_eq!(book.try_cast(SpellId::FreezeTime), Err(SpellError::NotEnoughEnergy));
        assert_eq!(book.try_cast(SpellId::Teleport), Err(SpellError::Locked { remaining: 5 }));

        book.add_energy(&BTreeMap::from([(RuneColor::Blue, 1.0)]));
        assert!(book.spell_state(SpellId::FreezeTime).is_active);
        let definition = book.try_cast(SpellId::FreezeTime).unwrap();
        assert_eq!(definition.title, "Frozen Hourglass");
        assert_eq!(book.energy(RuneColor::Blue), 0.0);
        assert!(!book.spell_state(SpellId::FreezeTime).is_active);
    }

    #[test]
    fn test_reset() {
        let mut book = Spellbook::default();
        book.increment_awakenings();
        book.add_energy(&BTreeMap::from([(RuneColor::Pink, 0.5)]));
        book.reset();
        assert_eq!(book, Spellbook::default());
    }

    #[test]
    fn test_definitions_match_ids() {
        for id in SpellId::ALL {
            assert_eq!(id.definition().id, id);
        }
    }
}
