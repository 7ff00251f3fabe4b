use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{Hero, Rarity, TraitKey};

/// Default range bounds, matching the browse UI's initial state.
pub const DEFAULT_LEVEL_MIN: i64 = 1;
pub const DEFAULT_LEVEL_MAX: i64 = 100;
pub const DEFAULT_GENERATION_MIN: i64 = 0;
pub const DEFAULT_GENERATION_MAX: i64 = 11;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Empty set = no constraint. Exact, case-sensitive match.
    pub class: BTreeSet<String>,
    pub subclass: BTreeSet<String>,
    /// Matched ASCII case-insensitively.
    pub profession: BTreeSet<String>,
    pub crafting1: BTreeSet<String>,
    pub crafting2: BTreeSet<String>,
    /// Rarity ordinal bounds, inclusive (0 = Common .. 4 = Mythic).
    pub rarity_min: u8,
    pub rarity_max: u8,
    pub generation_min: i64,
    pub generation_max: i64,
    pub level_min: i64,
    pub level_max: i64,
    pub hide_questing: bool,
    pub hide_listed: bool,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            class: BTreeSet::new(),
            subclass: BTreeSet::new(),
            profession: BTreeSet::new(),
            crafting1: BTreeSet::new(),
            crafting2: BTreeSet::new(),
            rarity_min: 0,
            rarity_max: Rarity::MAX_ORDINAL,
            generation_min: DEFAULT_GENERATION_MIN,
            generation_max: DEFAULT_GENERATION_MAX,
            level_min: DEFAULT_LEVEL_MIN,
            level_max: DEFAULT_LEVEL_MAX,
            hide_questing: false,
            hide_listed: false,
        }
    }
}

/// Rejected at the boundary, before a spec reaches the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("{field}: min {min} is greater than max {max}")]
    InvertedRange { field: &'static str, min: i64, max: i64 },

    #[error("rarity bound {0} is out of range 0..=4")]
    RarityOutOfRange(u8),
}

impl FilterSpec {
    /// Boundary validation for caller-supplied specs. The engine itself
    /// accepts inverted ranges and simply matches nothing.
    pub fn validate(&self) -> Result<(), SpecError> {
        for bound in [self.rarity_min, self.rarity_max] {
            if bound > Rarity::MAX_ORDINAL {
                return Err(SpecError::RarityOutOfRange(bound));
            }
        }
        let ranges = [
            ("rarity", i64::from(self.rarity_min), i64::from(self.rarity_max)),
            ("generation", self.generation_min, self.generation_max),
            ("level", self.level_min, self.level_max),
        ];
        for (field, min, max) in ranges {
            if min > max {
                return Err(SpecError::InvertedRange { field, min, max });
            }
        }
        Ok(())
    }

    /// True when the record passes every predicate.
    pub fn matches(&self, hero: &Hero) -> bool {
        let traits = &hero.traits;

        let exact = [
            (&self.class, TraitKey::Class),
            (&self.subclass, TraitKey::SubClass),
            (&self.crafting1, TraitKey::Crafting1),
            (&self.crafting2, TraitKey::Crafting2),
        ];
        for (set, key) in exact {
            if !set.is_empty() && !set.contains(&*traits.text(key)) {
                return false;
            }
        }

        if !self.profession.is_empty() {
            let profession = traits.text(TraitKey::Profession);
            if !self.profession.iter().any(|p| p.eq_ignore_ascii_case(&profession)) {
                return false;
            }
        }

        // Unknown rarity sits below every tier and is always out of range.
        let Some(rarity) = hero.rarity() else { return false };
        if rarity.ordinal() < self.rarity_min || rarity.ordinal() > self.rarity_max {
            return false;
        }

        let generation = hero.generation();
        if generation < self.generation_min || generation > self.generation_max {
            return false;
        }

        let level = hero.level();
        if level < self.level_min || level > self.level_max {
            return false;
        }

        if self.hide_questing && hero.is_on_quest {
            return false;
        }
        if self.hide_listed && hero.is_for_sale {
            return false;
        }

        true
    }
}

/// Keep the records that satisfy every predicate of `spec`, in input order.
pub fn apply_filters(records: Vec<Hero>, spec: &FilterSpec) -> Vec<Hero> {
    let input = records.len();
    let kept: Vec<Hero> = records.into_iter().filter(|h| spec.matches(h)).collect();
    debug!(input, kept = kept.len(), "filters applied");
    kept
}
