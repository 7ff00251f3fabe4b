use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::types::Hero;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Price,
    Level,
    Rarity,
    Generation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One key plus direction. Textual form is `"<key>-<asc|desc>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub const fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Every key in both directions, in the order the browse UI cycles them.
    pub const ALL: [SortSpec; 8] = [
        SortSpec::new(SortKey::Price, SortDirection::Ascending),
        SortSpec::new(SortKey::Price, SortDirection::Descending),
        SortSpec::new(SortKey::Level, SortDirection::Ascending),
        SortSpec::new(SortKey::Level, SortDirection::Descending),
        SortSpec::new(SortKey::Rarity, SortDirection::Ascending),
        SortSpec::new(SortKey::Rarity, SortDirection::Descending),
        SortSpec::new(SortKey::Generation, SortDirection::Ascending),
        SortSpec::new(SortKey::Generation, SortDirection::Descending),
    ];

    /// Ascending comparison on the chosen key. Unknown rarity compares below
    /// Common, and a missing or unparseable level or generation below 0.
    /// Unparseable prices already read as zero.
    fn compare_key(&self, a: &Hero, b: &Hero) -> Ordering {
        match self.key {
            SortKey::Price => a.price.cmp(&b.price),
            SortKey::Level => a.level_key().cmp(&b.level_key()),
            SortKey::Generation => a.generation_key().cmp(&b.generation_key()),
            SortKey::Rarity => a.rarity().cmp(&b.rarity()),
        }
    }

    fn compare(&self, a: &Hero, b: &Hero) -> Ordering {
        let ord = self.compare_key(a, b);
        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec::new(SortKey::Price, SortDirection::Ascending)
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self.key {
            SortKey::Price => "price",
            SortKey::Level => "level",
            SortKey::Rarity => "rarity",
            SortKey::Generation => "generation",
        };
        let dir = match self.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        write!(f, "{key}-{dir}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort order '{0}' (expected e.g. price-asc, level-desc)")]
pub struct ParseSortError(pub String);

impl FromStr for SortSpec {
    type Err = ParseSortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSortError(s.to_string());
        let (key, dir) = s.trim().rsplit_once('-').ok_or_else(err)?;
        let key = match key.to_ascii_lowercase().as_str() {
            "price" => SortKey::Price,
            "level" => SortKey::Level,
            "rarity" => SortKey::Rarity,
            "generation" => SortKey::Generation,
            _ => return Err(err()),
        };
        let direction = match dir.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Ascending,
            "desc" => SortDirection::Descending,
            _ => return Err(err()),
        };
        Ok(SortSpec { key, direction })
    }
}

impl Serialize for SortSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SortSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Stable sort by `spec`. With `prioritize_listed`, for-sale records come
/// first regardless of key and direction; ties keep their input order.
pub fn sort_records(mut records: Vec<Hero>, spec: SortSpec, prioritize_listed: bool) -> Vec<Hero> {
    records.sort_by(|a, b| {
        let partition = if prioritize_listed {
            b.is_for_sale.cmp(&a.is_for_sale)
        } else {
            Ordering::Equal
        };
        partition.then_with(|| spec.compare(a, b))
    });
    records
}
