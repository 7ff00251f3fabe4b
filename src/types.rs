use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::price::TokenAmount;

// ---------------------------------------------------------------------------
// Rarity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Legendary,
    Mythic,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Legendary,
        Rarity::Mythic,
    ];

    /// Highest ordinal index (Mythic).
    pub const MAX_ORDINAL: u8 = 4;

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(n: i64) -> Option<Self> {
        usize::try_from(n).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Exact, case-sensitive name match as emitted by the metadata service.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "Common" => Some(Rarity::Common),
            "Uncommon" => Some(Rarity::Uncommon),
            "Rare" => Some(Rarity::Rare),
            "Legendary" => Some(Rarity::Legendary),
            "Mythic" => Some(Rarity::Mythic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Legendary => "Legendary",
            Rarity::Mythic => "Mythic",
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

const TRAIT_COUNT: usize = 8;

/// Trait keys the query engine understands. Anything else in a record's
/// attribute list is ignored at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TraitKey {
    Class,
    SubClass,
    Rarity,
    Generation,
    Level,
    Profession,
    Crafting1,
    Crafting2,
}

impl TraitKey {
    pub const ALL: [TraitKey; TRAIT_COUNT] = [
        TraitKey::Class,
        TraitKey::SubClass,
        TraitKey::Rarity,
        TraitKey::Generation,
        TraitKey::Level,
        TraitKey::Profession,
        TraitKey::Crafting1,
        TraitKey::Crafting2,
    ];

    /// The `trait_type` label used in attribute tag lists.
    pub fn label(self) -> &'static str {
        match self {
            TraitKey::Class => "Class",
            TraitKey::SubClass => "Sub Class",
            TraitKey::Rarity => "Rarity",
            TraitKey::Generation => "Generation",
            TraitKey::Level => "Level",
            TraitKey::Profession => "Profession",
            TraitKey::Crafting1 => "Crafting 1",
            TraitKey::Crafting2 => "Crafting 2",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == s)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TraitValue {
    Text(String),
    Int(i64),
    #[default]
    Absent,
}

impl TraitValue {
    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::String(s) => TraitValue::Text(s.clone()),
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(TraitValue::Int)
                .unwrap_or(TraitValue::Absent),
            serde_json::Value::Bool(b) => TraitValue::Text(b.to_string()),
            _ => TraitValue::Absent,
        }
    }

    /// String view; absent traits read as the empty string.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            TraitValue::Text(s) => Cow::Borrowed(s.as_str()),
            TraitValue::Int(n) => Cow::Owned(n.to_string()),
            TraitValue::Absent => Cow::Borrowed(""),
        }
    }

    /// Integer view; absent or unparseable values read as 0.
    pub fn as_int(&self) -> i64 {
        self.parsed_int().unwrap_or(0)
    }

    /// `None` when the value is absent or not an integer.
    pub fn parsed_int(&self) -> Option<i64> {
        match self {
            TraitValue::Int(n) => Some(*n),
            TraitValue::Text(s) => s.trim().parse().ok(),
            TraitValue::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, TraitValue::Absent)
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            TraitValue::Text(s) => serde_json::Value::String(s.clone()),
            TraitValue::Int(n) => serde_json::Value::from(*n),
            TraitValue::Absent => serde_json::Value::Null,
        }
    }
}

/// One `{trait_type, value}` entry of a record's attribute tag list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAttribute {
    pub trait_type: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl RawAttribute {
    pub fn new(key: TraitKey, value: impl Into<serde_json::Value>) -> Self {
        Self { trait_type: key.label().to_string(), value: value.into() }
    }
}

/// Typed trait table, built once per record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Traits {
    values: [TraitValue; TRAIT_COUNT],
}

impl Traits {
    /// First occurrence of a key wins; unknown keys are dropped.
    pub fn from_attributes(attrs: &[RawAttribute]) -> Self {
        let mut traits = Traits::default();
        let mut seen = [false; TRAIT_COUNT];
        for attr in attrs {
            let Some(key) = TraitKey::from_label(&attr.trait_type) else { continue };
            if !seen[key.index()] {
                seen[key.index()] = true;
                traits.values[key.index()] = TraitValue::from_json(&attr.value);
            }
        }
        traits
    }

    pub fn get(&self, key: TraitKey) -> &TraitValue {
        &self.values[key.index()]
    }

    pub fn set(&mut self, key: TraitKey, value: TraitValue) {
        self.values[key.index()] = value;
    }

    pub fn text(&self, key: TraitKey) -> Cow<'_, str> {
        self.get(key).as_text()
    }

    pub fn int(&self, key: TraitKey) -> i64 {
        self.get(key).as_int()
    }

    /// `None` for absent or unrecognised rarity values. Accepts either the
    /// tier name or its ordinal index.
    pub fn rarity(&self) -> Option<Rarity> {
        match self.get(TraitKey::Rarity) {
            TraitValue::Text(s) => Rarity::from_name(s),
            TraitValue::Int(n) => Rarity::from_ordinal(*n),
            TraitValue::Absent => None,
        }
    }
}

impl Serialize for Traits {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<&str, serde_json::Value> = TraitKey::ALL
            .iter()
            .filter(|k| !self.get(**k).is_absent())
            .map(|k| (k.label(), self.get(*k).to_json()))
            .collect();
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Traits {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let attrs: Vec<RawAttribute> = map
            .into_iter()
            .map(|(trait_type, value)| RawAttribute { trait_type, value })
            .collect();
        Ok(Traits::from_attributes(&attrs))
    }
}

// ---------------------------------------------------------------------------
// Hero
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hero {
    /// Decimal string of the on-chain uint256 token id.
    pub id: String,
    pub traits: Traits,
    /// Sale price in the token's smallest denomination.
    #[serde(default)]
    pub price: TokenAmount,
    #[serde(default)]
    pub is_for_sale: bool,
    #[serde(default)]
    pub is_on_quest: bool,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub xp: u64,
    /// Maximum stamina.
    #[serde(default)]
    pub stamina: u32,
    /// Unix seconds at which stamina is full again (0 = already full).
    #[serde(default)]
    pub stamina_full_at: u64,
}

impl Hero {
    pub fn new(id: impl Into<String>, attrs: &[RawAttribute]) -> Self {
        Self {
            id: id.into(),
            traits: Traits::from_attributes(attrs),
            price: TokenAmount::zero(),
            is_for_sale: false,
            is_on_quest: false,
            owner: String::new(),
            xp: 0,
            stamina: 0,
            stamina_full_at: 0,
        }
    }

    /// Level for range filtering. Negative values clamp to 0.
    pub fn level(&self) -> i64 {
        self.traits.int(TraitKey::Level).max(0)
    }

    pub fn generation(&self) -> i64 {
        self.traits.int(TraitKey::Generation).max(0)
    }

    /// Level as a sort key: `None` (below every parsed level) when missing
    /// or unparseable.
    pub fn level_key(&self) -> Option<i64> {
        self.traits.get(TraitKey::Level).parsed_int().map(|n| n.max(0))
    }

    pub fn generation_key(&self) -> Option<i64> {
        self.traits.get(TraitKey::Generation).parsed_int().map(|n| n.max(0))
    }

    pub fn rarity(&self) -> Option<Rarity> {
        self.traits.rarity()
    }

    pub fn is_owned_by(&self, address: &str) -> bool {
        !self.owner.is_empty() && self.owner.eq_ignore_ascii_case(address)
    }

    /// XP still needed for the next level.
    pub fn xp_to_next_level(&self) -> u64 {
        let level = u32::try_from(self.level()).unwrap_or(u32::MAX);
        required_xp(level).saturating_sub(self.xp)
    }

    /// Stamina available at `now_secs`.
    pub fn current_stamina(&self, now_secs: u64) -> u32 {
        remaining_stamina(self.stamina, self.stamina_full_at, now_secs)
    }
}

/// Numeric order of uint256 decimal ids; non-numeric ids sort after numeric
/// ones, lexicographically.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (TokenAmount::parse(a), TokenAmount::parse(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

// ---------------------------------------------------------------------------
// Metadata-service code tables
// ---------------------------------------------------------------------------

pub fn class_name(code: i64) -> Option<&'static str> {
    let name = match code {
        0 => "Warrior",
        1 => "Knight",
        2 => "Thief",
        3 => "Archer",
        4 => "Priest",
        5 => "Wizard",
        6 => "Monk",
        7 => "Pirate",
        8 => "Berserker",
        9 => "Seer",
        10 => "Legionnaire",
        11 => "Scholar",
        16 => "Paladin",
        17 => "DarkKnight",
        18 => "Summoner",
        19 => "Ninja",
        20 => "Shapeshifter",
        21 => "Bard",
        24 => "Dragoon",
        25 => "Sage",
        26 => "SpellBow",
        28 => "DreadKnight",
        _ => return None,
    };
    Some(name)
}

pub fn crafting_name(code: i64) -> Option<&'static str> {
    let name = match code {
        0 => "Blacksmithing",
        2 => "Goldsmithing",
        4 => "Armorsmithing",
        6 => "Woodworking",
        8 => "Leatherworking",
        10 => "Tailoring",
        12 => "Enchanting",
        14 => "Alchemy",
        _ => return None,
    };
    Some(name)
}

/// XP required to advance from `level` to `level + 1`.
pub fn required_xp(level: u32) -> u64 {
    let level = u64::from(level);
    let next = level + 1;
    match level {
        0..=5 => next * 1_000,
        6..=8 => 4_000 + (next - 5) * 2_000,
        9..=15 => 12_000 + (next - 9) * 4_000,
        16..=35 => 40_000 + (next - 16) * 5_000,
        36..=55 => 140_000 + (next - 36) * 7_500,
        _ => 290_000 + (next - 56) * 10_000,
    }
}

/// Seconds to regenerate one stamina point.
pub const SECONDS_PER_STAMINA: u64 = 1_200;

/// Stamina left given the time it will be full again. Every started
/// regeneration interval still owed counts as one spent point.
pub fn remaining_stamina(max: u32, full_at_secs: u64, now_secs: u64) -> u32 {
    if full_at_secs <= now_secs {
        return max;
    }
    let owed = (full_at_secs - now_secs).div_ceil(SECONDS_PER_STAMINA);
    max.saturating_sub(u32::try_from(owed).unwrap_or(u32::MAX))
}
