//! Soldier stat vector keyed by [`Stat`].
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut, Sub};

/// Every stat tracked on a soldier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Tu,
    Stamina,
    Health,
    Bravery,
    Reactions,
    Firing,
    Throwing,
    Strength,
    Melee,
    PsiStrength,
    PsiSkill,
    Mana,
    Stealth,
    Perception,
    Charisma,
    Investigation,
    Deception,
    Interrogation,
}

/// How experience in a stat is converted into growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCategory {
    /// Grows directly from experience without crediting a role.
    Secondary,
    /// Battlefield skills; credit the acting role when it fights.
    Combat,
    /// Field agent skills; always credit the agent role.
    Covert,
}

impl Stat {
    pub const COUNT: usize = 18;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Tu,
        Self::Stamina,
        Self::Health,
        Self::Bravery,
        Self::Reactions,
        Self::Firing,
        Self::Throwing,
        Self::Strength,
        Self::Melee,
        Self::PsiStrength,
        Self::PsiSkill,
        Self::Mana,
        Self::Stealth,
        Self::Perception,
        Self::Charisma,
        Self::Investigation,
        Self::Deception,
        Self::Interrogation,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn category(self) -> StatCategory {
        match self {
            Self::Tu | Self::Stamina | Self::Health => StatCategory::Secondary,
            Self::Bravery
            | Self::Reactions
            | Self::Firing
            | Self::Throwing
            | Self::Strength
            | Self::Melee
            | Self::PsiStrength
            | Self::PsiSkill
            | Self::Mana => StatCategory::Combat,
            Self::Stealth
            | Self::Perception
            | Self::Charisma
            | Self::Investigation
            | Self::Deception
            | Self::Interrogation => StatCategory::Covert,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tu => "tu",
            Self::Stamina => "stamina",
            Self::Health => "health",
            Self::Bravery => "bravery",
            Self::Reactions => "reactions",
            Self::Firing => "firing",
            Self::Throwing => "throwing",
            Self::Strength => "strength",
            Self::Melee => "melee",
            Self::PsiStrength => "psi_strength",
            Self::PsiSkill => "psi_skill",
            Self::Mana => "mana",
            Self::Stealth => "stealth",
            Self::Perception => "perception",
            Self::Charisma => "charisma",
            Self::Investigation => "investigation",
            Self::Deception => "deception",
            Self::Interrogation => "interrogation",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dense stat vector. Serialized as a map of non-zero stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Stat, i32>", into = "BTreeMap<Stat, i32>")]
pub struct StatBlock {
    values: [i32; Stat::COUNT],
}

impl StatBlock {
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            values: [0; Stat::COUNT],
        }
    }

    /// Block with every stat set to `value`.
    #[must_use]
    pub const fn splat(value: i32) -> Self {
        Self {
            values: [value; Stat::COUNT],
        }
    }

    #[must_use]
    pub fn with(mut self, stat: Stat, value: i32) -> Self {
        self[stat] = value;
        self
    }

    #[must_use]
    pub const fn get(&self, stat: Stat) -> i32 {
        self.values[stat.index()]
    }

    pub fn add(&mut self, stat: Stat, delta: i32) {
        self[stat] = self[stat].saturating_add(delta);
    }

    /// True when every stat is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|v| *v == 0)
    }

    /// Whether `stat` is still below its cap.
    #[must_use]
    pub fn below_cap(&self, stat: Stat, caps: &Self) -> bool {
        self[stat] < caps[stat]
    }

    /// Lower every stat above its cap down to the cap.
    pub fn clamp_to(&mut self, caps: &Self) {
        for stat in Stat::ALL {
            if self[stat] > caps[stat] {
                self[stat] = caps[stat];
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stat, i32)> + '_ {
        Stat::ALL.into_iter().map(|stat| (stat, self[stat]))
    }

    /// Non-zero entries only.
    pub fn nonzero(&self) -> impl Iterator<Item = (Stat, i32)> + '_ {
        self.iter().filter(|(_, value)| *value != 0)
    }
}

impl Index<Stat> for StatBlock {
    type Output = i32;

    fn index(&self, stat: Stat) -> &Self::Output {
        &self.values[stat.index()]
    }
}

impl IndexMut<Stat> for StatBlock {
    fn index_mut(&mut self, stat: Stat) -> &mut Self::Output {
        &mut self.values[stat.index()]
    }
}

impl Sub for StatBlock {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        let mut out = Self::zero();
        for stat in Stat::ALL {
            out[stat] = self[stat].saturating_sub(rhs[stat]);
        }
        out
    }
}

impl From<BTreeMap<Stat, i32>> for StatBlock {
    fn from(map: BTreeMap<Stat, i32>) -> Self {
        let mut block = Self::zero();
        for (stat, value) in map {
            block[stat] = value;
        }
        block
    }
}

impl From<StatBlock> for BTreeMap<Stat, i32> {
    fn from(block: StatBlock) -> Self {
        block.nonzero().collect()
    }
}
