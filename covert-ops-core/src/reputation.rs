//! Faction ledgers and the score → reputation level mapping.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::items::ItemContainer;

/// Discrete reputation tier, `Hated` (0) through `Ally` (6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationLevel {
    Hated,
    Hostile,
    Unfriendly,
    #[default]
    Neutral,
    Friendly,
    Honored,
    Ally,
}

impl ReputationLevel {
    pub const NEUTRAL_NAME: &'static str = "STR_NEUTRAL";

    /// Level for a rules level name; unknown names resolve to neutral.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "STR_ALLY" => Self::Ally,
            "STR_HONORED" => Self::Honored,
            "STR_FRIENDLY" => Self::Friendly,
            "STR_UNFRIENDLY" => Self::Unfriendly,
            "STR_HOSTILE" => Self::Hostile,
            "STR_HATED" => Self::Hated,
            _ => Self::Neutral,
        }
    }

    #[must_use]
    pub const fn as_index(self) -> u8 {
        self as u8
    }
}

/// One diplomatic actor tracked by the campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub name: String,
    pub reputation_score: i32,
    reputation_level: ReputationLevel,
    reputation_name: String,
    #[serde(default)]
    pub funds: i64,
    #[serde(default)]
    pub items: ItemContainer,
    #[serde(default)]
    pub staff: ItemContainer,
    #[serde(default)]
    pub researched: BTreeSet<String>,
    #[serde(default)]
    pub discovered: bool,
    #[serde(default)]
    pub discovered_this_month: bool,
    /// Set once the level changed during the current month.
    #[serde(default)]
    level_changed_this_period: bool,
}

impl Faction {
    #[must_use]
    pub fn new(name: impl Into<String>, reputation_score: i32) -> Self {
        Self {
            name: name.into(),
            reputation_score,
            reputation_level: ReputationLevel::Neutral,
            reputation_name: ReputationLevel::NEUTRAL_NAME.to_string(),
            funds: 0,
            items: ItemContainer::new(),
            staff: ItemContainer::new(),
            researched: BTreeSet::new(),
            discovered: false,
            discovered_this_month: false,
            level_changed_this_period: false,
        }
    }

    #[must_use]
    pub const fn reputation_level(&self) -> ReputationLevel {
        self.reputation_level
    }

    #[must_use]
    pub fn reputation_name(&self) -> &str {
        &self.reputation_name
    }

    #[must_use]
    pub const fn level_changed_this_period(&self) -> bool {
        self.level_changed_this_period
    }

    /// Clear the per-month flags at month rollover.
    pub fn start_new_period(&mut self) {
        self.discovered_this_month = false;
        self.level_changed_this_period = false;
    }
}

/// Re-derive a faction's level from its score.
///
/// The highest threshold not above the score names the level. A new level is
/// applied only when it differs from the current one, the faction was not
/// discovered this month, and the level has not already moved this period;
/// `initial` bypasses every gate. Returns whether a non-initial change happened.
pub fn update_reputation_level(
    faction: &mut Faction,
    levels: &BTreeMap<i32, String>,
    initial: bool,
) -> bool {
    if levels.is_empty() {
        return false;
    }
    let name = levels
        .range(..=faction.reputation_score)
        .next_back()
        .map_or(ReputationLevel::NEUTRAL_NAME, |(_, name)| name.as_str());
    let level = ReputationLevel::from_name(name);

    let gated = faction.discovered_this_month || faction.level_changed_this_period;
    if initial || (level != faction.reputation_level && !gated) {
        faction.reputation_level = level;
        faction.reputation_name = name.to_string();
        if !initial {
            faction.level_changed_this_period = true;
            log::debug!(
                "faction {} reputation level -> {:?} (score {})",
                faction.name,
                level,
                faction.reputation_score
            );
            return true;
        }
    }
    false
}

/// Add `delta` to the first faction named `name` and re-derive its level.
/// Returns false when no such faction exists. A zero delta changes nothing.
pub fn apply_reputation_delta(
    factions: &mut [Faction],
    name: &str,
    delta: i32,
    levels: &BTreeMap<i32, String>,
) -> bool {
    let Some(faction) = factions.iter_mut().find(|faction| faction.name == name) else {
        return false;
    };
    if delta != 0 {
        faction.reputation_score = faction.reputation_score.saturating_add(delta);
        update_reputation_level(faction, levels, false);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> BTreeMap<i32, String> {
        [
            (i32::MIN, "STR_HATED"),
            (-500, "STR_HOSTILE"),
            (-100, "STR_UNFRIENDLY"),
            (0, "STR_NEUTRAL"),
            (100, "STR_FRIENDLY"),
            (500, "STR_HONORED"),
            (1000, "STR_ALLY"),
        ]
        .into_iter()
        .map(|(score, name)| (score, name.to_string()))
        .collect()
    }

    #[test]
    fn picks_highest_threshold_not_above_score() {
        let mut faction = Faction::new("STR_CARTEL", 120);
        assert!(update_reputation_level(&mut faction, &levels(), false));
        assert_eq!(faction.reputation_level(), ReputationLevel::Friendly);
        assert_eq!(faction.reputation_name(), "STR_FRIENDLY");

        let mut exact = Faction::new("STR_CARTEL", 1000);
        update_reputation_level(&mut exact, &levels(), true);
        assert_eq!(exact.reputation_level(), ReputationLevel::Ally);
    }

    #[test]
    fn score_below_every_threshold_is_neutral() {
        let table: BTreeMap<i32, String> = [(10, "STR_ALLY".to_string())].into_iter().collect();
        let mut faction = Faction::new("STR_CARTEL", -40);
        update_reputation_level(&mut faction, &table, true);
        assert_eq!(faction.reputation_level(), ReputationLevel::Neutral);
        assert_eq!(faction.reputation_name(), "STR_NEUTRAL");
    }

    #[test]
    fn discovered_this_month_blocks_changes_unless_initial() {
        let mut faction = Faction::new("STR_CARTEL", -600);
        faction.discovered_this_month = true;
        assert!(!update_reputation_level(&mut faction, &levels(), false));
        assert_eq!(faction.reputation_level(), ReputationLevel::Neutral);

        assert!(!update_reputation_level(&mut faction, &levels(), true));
        assert_eq!(faction.reputation_level(), ReputationLevel::Hostile);
    }

    #[test]
    fn level_moves_at_most_once_per_period() {
        let mut faction = Faction::new("STR_CARTEL", 150);
        assert!(update_reputation_level(&mut faction, &levels(), false));
        faction.reputation_score = 700;
        assert!(!update_reputation_level(&mut faction, &levels(), false));
        assert_eq!(faction.reputation_level(), ReputationLevel::Friendly);

        faction.start_new_period();
        assert!(update_reputation_level(&mut faction, &levels(), false));
        assert_eq!(faction.reputation_level(), ReputationLevel::Honored);
    }

    #[test]
    fn zero_delta_is_a_no_op() {
        let mut factions = vec![Faction::new("STR_CARTEL", 99)];
        update_reputation_level(&mut factions[0], &levels(), true);
        let before = factions[0].clone();
        assert!(apply_reputation_delta(&mut factions, "STR_CARTEL", 0, &levels()));
        assert_eq!(factions[0], before);
        assert!(!apply_reputation_delta(&mut factions, "STR_NOBODY", 5, &levels()));
    }

    #[test]
    fn delta_applies_to_first_match_only() {
        let mut factions = vec![
            Faction::new("STR_CARTEL", 0),
            Faction::new("STR_CARTEL", 0),
        ];
        apply_reputation_delta(&mut factions, "STR_CARTEL", 150, &levels());
        assert_eq!(factions[0].reputation_score, 150);
        assert_eq!(factions[0].reputation_level(), ReputationLevel::Friendly);
        assert_eq!(factions[1].reputation_score, 0);
    }
}
