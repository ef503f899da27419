//! Rules repository: immutable content definitions keyed by string identifiers.
//!
//! Every lookup that the resolvers depend on returns a [`RulesError`] when
//! the identifier is missing. A missing rule means the content pack is
//! broken, so callers propagate the error instead of defaulting.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::reputation::ReputationLevel;
use crate::scripts::ProcessorSource;
use crate::soldier::{RankSpriteTable, Soldier};
use crate::stats::StatBlock;
use crate::weights::{MonthlyWeights, WeightedOptions};

const BUNDLED_RULES: &str = include_str!("../assets/rules.json");

/// Fatal content errors: a rule referenced by name does not exist.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("covert operation `{0}` is not defined")]
    UnknownOperation(String),
    #[error("{context}: alien mission `{mission}` is not defined")]
    UnknownMission { context: String, mission: String },
    #[error("{context}: region `{region}` is not defined")]
    UnknownRegion { context: String, region: String },
    #[error("alien mission `{mission}`: no regions are defined to place it in")]
    NoRegions { mission: String },
    #[error("alien mission `{mission}`: race `{race}` is not defined")]
    UnknownRace { mission: String, race: String },
    #[error("covert operation `{operation}`: deployment `{deployment}` is not defined")]
    UnknownDeployment {
        operation: String,
        deployment: String,
    },
    #[error("{context}: research `{research}` is not defined")]
    UnknownResearch { context: String, research: String },
    #[error("{context}: event `{event}` is not defined")]
    UnknownEvent { context: String, event: String },
    #[error("{context}: item `{item}` is not defined")]
    UnknownItem { context: String, item: String },
    #[error("event script `{0}` is not defined")]
    UnknownEventScript(String),
    #[error("{context}: faction `{faction}` is not defined")]
    UnknownFaction { context: String, faction: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRegion {
    pub name: String,
    #[serde(default)]
    pub mission_zones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAlienMission {
    pub name: String,
    #[serde(default)]
    pub region_weights: MonthlyWeights,
    #[serde(default)]
    pub race_weights: MonthlyWeights,
    /// Index of the mission zone the mission spawns into.
    #[serde(default)]
    pub spawn_zone: usize,
    /// Percent chance the mission prefers a region holding a friendly base.
    #[serde(default)]
    pub target_base_odds: i32,
    /// Research topic whose discovery interrupts this mission.
    #[serde(default)]
    pub interrupt_research: Option<String>,
}

impl RuleAlienMission {
    #[must_use]
    pub fn has_region_weights(&self) -> bool {
        !self.region_weights.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResearch {
    pub name: String,
    #[serde(default)]
    pub lookup: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    /// Bonus topics granted for free alongside this one.
    #[serde(default)]
    pub get_one_free: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFaction {
    pub name: String,
    #[serde(default)]
    pub starting_reputation: i32,
    #[serde(default)]
    pub starting_funds: i64,
    #[serde(default)]
    pub starting_items: BTreeMap<String, i32>,
    #[serde(default)]
    pub starting_staff: BTreeMap<String, i32>,
    #[serde(default)]
    pub starting_research: Vec<String>,
    #[serde(default)]
    pub discover_research: Option<String>,
}

/// Reward or penalty bundle attached to one branch of an operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleOutcomeBranch {
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub loyalty: i32,
    #[serde(default)]
    pub funds: i64,
    #[serde(default)]
    pub items: BTreeMap<String, i32>,
    /// One item drawn from this table is added on top of `items`.
    #[serde(default)]
    pub weighted_item: WeightedOptions,
    /// Candidate topics; the first not yet researched one is unlocked.
    #[serde(default)]
    pub research: Vec<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub reputation: BTreeMap<String, i32>,
    /// Follow-on alien mission types.
    #[serde(default)]
    pub missions: WeightedOptions,
    /// Follow-on tactical deployments (instant deployment on success, trap on failure).
    #[serde(default)]
    pub deployments: WeightedOptions,
}

/// Skill tags that grant role-specific experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    Investigation,
    Infiltration,
    Negotiation,
    Deception,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCovertOperation {
    pub name: String,
    /// Base cost rating; drives the experience budget of background simulation.
    #[serde(default)]
    pub costs: i32,
    #[serde(default)]
    pub danger: i32,
    #[serde(default)]
    pub trap_chance: i32,
    #[serde(default)]
    pub categories: Vec<OperationCategory>,
    #[serde(default)]
    pub progress_events: WeightedOptions,
    #[serde(default)]
    pub progress_event_chance: i32,
    #[serde(default)]
    pub repeat_progress_event: bool,
    #[serde(default)]
    pub required_items: BTreeMap<String, i32>,
    #[serde(default)]
    pub remove_required_items_on_success: bool,
    #[serde(default)]
    pub remove_required_items_on_failure: bool,
    #[serde(default)]
    pub success: RuleOutcomeBranch,
    #[serde(default)]
    pub failure: RuleOutcomeBranch,
    /// Alien base deployment whose bases are revealed when the operation resolves.
    #[serde(default)]
    pub reveal_alien_base: Option<String>,
}

impl RuleCovertOperation {
    #[must_use]
    pub fn has_category(&self, category: OperationCategory) -> bool {
        self.categories.contains(&category)
    }
}

/// Campaign-level event script evaluated by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEventScript {
    pub name: String,
    #[serde(default)]
    pub processor: ProcessorSource,
    #[serde(default)]
    pub first_month: u32,
    #[serde(default)]
    pub last_month: Option<u32>,
    #[serde(default = "min_i64")]
    pub min_score: i64,
    #[serde(default = "max_i64")]
    pub max_score: i64,
    #[serde(default = "min_i64")]
    pub min_loyalty: i64,
    #[serde(default = "max_i64")]
    pub max_loyalty: i64,
    #[serde(default = "min_i64")]
    pub min_funds: i64,
    #[serde(default = "max_i64")]
    pub max_funds: i64,
    #[serde(default)]
    pub min_difficulty: u8,
    #[serde(default = "max_difficulty")]
    pub max_difficulty: u8,
    #[serde(default)]
    pub research_triggers: BTreeMap<String, bool>,
    /// Satisfied when any listed faction has at least the given level.
    #[serde(default)]
    pub reputation_requirements: BTreeMap<String, ReputationLevel>,
    #[serde(default)]
    pub counter_min: i32,
    #[serde(default)]
    pub counter_max: Option<i32>,
    /// Alien strategy counter (missions run of a type).
    #[serde(default)]
    pub mission_var_name: Option<String>,
    /// Id marker counter (last id issued for a marker).
    #[serde(default)]
    pub mission_marker_name: Option<String>,
    #[serde(default)]
    pub item_triggers: BTreeMap<String, bool>,
    #[serde(default)]
    pub facility_triggers: BTreeMap<String, bool>,
    #[serde(default)]
    pub base_in_region_triggers: BTreeMap<String, bool>,
    #[serde(default)]
    pub base_in_country_triggers: BTreeMap<String, bool>,
    #[serde(default)]
    pub one_time_sequential_events: Vec<String>,
    #[serde(default)]
    pub one_time_random_events: WeightedOptions,
    #[serde(default)]
    pub random_events: MonthlyWeights,
    #[serde(default)]
    pub spawn_gap: i32,
    #[serde(default)]
    pub random_spawn_gap: i32,
}

const fn min_i64() -> i64 {
    i64::MIN
}

const fn max_i64() -> i64 {
    i64::MAX
}

const fn max_difficulty() -> u8 {
    u8::MAX
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSoldier {
    pub name: String,
    pub stat_caps: StatBlock,
    #[serde(default)]
    pub rank_sprites: RankSpriteTable,
}

/// Percent coefficients applied to score before it moves loyalty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltyCoefficients {
    pub battlescape: f64,
    pub dogfight: f64,
    pub geoscape: f64,
    pub research: f64,
    pub alien_mission: f64,
    pub ufo: f64,
    pub alien_base: f64,
}

impl Default for LoyaltyCoefficients {
    fn default() -> Self {
        Self {
            battlescape: 100.0,
            dogfight: 100.0,
            geoscape: 100.0,
            research: 100.0,
            alien_mission: 100.0,
            ufo: 100.0,
            alien_base: 100.0,
        }
    }
}

/// Base created for a fresh campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartingBase {
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default)]
    pub items: BTreeMap<String, i32>,
    #[serde(default)]
    pub soldiers: Vec<Soldier>,
    #[serde(default)]
    pub training_capacity: u32,
    #[serde(default)]
    pub psi_lab_capacity: u32,
}

/// Alien base present at campaign start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingAlienBase {
    pub deployment: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub regions: Vec<RuleRegion>,
    #[serde(default)]
    pub missions: Vec<RuleAlienMission>,
    #[serde(default)]
    pub races: Vec<String>,
    /// Race substituted when a mission's race table resolves to nothing.
    #[serde(default)]
    pub fallback_race: Option<String>,
    #[serde(default)]
    pub deployments: Vec<String>,
    #[serde(default)]
    pub research: Vec<RuleResearch>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub factions: Vec<RuleFaction>,
    #[serde(default)]
    pub operations: Vec<RuleCovertOperation>,
    #[serde(default)]
    pub event_scripts: Vec<RuleEventScript>,
    #[serde(default)]
    pub soldiers: Vec<RuleSoldier>,
    #[serde(default = "RuleSet::default_stat_caps")]
    pub default_stat_caps: StatBlock,
    /// Minimum reputation score → level name (`STR_HATED` … `STR_ALLY`).
    #[serde(default)]
    pub reputation_levels: BTreeMap<i32, String>,
    #[serde(default = "RuleSet::default_exp_factor")]
    pub covert_ops_exp_factor: i32,
    #[serde(default)]
    pub mana_training_primary: bool,
    #[serde(default)]
    pub mana_training_secondary: bool,
    #[serde(default)]
    pub allow_psi_strength_improvement: bool,
    #[serde(default)]
    pub anytime_psi_training: bool,
    #[serde(default)]
    pub loyalty: LoyaltyCoefficients,
    /// Starting funds in thousands.
    #[serde(default)]
    pub initial_funding: i64,
    #[serde(default)]
    pub starting_base: Option<StartingBase>,
    #[serde(default)]
    pub starting_alien_bases: Vec<StartingAlienBase>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            missions: Vec::new(),
            races: Vec::new(),
            fallback_race: None,
            deployments: Vec::new(),
            research: Vec::new(),
            events: Vec::new(),
            items: Vec::new(),
            factions: Vec::new(),
            operations: Vec::new(),
            event_scripts: Vec::new(),
            soldiers: Vec::new(),
            default_stat_caps: Self::default_stat_caps(),
            reputation_levels: BTreeMap::new(),
            covert_ops_exp_factor: Self::default_exp_factor(),
            mana_training_primary: false,
            mana_training_secondary: false,
            allow_psi_strength_improvement: false,
            anytime_psi_training: false,
            loyalty: LoyaltyCoefficients::default(),
            initial_funding: 0,
            starting_base: None,
            starting_alien_bases: Vec::new(),
        }
    }
}

impl RuleSet {
    fn default_stat_caps() -> StatBlock {
        StatBlock::splat(100)
    }

    const fn default_exp_factor() -> i32 {
        100
    }

    /// Load rules from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a rule set.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sample rules bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled asset fails to parse.
    pub fn bundled() -> Result<Self, serde_json::Error> {
        Self::from_json(BUNDLED_RULES)
    }

    /// Look up a covert operation rule.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::UnknownOperation`] when no rule has that name.
    pub fn operation(&self, name: &str) -> Result<&RuleCovertOperation, RulesError> {
        self.operations
            .iter()
            .find(|rule| rule.name == name)
            .ok_or_else(|| RulesError::UnknownOperation(name.to_string()))
    }

    /// Look up an alien mission rule on behalf of `context`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::UnknownMission`] when no rule has that name.
    pub fn mission(&self, context: &str, name: &str) -> Result<&RuleAlienMission, RulesError> {
        self.missions
            .iter()
            .find(|rule| rule.name == name)
            .ok_or_else(|| RulesError::UnknownMission {
                context: context.to_string(),
                mission: name.to_string(),
            })
    }

    /// Look up a region rule on behalf of `context`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::UnknownRegion`] when no region has that name.
    pub fn region(&self, context: &str, name: &str) -> Result<&RuleRegion, RulesError> {
        self.regions
            .iter()
            .find(|rule| rule.name == name)
            .ok_or_else(|| RulesError::UnknownRegion {
                context: context.to_string(),
                region: name.to_string(),
            })
    }

    #[must_use]
    pub fn has_race(&self, name: &str) -> bool {
        self.races.iter().any(|race| race == name)
    }

    #[must_use]
    pub fn has_deployment(&self, name: &str) -> bool {
        self.deployments.iter().any(|deployment| deployment == name)
    }

    #[must_use]
    pub fn has_item(&self, name: &str) -> bool {
        self.items.iter().any(|item| item == name)
    }

    #[must_use]
    pub fn has_event(&self, name: &str) -> bool {
        self.events.iter().any(|event| event == name)
    }

    /// Require that an event exists.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::UnknownEvent`] when no event has that name.
    pub fn require_event(&self, context: &str, name: &str) -> Result<(), RulesError> {
        if self.has_event(name) {
            Ok(())
        } else {
            Err(RulesError::UnknownEvent {
                context: context.to_string(),
                event: name.to_string(),
            })
        }
    }

    /// Look up a research rule on behalf of `context`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::UnknownResearch`] when no topic has that name.
    pub fn research(&self, context: &str, name: &str) -> Result<&RuleResearch, RulesError> {
        self.research
            .iter()
            .find(|rule| rule.name == name)
            .ok_or_else(|| RulesError::UnknownResearch {
                context: context.to_string(),
                research: name.to_string(),
            })
    }

    /// Look up an event script rule.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::UnknownEventScript`] when no script has that name.
    pub fn event_script(&self, name: &str) -> Result<&RuleEventScript, RulesError> {
        self.event_scripts
            .iter()
            .find(|rule| rule.name == name)
            .ok_or_else(|| RulesError::UnknownEventScript(name.to_string()))
    }

    #[must_use]
    pub fn faction(&self, name: &str) -> Option<&RuleFaction> {
        self.factions.iter().find(|rule| rule.name == name)
    }

    fn require_faction(&self, context: &str, name: &str) -> Result<(), RulesError> {
        if self.faction(name).is_some() {
            Ok(())
        } else {
            Err(RulesError::UnknownFaction {
                context: context.to_string(),
                faction: name.to_string(),
            })
        }
    }

    /// Stat caps of a soldier type, or the default caps for unknown types.
    #[must_use]
    pub fn stat_caps(&self, soldier_kind: &str) -> StatBlock {
        self.soldiers
            .iter()
            .find(|rule| rule.name == soldier_kind)
            .map_or(self.default_stat_caps, |rule| rule.stat_caps)
    }

    pub fn region_names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|region| region.name.as_str())
    }

    /// Check every cross reference between rules.
    ///
    /// # Errors
    ///
    /// Returns the first dangling reference found.
    pub fn validate(&self) -> Result<(), RulesError> {
        for mission in &self.missions {
            for region in mission.region_weights.all_names() {
                self.region(&mission.name, region)?;
            }
            for race in mission.race_weights.all_names() {
                if !self.has_race(race) {
                    return Err(RulesError::UnknownRace {
                        mission: mission.name.clone(),
                        race: race.to_string(),
                    });
                }
            }
            if let Some(topic) = &mission.interrupt_research {
                self.research(&mission.name, topic)?;
            }
        }
        if let Some(race) = &self.fallback_race
            && !self.has_race(race)
        {
            return Err(RulesError::UnknownRace {
                mission: String::from("fallback"),
                race: race.clone(),
            });
        }
        for research in &self.research {
            for linked in research.lookup.iter().chain(&research.get_one_free) {
                self.research(&research.name, linked)?;
            }
        }
        for operation in &self.operations {
            self.validate_operation(operation)?;
        }
        for script in &self.event_scripts {
            let events = script
                .one_time_sequential_events
                .iter()
                .map(String::as_str)
                .chain(script.one_time_random_events.names())
                .chain(script.random_events.all_names());
            for event in events {
                self.require_event(&script.name, event)?;
            }
            for faction in script.reputation_requirements.keys() {
                self.require_faction(&script.name, faction)?;
            }
        }
        Ok(())
    }

    fn validate_operation(&self, operation: &RuleCovertOperation) -> Result<(), RulesError> {
        let context = operation.name.as_str();
        if let Some(deployment) = &operation.reveal_alien_base
            && !self.has_deployment(deployment)
        {
            return Err(RulesError::UnknownDeployment {
                operation: context.to_string(),
                deployment: deployment.clone(),
            });
        }
        for event in operation.progress_events.names() {
            self.require_event(context, event)?;
        }
        for branch in [&operation.success, &operation.failure] {
            for mission in branch.missions.names() {
                self.mission(context, mission)?;
            }
            for deployment in branch.deployments.names() {
                if !self.has_deployment(deployment) {
                    return Err(RulesError::UnknownDeployment {
                        operation: context.to_string(),
                        deployment: deployment.to_string(),
                    });
                }
            }
            for topic in &branch.research {
                self.research(context, topic)?;
            }
            let items = branch
                .items
                .keys()
                .map(String::as_str)
                .chain(branch.weighted_item.names());
            for item in items {
                if !self.has_item(item) {
                    return Err(RulesError::UnknownItem {
                        context: context.to_string(),
                        item: item.to_string(),
                    });
                }
            }
            if let Some(event) = &branch.event {
                self.require_event(context, event)?;
            }
            for faction in branch.reputation.keys() {
                self.require_faction(context, faction)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_rules_parse_and_validate() {
        let rules = RuleSet::bundled().expect("bundled rules parse");
        assert!(!rules.operations.is_empty());
        assert!(!rules.regions.is_empty());
        rules.validate().expect("bundled rules are consistent");
    }

    #[test]
    fn missing_fields_use_defaults() {
        let rules = RuleSet::from_json("{}").expect("deserialize");
        assert_eq!(rules, RuleSet::default());
        assert_eq!(rules.covert_ops_exp_factor, 100);
        rules.validate().expect("empty rules are valid");
    }

    #[test]
    fn dangling_follow_on_mission_is_reported() {
        let json = r#"{
            "operations": [
                { "name": "STR_OP", "success": { "missions": { "STR_GHOST": 1 } } }
            ]
        }"#;
        let rules = RuleSet::from_json(json).expect("deserialize");
        assert_eq!(
            rules.validate(),
            Err(RulesError::UnknownMission {
                context: String::from("STR_OP"),
                mission: String::from("STR_GHOST"),
            })
        );
    }

    #[test]
    fn unknown_soldier_kind_uses_default_caps() {
        let rules = RuleSet::default();
        assert_eq!(rules.stat_caps("STR_NOBODY"), StatBlock::splat(100));
    }

    #[test]
    fn operation_lookup_reports_name() {
        let rules = RuleSet::default();
        let err = rules.operation("STR_MISSING").unwrap_err();
        assert_eq!(err.to_string(), "covert operation `STR_MISSING` is not defined");
    }
}
