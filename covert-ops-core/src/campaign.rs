//! Persisted campaign state and the context object handed to every resolver.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::base::Base;
use crate::battle::BattleRequest;
use crate::constants::{
    DAYS_PER_MONTH, INITIAL_FUNDS_JITTER_MAX, INITIAL_FUNDS_JITTER_MIN, INITIAL_FUNDS_SCALE,
};
use crate::difficulty::Difficulty;
use crate::mission::{AlienBase, AlienMission};
use crate::operation::OperationReport;
use crate::reputation::{Faction, update_reputation_level};
use crate::rng::{RngCursor, RollExt};
use crate::rules::{RuleSet, RulesError};
use crate::soldier::Soldier;

const ALIEN_BASE_ID_KEY: &str = "ALIEN_BASES";

/// Geoscape event spawned by an operation or an event script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoscapeEvent {
    pub name: String,
    pub day: u32,
}

/// Soldier killed during background simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallenSoldier {
    pub soldier: Soldier,
    pub base: String,
    pub operation: String,
    pub day: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CampaignState {
    /// Seed the campaign's random streams are derived from.
    #[serde(default)]
    pub seed: u64,
    /// Where each random stream stood when the state was last synced.
    #[serde(default)]
    pub rng_cursor: RngCursor,
    /// Days elapsed since the campaign started.
    pub day: u32,
    pub difficulty: Difficulty,
    pub funds: i64,
    pub loyalty: i64,
    /// Score earned per month, indexed by month.
    #[serde(default)]
    monthly_scores: Vec<i64>,
    #[serde(default)]
    pub factions: Vec<Faction>,
    #[serde(default)]
    pub bases: Vec<Base>,
    #[serde(default)]
    pub missions: Vec<AlienMission>,
    #[serde(default)]
    pub alien_bases: Vec<AlienBase>,
    #[serde(default)]
    pub researched: BTreeSet<String>,
    /// Every event ever spawned; one-time events never repeat.
    #[serde(default)]
    pub generated_events: BTreeSet<String>,
    #[serde(default)]
    pub active_events: Vec<GeoscapeEvent>,
    /// Remaining cooldown days per event script.
    #[serde(default)]
    pub script_gaps: BTreeMap<String, i32>,
    #[serde(default)]
    ids: BTreeMap<String, u32>,
    /// Alien missions spawned per mission type.
    #[serde(default)]
    pub missions_run: BTreeMap<String, i32>,
    #[serde(default)]
    pub fallen: Vec<FallenSoldier>,
    #[serde(default)]
    pub pending_battles: Vec<BattleRequest>,
    #[serde(default)]
    pub reports: Vec<OperationReport>,
}

impl CampaignState {
    /// Build a fresh campaign from rules.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] when the starting base or starting alien bases
    /// reference undefined regions or deployments.
    pub fn new_campaign<R: Rng + ?Sized>(
        rules: &RuleSet,
        rng: &mut R,
        difficulty: Difficulty,
    ) -> Result<Self, RulesError> {
        let mut state = Self {
            difficulty,
            ..Self::default()
        };

        for rule in &rules.factions {
            let mut faction = Faction::new(rule.name.clone(), rule.starting_reputation);
            faction.funds = rule.starting_funds;
            for (item, qty) in &rule.starting_items {
                faction.items.add(item, *qty);
            }
            for (staff, qty) in &rule.starting_staff {
                faction.staff.add(staff, *qty);
            }
            faction.researched.extend(rule.starting_research.iter().cloned());
            faction.discovered = rule
                .discover_research
                .as_ref()
                .is_none_or(|topic| state.researched.contains(topic));
            update_reputation_level(&mut faction, &rules.reputation_levels, true);
            state.factions.push(faction);
        }

        let jitter = rng.roll_range(INITIAL_FUNDS_JITTER_MIN, INITIAL_FUNDS_JITTER_MAX);
        state.funds = rules.initial_funding * INITIAL_FUNDS_SCALE + i64::from(jitter);

        if let Some(start) = &rules.starting_base {
            rules.region("starting base", &start.region)?;
            let mut base = Base::new(start.name.clone(), start.region.clone());
            base.country.clone_from(&start.country);
            base.facilities.clone_from(&start.facilities);
            for (item, qty) in &start.items {
                base.storage.add(item, *qty);
            }
            base.soldiers.clone_from(&start.soldiers);
            base.training_capacity = start.training_capacity;
            base.psi_lab_capacity = start.psi_lab_capacity;
            state.bases.push(base);
        }

        for start in &rules.starting_alien_bases {
            if !rules.has_deployment(&start.deployment) {
                return Err(RulesError::UnknownDeployment {
                    operation: String::from("starting alien base"),
                    deployment: start.deployment.clone(),
                });
            }
            rules.region("starting alien base", &start.region)?;
            let id = state.next_id(ALIEN_BASE_ID_KEY);
            state.alien_bases.push(AlienBase {
                id,
                deployment: start.deployment.clone(),
                region: start.region.clone(),
                discovered: false,
            });
        }

        Ok(state)
    }

    /// Months elapsed since the campaign started.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.day / DAYS_PER_MONTH
    }

    #[must_use]
    pub fn current_score(&self) -> i64 {
        self.monthly_scores
            .get(self.month() as usize)
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn monthly_scores(&self) -> &[i64] {
        &self.monthly_scores
    }

    pub fn add_score(&mut self, score: i32) {
        let month = self.month() as usize;
        if self.monthly_scores.len() <= month {
            self.monthly_scores.resize(month + 1, 0);
        }
        self.monthly_scores[month] += i64::from(score);
    }

    /// Open a new month's ledgers.
    pub fn begin_month(&mut self) {
        let month = self.month() as usize;
        if self.monthly_scores.len() <= month {
            self.monthly_scores.resize(month + 1, 0);
        }
        for faction in &mut self.factions {
            faction.start_new_period();
        }
    }

    /// Issue the next id for `key`, starting at 1.
    pub fn next_id(&mut self, key: &str) -> u32 {
        let next = self.ids.entry(key.to_string()).or_insert(1);
        let id = *next;
        *next = next.saturating_add(1);
        id
    }

    /// Last id issued for `key`, 0 when none was issued yet.
    #[must_use]
    pub fn last_id(&self, key: &str) -> i32 {
        self.ids
            .get(key)
            .map_or(0, |next| i32::try_from(next.saturating_sub(1)).unwrap_or(i32::MAX))
    }

    #[must_use]
    pub fn is_researched(&self, topic: &str) -> bool {
        self.researched.contains(topic)
    }

    /// Mark a topic researched; returns false when it already was.
    pub fn add_research(&mut self, topic: &str) -> bool {
        self.researched.insert(topic.to_string())
    }

    #[must_use]
    pub fn base(&self, name: &str) -> Option<&Base> {
        self.bases.iter().find(|base| base.name == name)
    }

    pub fn base_mut(&mut self, name: &str) -> Option<&mut Base> {
        self.bases.iter_mut().find(|base| base.name == name)
    }

    #[must_use]
    pub fn is_item_obtained(&self, item: &str) -> bool {
        self.bases.iter().any(|base| base.storage.count(item) > 0)
    }

    #[must_use]
    pub fn is_facility_built(&self, facility: &str) -> bool {
        self.bases.iter().any(|base| base.has_facility(facility))
    }

    /// Activate an event. Returns false when the same event is already active.
    pub fn spawn_event(&mut self, name: &str) -> bool {
        if self.active_events.iter().any(|event| event.name == name) {
            return false;
        }
        self.active_events.push(GeoscapeEvent {
            name: name.to_string(),
            day: self.day,
        });
        self.generated_events.insert(name.to_string());
        true
    }

    #[must_use]
    pub fn was_event_generated(&self, name: &str) -> bool {
        self.generated_events.contains(name)
    }

    #[must_use]
    pub fn is_script_gapped(&self, script: &str) -> bool {
        self.script_gaps.get(script).is_some_and(|days| *days > 0)
    }

    /// Count every script cooldown down by one day.
    pub fn tick_script_gaps(&mut self) {
        for days in self.script_gaps.values_mut() {
            *days -= 1;
        }
        self.script_gaps.retain(|_, days| *days > 0);
    }

    /// Remove a soldier from their base and record them as fallen.
    pub fn kill_soldier(&mut self, base: &str, soldier_id: u32, operation: &str) -> bool {
        let day = self.day;
        let Some(soldier) = self
            .base_mut(base)
            .and_then(|base| base.remove_soldier(soldier_id))
        else {
            return false;
        };
        log::debug!("soldier {} fell during {operation}", soldier.name);
        self.fallen.push(FallenSoldier {
            soldier,
            base: base.to_string(),
            operation: operation.to_string(),
            day,
        });
        true
    }
}

/// Everything a resolver may touch: the campaign, its rules and the RNG stream.
pub struct CampaignContext<'a, R: Rng + ?Sized> {
    pub state: &'a mut CampaignState,
    pub rules: &'a RuleSet,
    pub rng: &'a mut R,
}

impl<'a, R: Rng + ?Sized> CampaignContext<'a, R> {
    pub fn new(state: &'a mut CampaignState, rules: &'a RuleSet, rng: &'a mut R) -> Self {
        Self { state, rules, rng }
    }
}
