//! Covert operations: the player-committed record, its results snapshot and
//! the commit path that stages soldiers and required items.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::campaign::CampaignState;
use crate::items::ItemContainer;
use crate::mission::MissionPlacement;
use crate::rules::{RuleSet, RulesError};
use crate::stats::StatBlock;

const OPERATION_ID_KEY: &str = "COVERT_OPERATIONS";
const HOURS_PER_DAY: i32 = 24;

/// Player command errors raised while committing an operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error("base `{0}` does not exist")]
    UnknownBase(String),
    #[error("soldier {0} is not stationed at the base")]
    UnknownSoldier(u32),
    #[error("soldier {soldier} is already assigned to operation {operation}")]
    SoldierBusy { soldier: u32, operation: u32 },
    #[error("operation needs at least one soldier")]
    NoSoldiers,
    #[error("operation needs {required} x {item} but the base stores {available}")]
    MissingItems {
        item: String,
        required: i32,
        available: i32,
    },
}

/// Lifecycle phase derived from the operation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    Active,
    /// Resolved into a battle that has not reported back yet.
    AwaitingBattle,
    /// Resolved; cleaned up on the next tick.
    Done,
}

/// Success odds band shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsName {
    Great,
    Good,
    Average,
    Poor,
    VeryLow,
    None,
}

impl OddsName {
    #[must_use]
    pub const fn from_chance(chance: i32) -> Self {
        if chance > 100 {
            Self::Great
        } else if chance > 70 {
            Self::Good
        } else if chance > 50 {
            Self::Average
        } else if chance > 25 {
            Self::Poor
        } else if chance > 0 {
            Self::VeryLow
        } else {
            Self::None
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Great => "STR_GREAT",
            Self::Good => "STR_GOOD",
            Self::Average => "STR_AVERAGE",
            Self::Poor => "STR_POOR",
            Self::VeryLow => "STR_VERY_LOW",
            Self::None => "STR_NONE",
        }
    }
}

/// Rough time remaining shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeLeftName {
    SeveralMonths,
    AMonth,
    SeveralWeeks,
    Week,
    SeveralDays,
}

impl TimeLeftName {
    #[must_use]
    pub const fn from_days(days: i32) -> Self {
        let hours = days.saturating_mul(HOURS_PER_DAY);
        if hours > 45 * HOURS_PER_DAY {
            Self::SeveralMonths
        } else if hours > 20 * HOURS_PER_DAY {
            Self::AMonth
        } else if hours > 10 * HOURS_PER_DAY {
            Self::SeveralWeeks
        } else if hours > 6 * HOURS_PER_DAY {
            Self::Week
        } else {
            Self::SeveralDays
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SeveralMonths => "STR_SEVERAL_MONTHS",
            Self::AMonth => "STR_A_MONTH",
            Self::SeveralWeeks => "STR_SEVERAL_WEEKS",
            Self::Week => "STR_WEEK",
            Self::SeveralDays => "STR_SEVERAL_DAYS",
        }
    }
}

/// What background simulation did to one soldier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoldierFate {
    Wounded(i32),
    /// Every participant was doomed; this one was spared with heavy damage.
    LastSurvivor(i32),
    Killed,
}

impl fmt::Display for SoldierFate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wounded(days) => write!(f, "wounded ({days} days)"),
            Self::LastSurvivor(days) => write!(f, "last survivor ({days} days)"),
            Self::Killed => f.write_str("killed"),
        }
    }
}

/// Snapshot of everything a resolution changed, produced once per operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationResults {
    pub operation: String,
    pub day: u32,
    pub roll: i32,
    pub success: bool,
    pub critical_failure: bool,
    pub score: i32,
    pub loyalty_change: i64,
    pub funds: i64,
    #[serde(default)]
    pub items: BTreeMap<String, i32>,
    #[serde(default)]
    pub reputation: BTreeMap<String, i32>,
    /// Name of the unlocked topic (its lookup when it has one).
    #[serde(default)]
    pub research: Option<String>,
    #[serde(default)]
    pub special_message: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub mission: Option<MissionPlacement>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub battle_requested: bool,
    #[serde(default)]
    pub soldier_fates: BTreeMap<u32, SoldierFate>,
    #[serde(default)]
    pub improvements: BTreeMap<u32, StatBlock>,
}

impl OperationResults {
    pub(crate) fn add_item(&mut self, item: &str, qty: i32) {
        *self.items.entry(item.to_string()).or_insert(0) += qty;
    }

    #[must_use]
    pub fn killed(&self) -> usize {
        self.soldier_fates
            .values()
            .filter(|fate| matches!(fate, SoldierFate::Killed))
            .count()
    }
}

/// End-of-operation report consumed by reporting UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    pub base: String,
    pub operation: u32,
    pub success: bool,
    pub results: OperationResults,
}

/// One active covert action owned by a base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: u32,
    pub rule: String,
    pub base: String,
    spent: i32,
    cost: i32,
    pub success_chance: i32,
    #[serde(default)]
    pub has_psi: bool,
    #[serde(default)]
    progress_event_spawned: bool,
    #[serde(default)]
    in_battlescape: bool,
    #[serde(default)]
    has_battlescape_resolve: bool,
    #[serde(default)]
    over: bool,
    /// Staged items: required items on commit, rewards on resolution.
    #[serde(default)]
    pub items: ItemContainer,
    #[serde(default)]
    pub soldiers: Vec<u32>,
    #[serde(default)]
    results: Option<OperationResults>,
}

impl Operation {
    #[must_use]
    pub fn new(
        id: u32,
        rule: impl Into<String>,
        base: impl Into<String>,
        cost: i32,
        success_chance: i32,
    ) -> Self {
        Self {
            id,
            rule: rule.into(),
            base: base.into(),
            spent: 0,
            cost: cost.max(0),
            success_chance,
            has_psi: false,
            progress_event_spawned: false,
            in_battlescape: false,
            has_battlescape_resolve: false,
            over: false,
            items: ItemContainer::new(),
            soldiers: Vec::new(),
            results: None,
        }
    }

    #[must_use]
    pub const fn spent(&self) -> i32 {
        self.spent
    }

    #[must_use]
    pub const fn cost(&self) -> i32 {
        self.cost
    }

    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.over
    }

    #[must_use]
    pub const fn in_battlescape(&self) -> bool {
        self.in_battlescape
    }

    #[must_use]
    pub const fn has_battlescape_resolve(&self) -> bool {
        self.has_battlescape_resolve
    }

    #[must_use]
    pub const fn progress_event_spawned(&self) -> bool {
        self.progress_event_spawned
    }

    #[must_use]
    pub const fn results(&self) -> Option<&OperationResults> {
        self.results.as_ref()
    }

    #[must_use]
    pub const fn phase(&self) -> OperationPhase {
        if !self.over {
            OperationPhase::Active
        } else if self.has_battlescape_resolve && self.in_battlescape {
            OperationPhase::AwaitingBattle
        } else {
            OperationPhase::Done
        }
    }

    #[must_use]
    pub const fn odds_name(&self) -> OddsName {
        OddsName::from_chance(self.success_chance)
    }

    #[must_use]
    pub const fn time_left_name(&self) -> TimeLeftName {
        TimeLeftName::from_days(self.cost - self.spent)
    }

    /// Restore an in-flight operation at a given day counter.
    #[must_use]
    pub fn with_spent(mut self, spent: i32) -> Self {
        self.spent = spent.clamp(0, self.cost);
        self
    }

    /// Advance the day counter; true once the cost has been paid in full.
    pub(crate) fn spend_day(&mut self) -> bool {
        if self.spent < self.cost {
            self.spent += 1;
        }
        self.spent >= self.cost
    }

    pub(crate) fn set_progress_event_spawned(&mut self, spawned: bool) {
        self.progress_event_spawned = spawned;
    }

    pub(crate) fn mark_battle(&mut self) {
        self.has_battlescape_resolve = true;
        self.in_battlescape = true;
    }

    pub(crate) fn leave_battle(&mut self) {
        self.in_battlescape = false;
    }

    pub(crate) fn mark_over(&mut self) {
        self.over = true;
    }

    /// Store the single results record. Returns false if one already exists.
    pub(crate) fn store_results(&mut self, results: OperationResults) -> bool {
        if self.results.is_some() {
            return false;
        }
        self.results = Some(results);
        true
    }

    pub(crate) fn results_mut(&mut self) -> Option<&mut OperationResults> {
        self.results.as_mut()
    }
}

/// Commit a new operation at `base`.
///
/// Required items move from base storage into the operation's container and
/// the soldiers are assigned. Returns the new operation id.
///
/// # Errors
///
/// Fails when the rule, base or a soldier is unknown, a soldier is already on
/// another operation, no soldier is given, or the base lacks required items.
/// Nothing is changed on error.
#[allow(clippy::too_many_arguments)]
pub fn commit_operation(
    state: &mut CampaignState,
    rules: &RuleSet,
    base: &str,
    rule_name: &str,
    soldiers: &[u32],
    cost: i32,
    success_chance: i32,
    has_psi: bool,
) -> Result<u32, CommitError> {
    let rule = rules.operation(rule_name)?;
    if soldiers.is_empty() {
        return Err(CommitError::NoSoldiers);
    }
    let home = state
        .base(base)
        .ok_or_else(|| CommitError::UnknownBase(base.to_string()))?;
    for id in soldiers {
        let soldier = home.soldier(*id).ok_or(CommitError::UnknownSoldier(*id))?;
        if let Some(operation) = soldier.assignment {
            return Err(CommitError::SoldierBusy {
                soldier: *id,
                operation,
            });
        }
    }
    for (item, required) in &rule.required_items {
        let available = home.storage.count(item);
        if available < *required {
            return Err(CommitError::MissingItems {
                item: item.clone(),
                required: *required,
                available,
            });
        }
    }

    let id = state.next_id(OPERATION_ID_KEY);
    let mut operation = Operation::new(id, rule_name, base, cost, success_chance);
    operation.has_psi = has_psi;
    operation.soldiers = soldiers.to_vec();

    let home = state
        .base_mut(base)
        .ok_or_else(|| CommitError::UnknownBase(base.to_string()))?;
    for (item, required) in &rule.required_items {
        let moved = home.storage.remove(item, *required);
        operation.items.add(item, moved);
    }
    for soldier in home.soldiers.iter_mut().filter(|s| soldiers.contains(&s.id)) {
        soldier.assignment = Some(id);
        soldier.in_training = false;
        soldier.in_psi_training = false;
    }
    log::debug!("committed operation {rule_name} #{id} at {base}");
    home.operations.push(operation);
    Ok(id)
}
