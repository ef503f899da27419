use serde::{Deserialize, Serialize};

use crate::battle::{BattleError, BattleReport};
use crate::campaign::{CampaignContext, CampaignState};
use crate::clock::{OperationTick, advance_operations, complete_battle};
use crate::constants::DAYS_PER_MONTH;
use crate::difficulty::Difficulty;
use crate::mission::{MissionPlacement, spawn_alien_mission};
use crate::operation::{CommitError, OperationReport, commit_operation};
use crate::rng::{RngBundle, RngCursor};
use crate::rules::{RuleSet, RulesError};
use crate::scripts::{ProcessorSource, evaluate_event_scripts};

/// Everything that happened during one [`CampaignSession::advance_day`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReport {
    /// Day counter after the advance.
    pub day: u32,
    pub ticks: Vec<OperationTick>,
    /// Events spawned by scripts, in evaluation order.
    pub events: Vec<String>,
    pub new_month: bool,
}

/// High-level session wrapper binding rules and random streams to a campaign.
#[derive(Debug, Clone)]
pub struct CampaignSession {
    state: CampaignState,
    rules: RuleSet,
    rng: RngBundle,
}

impl CampaignSession {
    /// Start a fresh campaign.
    ///
    /// # Errors
    ///
    /// Fails when the starting setup references undefined rules.
    pub fn new(rules: RuleSet, seed: u64, difficulty: Difficulty) -> Result<Self, RulesError> {
        let mut rng = RngBundle::from_user_seed(seed);
        let mut state = CampaignState::new_campaign(&rules, rng.operations(), difficulty)?;
        state.seed = seed;
        state.begin_month();
        let mut session = Self { state, rules, rng };
        session.sync_cursor();
        Ok(session)
    }

    /// Resume a saved campaign where its random streams left off.
    #[must_use]
    pub fn from_state(rules: RuleSet, state: CampaignState) -> Self {
        let rng = RngBundle::resume(state.seed, state.rng_cursor);
        Self { state, rules, rng }
    }

    fn sync_cursor(&mut self) {
        self.state.rng_cursor = self.rng.cursor();
    }

    /// Advance the campaign by one day.
    ///
    /// Script cooldowns tick first, then every operation, then xcom scripts.
    /// Crossing into a new month resets the period ledgers and runs the monthly
    /// and factional scripts.
    ///
    /// # Errors
    ///
    /// Propagates the first undefined-rule failure.
    pub fn advance_day(&mut self) -> Result<DayReport, RulesError> {
        let report = self.run_day();
        self.sync_cursor();
        report
    }

    fn run_day(&mut self) -> Result<DayReport, RulesError> {
        self.state.tick_script_gaps();
        let ticks = {
            let mut ctx = CampaignContext::new(&mut self.state, &self.rules, self.rng.operations());
            advance_operations(&mut ctx)?
        };
        let mut events = self.run_scripts(ProcessorSource::Xcom)?;

        self.state.day += 1;
        let new_month = self.state.day % DAYS_PER_MONTH == 0;
        if new_month {
            self.state.begin_month();
            log::debug!("month {} begins", self.state.month());
            events.extend(self.run_scripts(ProcessorSource::Monthly)?);
            events.extend(self.run_scripts(ProcessorSource::Factional)?);
        }
        Ok(DayReport {
            day: self.state.day,
            ticks,
            events,
            new_month,
        })
    }

    fn run_scripts(&mut self, source: ProcessorSource) -> Result<Vec<String>, RulesError> {
        let mut ctx = CampaignContext::new(&mut self.state, &self.rules, self.rng.scripts());
        evaluate_event_scripts(&mut ctx, source)
    }

    /// Commit a covert operation at `base`; see [`commit_operation`].
    ///
    /// # Errors
    ///
    /// See [`commit_operation`].
    #[allow(clippy::too_many_arguments)]
    pub fn commit_operation(
        &mut self,
        base: &str,
        rule: &str,
        soldiers: &[u32],
        cost: i32,
        success_chance: i32,
        has_psi: bool,
    ) -> Result<u32, CommitError> {
        commit_operation(
            &mut self.state,
            &self.rules,
            base,
            rule,
            soldiers,
            cost,
            success_chance,
            has_psi,
        )
    }

    /// Post the result of an external battle.
    ///
    /// # Errors
    ///
    /// See [`complete_battle`].
    pub fn complete_battle(&mut self, report: BattleReport) -> Result<OperationReport, BattleError> {
        complete_battle(&mut self.state, &self.rules, report)
    }

    /// Spawn an alien mission outside of any operation.
    ///
    /// # Errors
    ///
    /// Fails when the mission or anything it draws is undefined.
    pub fn spawn_alien_mission(
        &mut self,
        mission: &str,
        anchor_base: Option<&str>,
    ) -> Result<MissionPlacement, RulesError> {
        let placement = {
            let mut ctx = CampaignContext::new(&mut self.state, &self.rules, self.rng.operations());
            spawn_alien_mission(&mut ctx, mission, anchor_base)
        };
        self.sync_cursor();
        placement
    }

    #[must_use]
    pub const fn state(&self) -> &CampaignState {
        &self.state
    }

    pub const fn state_mut(&mut self) -> &mut CampaignState {
        &mut self.state
    }

    /// Apply a closure to the mutable campaign state.
    pub fn with_state_mut<T>(&mut self, f: impl FnOnce(&mut CampaignState) -> T) -> T {
        f(&mut self.state)
    }

    #[must_use]
    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Draws taken so far from the operations and scripts streams.
    #[must_use]
    pub fn rng_draws(&mut self) -> (u64, u64) {
        (self.rng.operations().draws(), self.rng.scripts().draws())
    }

    /// Deterministically reseed the random streams.
    pub fn reseed(&mut self, seed: u64) {
        self.state.seed = seed;
        self.state.rng_cursor = RngCursor::default();
        self.rng = RngBundle::from_user_seed(seed);
    }

    /// Consume the session, returning the campaign state.
    #[must_use]
    pub fn into_state(self) -> CampaignState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(seed: u64) -> CampaignSession {
        let rules = RuleSet::bundled().expect("bundled rules");
        CampaignSession::new(rules, seed, Difficulty::Veteran).expect("session")
    }

    #[test]
    fn new_session_builds_the_starting_campaign() {
        let session = session(42);
        let state = session.state();
        assert_eq!(state.seed, 42);
        assert_eq!(state.day, 0);
        assert_eq!(state.bases.len(), 1);
        assert_eq!(state.factions.len(), session.rules().factions.len());
    }

    #[test]
    fn month_rollover_happens_every_thirty_days() {
        let mut session = session(7);
        let mut rollovers = 0;
        for _ in 0..60 {
            if session.advance_day().expect("day").new_month {
                rollovers += 1;
            }
        }
        assert_eq!(rollovers, 2);
        assert_eq!(session.state().month(), 2);
        assert_eq!(session.state().monthly_scores().len(), 3);
    }

    #[test]
    fn same_seed_same_campaign() {
        let mut left = session(99);
        let mut right = session(99);
        for _ in 0..45 {
            assert_eq!(left.advance_day().expect("left"), right.advance_day().expect("right"));
        }
        assert_eq!(left.rng_draws(), right.rng_draws());
        assert_eq!(left.into_state(), right.into_state());
    }

    #[test]
    fn with_state_mut_and_reseed() {
        let mut session = session(1);
        session.with_state_mut(|state| state.funds = 5);
        assert_eq!(session.state().funds, 5);
        session.reseed(8);
        assert_eq!(session.state().seed, 8);
        assert_eq!(session.rng_draws(), (0, 0));
        assert_eq!(session.state().rng_cursor, RngCursor::default());
    }

    #[test]
    fn saved_state_carries_stream_positions() {
        let mut session = session(5);
        for _ in 0..10 {
            session.advance_day().expect("day");
        }
        let (operations, scripts) = session.rng_draws();
        assert_eq!(session.state().rng_cursor.operations.draws, operations);
        assert_eq!(session.state().rng_cursor.scripts.draws, scripts);

        let mut resumed =
            CampaignSession::from_state(session.rules().clone(), session.state().clone());
        assert_eq!(resumed.rng_draws(), (operations, scripts));
        for _ in 0..5 {
            let live = session.advance_day().expect("live");
            assert_eq!(live, resumed.advance_day().expect("resumed"));
        }
        assert_eq!(session.into_state(), resumed.into_state());
    }
}
