//! Covert Ops Engine
//!
//! Platform-agnostic strategic layer for covert operations: daily operation
//! clocks, outcome resolution, alien mission placement, background casualty
//! simulation, faction reputation and campaign event scripts.
//! This crate performs no I/O; rules and saves come in through [`DataLoader`]
//! and [`CampaignStorage`].

pub mod base;
pub mod battle;
pub mod campaign;
pub mod casualty;
pub mod clock;
pub mod constants;
pub mod difficulty;
pub mod items;
pub mod loyalty;
pub mod mission;
pub mod numbers;
pub mod operation;
pub mod outcome;
pub mod reputation;
pub mod rng;
pub mod rules;
pub mod scripts;
pub mod session;
pub mod soldier;
pub mod stats;
pub mod weights;

// Re-export commonly used types
pub use base::Base;
pub use battle::{BattleError, BattleReport, BattleRequest};
pub use campaign::{CampaignContext, CampaignState, FallenSoldier, GeoscapeEvent};
pub use casualty::{CasualtyInput, CasualtyReport, base_experience_rolls, simulate_casualties};
pub use clock::{
    DayProgress, OperationTick, TickOutcome, advance_operations, complete_battle,
    finish_operation, progress_day, tick_operation,
};
pub use difficulty::{Difficulty, DifficultyOdds};
pub use items::ItemContainer;
pub use loyalty::{LoyaltySource, loyalty_performance_bonus, update_loyalty};
pub use mission::{
    AlienBase, AlienMission, MissionPlacement, place_alien_mission, spawn_alien_mission,
};
pub use operation::{
    CommitError, OddsName, Operation, OperationPhase, OperationReport, OperationResults,
    SoldierFate, TimeLeftName, commit_operation,
};
pub use outcome::{OutcomeRoll, Resolution, resolve_with_roll};
pub use reputation::{Faction, ReputationLevel, apply_reputation_delta, update_reputation_level};
pub use rng::{CountingRng, RngBundle, RngCursor, RollExt, StreamCursor};
pub use rules::{
    OperationCategory, RuleAlienMission, RuleCovertOperation, RuleEventScript, RuleOutcomeBranch,
    RuleSet, RulesError,
};
pub use scripts::{ProcessorSource, evaluate_event_scripts};
pub use session::{CampaignSession, DayReport};
pub use soldier::{ReturnToTraining, RoleRank, Soldier, SoldierRole};
pub use stats::{Stat, StatBlock};
pub use weights::{MonthlyWeights, WeightedOptions};

/// Trait for abstracting where rules come from.
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the rule set
    ///
    /// # Errors
    ///
    /// Returns an error if the rules cannot be read or parsed.
    fn load_rules(&self) -> Result<RuleSet, Self::Error>;
}

/// Trait for abstracting save/load operations
pub trait CampaignStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save campaign state
    ///
    /// # Errors
    ///
    /// Returns an error if the campaign cannot be saved.
    fn save_campaign(&self, save_name: &str, state: &CampaignState) -> Result<(), Self::Error>;

    /// Load campaign state
    ///
    /// # Errors
    ///
    /// Returns an error if the campaign cannot be loaded.
    fn load_campaign(&self, save_name: &str) -> Result<Option<CampaignState>, Self::Error>;

    /// Delete a saved campaign
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_campaign(&self, save_name: &str) -> Result<(), Self::Error>;
}

/// Binds a rules source and a save backend.
pub struct CampaignEngine<L, S>
where
    L: DataLoader,
    S: CampaignStorage,
{
    data_loader: L,
    storage: S,
}

impl<L, S> CampaignEngine<L, S>
where
    L: DataLoader,
    S: CampaignStorage,
{
    pub const fn new(data_loader: L, storage: S) -> Self {
        Self {
            data_loader,
            storage,
        }
    }

    /// Load and cross-check the rule set.
    ///
    /// # Errors
    ///
    /// Returns an error if the rules cannot be loaded or reference undefined entries.
    pub fn load_rules(&self) -> anyhow::Result<RuleSet> {
        let rules = self.data_loader.load_rules()?;
        rules.validate()?;
        Ok(rules)
    }

    /// Start a new campaign session.
    ///
    /// # Errors
    ///
    /// Returns an error if the rules are unusable.
    pub fn create_session(&self, seed: u64, difficulty: Difficulty) -> anyhow::Result<CampaignSession> {
        let rules = self.load_rules()?;
        Ok(CampaignSession::new(rules, seed, difficulty)?)
    }

    /// Save a campaign state
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be saved.
    pub fn save_campaign(&self, save_name: &str, state: &CampaignState) -> Result<(), S::Error> {
        self.storage.save_campaign(save_name, state)
    }

    /// Resume a saved campaign with freshly loaded rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the save or the rules cannot be loaded.
    pub fn load_session(&self, save_name: &str) -> anyhow::Result<Option<CampaignSession>> {
        let Some(state) = self.storage.load_campaign(save_name)? else {
            return Ok(None);
        };
        let rules = self.load_rules()?;
        Ok(Some(CampaignSession::from_state(rules, state)))
    }

    /// Delete a saved campaign
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    pub fn delete_campaign(&self, save_name: &str) -> Result<(), S::Error> {
        self.storage.delete_campaign(save_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Copy, Default)]
    struct BundledLoader;

    impl DataLoader for BundledLoader {
        type Error = serde_json::Error;

        fn load_rules(&self) -> Result<RuleSet, Self::Error> {
            RuleSet::bundled()
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStorage {
        saves: Rc<RefCell<HashMap<String, CampaignState>>>,
    }

    impl CampaignStorage for MemoryStorage {
        type Error = Infallible;

        fn save_campaign(&self, save_name: &str, state: &CampaignState) -> Result<(), Self::Error> {
            self.saves
                .borrow_mut()
                .insert(save_name.to_string(), state.clone());
            Ok(())
        }

        fn load_campaign(&self, save_name: &str) -> Result<Option<CampaignState>, Self::Error> {
            Ok(self.saves.borrow().get(save_name).cloned())
        }

        fn delete_campaign(&self, save_name: &str) -> Result<(), Self::Error> {
            self.saves.borrow_mut().remove(save_name);
            Ok(())
        }
    }

    #[test]
    fn engine_creates_and_roundtrips_campaigns() {
        let engine = CampaignEngine::new(BundledLoader, MemoryStorage::default());
        let mut session = engine.create_session(0xABCD, Difficulty::Genius).unwrap();
        for _ in 0..3 {
            session.advance_day().unwrap();
        }
        session.with_state_mut(|state| state.funds = 250);
        let snapshot = session.into_state();
        engine.save_campaign("slot-one", &snapshot).unwrap();

        let loaded = engine.load_session("slot-one").unwrap().expect("save exists");
        assert_eq!(loaded.state().funds, 250);
        assert_eq!(loaded.state().day, 3);
        assert_eq!(loaded.state().difficulty, Difficulty::Genius);
        assert!(engine.load_session("missing-slot").unwrap().is_none());

        engine.delete_campaign("slot-one").unwrap();
        assert!(engine.load_session("slot-one").unwrap().is_none());
    }
}
