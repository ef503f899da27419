//! Friendly bases: soldiers, storage and the covert operations they own.
use serde::{Deserialize, Serialize};

use crate::items::ItemContainer;
use crate::operation::Operation;
use crate::soldier::Soldier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Base {
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default)]
    pub storage: ItemContainer,
    #[serde(default)]
    pub soldiers: Vec<Soldier>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    /// Martial training slots.
    #[serde(default)]
    pub training_capacity: u32,
    #[serde(default)]
    pub psi_lab_capacity: u32,
}

impl Base {
    #[must_use]
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            country: None,
            facilities: Vec::new(),
            storage: ItemContainer::new(),
            soldiers: Vec::new(),
            operations: Vec::new(),
            training_capacity: 0,
            psi_lab_capacity: 0,
        }
    }

    #[must_use]
    pub fn has_facility(&self, facility: &str) -> bool {
        self.facilities.iter().any(|f| f == facility)
    }

    #[must_use]
    pub fn soldier(&self, id: u32) -> Option<&Soldier> {
        self.soldiers.iter().find(|s| s.id == id)
    }

    pub fn soldier_mut(&mut self, id: u32) -> Option<&mut Soldier> {
        self.soldiers.iter_mut().find(|s| s.id == id)
    }

    /// Take a soldier off the roster.
    pub fn remove_soldier(&mut self, id: u32) -> Option<Soldier> {
        let idx = self.soldiers.iter().position(|s| s.id == id)?;
        Some(self.soldiers.remove(idx))
    }

    #[must_use]
    pub fn operation(&self, id: u32) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    #[must_use]
    pub fn used_training(&self) -> u32 {
        count_u32(self.soldiers.iter().filter(|s| s.in_training))
    }

    #[must_use]
    pub fn used_psi_labs(&self) -> u32 {
        count_u32(self.soldiers.iter().filter(|s| s.in_psi_training))
    }

    #[must_use]
    pub fn has_free_training(&self) -> bool {
        self.used_training() < self.training_capacity
    }

    #[must_use]
    pub fn has_free_psi_lab(&self) -> bool {
        self.used_psi_labs() < self.psi_lab_capacity
    }
}

fn count_u32<I: Iterator>(iter: I) -> u32 {
    u32::try_from(iter.count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatBlock;

    #[test]
    fn training_capacity_counts_trainees() {
        let mut base = Base::new("Alpha", "STR_EUROPE");
        base.training_capacity = 1;
        let mut trainee = Soldier::new(1, "A", "STR_AGENT", StatBlock::zero());
        trainee.in_training = true;
        base.soldiers.push(trainee);
        base.soldiers
            .push(Soldier::new(2, "B", "STR_AGENT", StatBlock::zero()));
        assert_eq!(base.used_training(), 1);
        assert!(!base.has_free_training());
        assert!(!base.has_free_psi_lab());
    }

    #[test]
    fn remove_soldier_takes_them_off_the_roster() {
        let mut base = Base::new("Alpha", "STR_EUROPE");
        base.soldiers
            .push(Soldier::new(7, "A", "STR_AGENT", StatBlock::zero()));
        assert!(base.remove_soldier(7).is_some());
        assert!(base.soldier(7).is_none());
        assert!(base.remove_soldier(7).is_none());
    }
}
