//! Weighted option tables used by rules (regions, races, events, follow-ups).
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named options with integer weights. Iteration order is the key order, so
/// draws are reproducible for a given RNG stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightedOptions {
    choices: BTreeMap<String, u32>,
}

impl WeightedOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the weight for `name`; a zero weight removes the option.
    pub fn set(&mut self, name: impl Into<String>, weight: u32) {
        let name = name.into();
        if weight == 0 {
            self.choices.remove(&name);
        } else {
            self.choices.insert(name, weight);
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, weight: u32) -> Self {
        self.set(name, weight);
        self
    }

    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.choices.values().map(|w| u64::from(*w)).sum()
    }

    /// True when no option carries a positive weight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_weight() == 0
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.choices
            .iter()
            .filter(|(_, weight)| **weight > 0)
            .map(|(name, _)| name.as_str())
    }

    /// Copy of this table without the options rejected by `exclude`.
    #[must_use]
    pub fn without(&self, mut exclude: impl FnMut(&str) -> bool) -> Self {
        Self {
            choices: self
                .choices
                .iter()
                .filter(|(name, weight)| **weight > 0 && !exclude(name))
                .map(|(name, weight)| (name.clone(), *weight))
                .collect(),
        }
    }

    /// Draw one option proportionally to its weight.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        let mut roll = rng.gen_range(0..total);
        for (name, weight) in &self.choices {
            let weight = u64::from(*weight);
            if roll < weight {
                return Some(name.as_str());
            }
            roll -= weight;
        }
        None
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for WeightedOptions {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        let mut options = Self::new();
        for (name, weight) in iter {
            options.set(name, weight);
        }
        options
    }
}

/// Weight tables keyed by the first campaign month they apply to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthlyWeights {
    tables: BTreeMap<u32, WeightedOptions>,
}

impl MonthlyWeights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_month(mut self, month: u32, options: WeightedOptions) -> Self {
        self.tables.insert(month, options);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(WeightedOptions::is_empty)
    }

    /// Table in force for `month`: the one with the greatest key not above it.
    #[must_use]
    pub fn table_for(&self, month: u32) -> Option<&WeightedOptions> {
        self.tables.range(..=month).next_back().map(|(_, table)| table)
    }

    pub fn choose<R: Rng + ?Sized>(&self, month: u32, rng: &mut R) -> Option<&str> {
        self.table_for(month)?.choose(rng)
    }

    /// Every option name that appears in any month's table.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.tables.values().flat_map(WeightedOptions::names)
    }
}
