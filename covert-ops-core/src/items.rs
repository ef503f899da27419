//! Item stock keyed by item rule name.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemContainer {
    contents: BTreeMap<String, i32>,
}

impl ItemContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: &str, qty: i32) {
        if qty <= 0 {
            return;
        }
        *self.contents.entry(item.to_string()).or_insert(0) += qty;
    }

    /// Remove up to `qty` units; returns how many were actually removed.
    pub fn remove(&mut self, item: &str, qty: i32) -> i32 {
        let Some(count) = self.contents.get_mut(item) else {
            return 0;
        };
        let removed = qty.clamp(0, *count);
        *count -= removed;
        if *count == 0 {
            self.contents.remove(item);
        }
        removed
    }

    #[must_use]
    pub fn count(&self, item: &str) -> i32 {
        self.contents.get(item).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.contents.iter().map(|(name, qty)| (name.as_str(), *qty))
    }

    /// Move every item into `target`, leaving this container empty.
    pub fn drain_into(&mut self, target: &mut Self) {
        for (item, qty) in std::mem::take(&mut self.contents) {
            target.add(&item, qty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_never_goes_negative() {
        let mut items = ItemContainer::new();
        items.add("STR_MEDKIT", 2);
        items.add("STR_MEDKIT", 0);
        assert_eq!(items.remove("STR_MEDKIT", 5), 2);
        assert_eq!(items.count("STR_MEDKIT"), 0);
        assert!(items.is_empty());
        assert_eq!(items.remove("STR_UNKNOWN", 1), 0);
    }

    #[test]
    fn drain_moves_everything() {
        let mut staged = ItemContainer::new();
        staged.add("STR_PISTOL", 1);
        staged.add("STR_INTEL", 3);
        let mut storage = ItemContainer::new();
        storage.add("STR_INTEL", 1);
        staged.drain_into(&mut storage);
        assert!(staged.is_empty());
        assert_eq!(storage.count("STR_INTEL"), 4);
        assert_eq!(storage.count("STR_PISTOL"), 1);
    }
}
