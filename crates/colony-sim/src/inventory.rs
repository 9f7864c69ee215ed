//! The player's inventory and the accessor trait the simulation uses to
//! pay costs and hand out refunds.

use std::collections::BTreeMap;

use colony_core::id::ItemTypeId;
use colony_core::registry::RecipeEntry;

/// Read/write access to a pool of items.
pub trait ItemStore {
    fn quantity(&self, item: ItemTypeId) -> u32;

    fn add(&mut self, item: ItemTypeId, count: u32);

    /// Remove exactly `count` units. Returns false without mutation when
    /// fewer are held.
    fn remove(&mut self, item: ItemTypeId, count: u32) -> bool;

    fn has_all(&self, entries: &[RecipeEntry]) -> bool {
        // Entries may repeat an item; sum before comparing.
        let mut needed: BTreeMap<ItemTypeId, u64> = BTreeMap::new();
        for e in entries {
            *needed.entry(e.item).or_default() += u64::from(e.quantity);
        }
        needed
            .iter()
            .all(|(&item, &n)| u64::from(self.quantity(item)) >= n)
    }

    /// Remove every entry, or nothing at all.
    fn remove_all(&mut self, entries: &[RecipeEntry]) -> bool {
        if !self.has_all(entries) {
            return false;
        }
        for e in entries {
            self.remove(e.item, e.quantity);
        }
        true
    }

    fn add_all(&mut self, entries: &[RecipeEntry]) {
        for e in entries {
            self.add(e.item, e.quantity);
        }
    }
}

/// Unbounded item counts keyed by item type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerInventory {
    counts: BTreeMap<ItemTypeId, u32>,
}

impl PlayerInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-zero counts in item id order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemTypeId, u32)> + '_ {
        self.counts.iter().map(|(&item, &n)| (item, n))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl ItemStore for PlayerInventory {
    fn quantity(&self, item: ItemTypeId) -> u32 {
        self.counts.get(&item).copied().unwrap_or(0)
    }

    fn add(&mut self, item: ItemTypeId, count: u32) {
        if count == 0 {
            return;
        }
        let entry = self.counts.entry(item).or_default();
        *entry = entry.saturating_add(count);
    }

    fn remove(&mut self, item: ItemTypeId, count: u32) -> bool {
        let held = self.quantity(item);
        if held < count {
            return false;
        }
        if held == count {
            self.counts.remove(&item);
        } else {
            self.counts.insert(item, held - count);
        }
        true
    }
}
