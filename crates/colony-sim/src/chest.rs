//! Storage chests: a fixed row of slots that accept any solid item.

use colony_core::id::ItemTypeId;
use colony_core::item::ItemSlot;
use colony_core::registry::Registry;
use colony_spatial::Direction;

use crate::transfer::TransferProtocol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chest {
    slots: Vec<ItemSlot>,
}

impl Chest {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![ItemSlot::new(); slot_count],
        }
    }

    /// Restore from saved slots. Extra slots are dropped, missing ones
    /// are empty.
    pub fn with_slots(slot_count: usize, mut slots: Vec<ItemSlot>) -> Self {
        slots.resize(slot_count, ItemSlot::new());
        Self { slots }
    }

    pub fn slots(&self) -> &[ItemSlot] {
        &self.slots
    }

    /// Total units of `item` across all slots.
    pub fn count_of(&self, item: ItemTypeId) -> u32 {
        self.slots
            .iter()
            .filter(|s| s.item() == Some(item))
            .map(|s| s.count())
            .sum()
    }

    /// Empty every slot, returning what was held.
    pub fn drain(&mut self) -> Vec<(ItemTypeId, u32)> {
        self.slots
            .iter_mut()
            .filter_map(|s| s.clear().map(|stack| (stack.item(), stack.count())))
            .collect()
    }

    /// First slot that can take `count` units: a matching stack with room
    /// first, then an empty slot.
    fn target_slot(&self, item: ItemTypeId, count: u32, stack_size: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.item() == Some(item) && s.can_fit(item, count, stack_size))
            .or_else(|| {
                self.slots
                    .iter()
                    .position(|s| s.is_empty() && count <= stack_size)
            })
    }
}

impl TransferProtocol for Chest {
    fn can_accept(&self, item: ItemTypeId, _from: Direction, registry: &Registry) -> bool {
        !registry.is_fluid(item)
            && self
                .target_slot(item, 1, registry.stack_size(item))
                .is_some()
    }

    fn insert(
        &mut self,
        item: ItemTypeId,
        count: u32,
        _from: Direction,
        registry: &Registry,
    ) -> bool {
        if count == 0 || registry.is_fluid(item) {
            return false;
        }
        let stack_size = registry.stack_size(item);
        let Some(index) = self.target_slot(item, count, stack_size) else {
            return false;
        };
        self.slots[index].add(item, count, stack_size) == 0
    }

    fn has_output(&self, _to: Direction) -> Option<ItemTypeId> {
        self.slots.iter().find_map(ItemSlot::item)
    }

    fn extract(&mut self, _to: Direction) -> Option<ItemTypeId> {
        self.slots.iter_mut().find_map(|s| s.take_one())
    }
}
