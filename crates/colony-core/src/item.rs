use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};

/// A non-empty stack of one item type.
///
/// `count` is always in `[1, capacity]`. A stack is never constructed empty;
/// an empty slot is an [`ItemSlot`] with no stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    item: ItemTypeId,
    count: u32,
    capacity: u32,
}

impl ItemStack {
    /// Create a stack, clamping `count` to `capacity`. Returns `None` when the
    /// clamped count would be zero.
    pub fn new(item: ItemTypeId, count: u32, capacity: u32) -> Option<Self> {
        let count = count.min(capacity);
        (count > 0).then_some(Self {
            item,
            count,
            capacity,
        })
    }

    pub fn item(&self) -> ItemTypeId {
        self.item
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Room left before the stack reaches its capacity.
    pub fn space(&self) -> u32 {
        self.capacity - self.count
    }
}

/// A single slot holding at most one [`ItemStack`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSlot {
    stack: Option<ItemStack>,
}

impl ItemSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a slot from raw parts (used when restoring saved state).
    pub fn with(item: ItemTypeId, count: u32, stack_size: u32) -> Self {
        Self {
            stack: ItemStack::new(item, count, stack_size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_none()
    }

    pub fn item(&self) -> Option<ItemTypeId> {
        self.stack.map(|s| s.item)
    }

    pub fn count(&self) -> u32 {
        self.stack.map(|s| s.count).unwrap_or(0)
    }

    pub fn stack(&self) -> Option<&ItemStack> {
        self.stack.as_ref()
    }

    /// How many units of `item` this slot can still take.
    pub fn space_for(&self, item: ItemTypeId, stack_size: u32) -> u32 {
        match &self.stack {
            None => stack_size,
            Some(s) if s.item == item => s.space(),
            Some(_) => 0,
        }
    }

    /// Whether `count` units of `item` fit entirely.
    pub fn can_fit(&self, item: ItemTypeId, count: u32, stack_size: u32) -> bool {
        count > 0 && self.space_for(item, stack_size) >= count
    }

    /// Add items. Returns the amount that didn't fit.
    #[must_use = "overflow count indicates items that did not fit"]
    pub fn add(&mut self, item: ItemTypeId, count: u32, stack_size: u32) -> u32 {
        let to_add = count.min(self.space_for(item, stack_size));
        if to_add == 0 {
            return count;
        }
        match &mut self.stack {
            Some(s) => s.count += to_add,
            None => self.stack = ItemStack::new(item, to_add, stack_size),
        }
        count - to_add
    }

    /// Remove up to `count` items. Returns the item type and amount actually
    /// removed; clears the slot when it reaches zero.
    pub fn take(&mut self, count: u32) -> Option<(ItemTypeId, u32)> {
        let stack = self.stack.as_mut()?;
        let removed = count.min(stack.count);
        if removed == 0 {
            return None;
        }
        let item = stack.item;
        stack.count -= removed;
        if stack.count == 0 {
            self.stack = None;
        }
        Some((item, removed))
    }

    /// Remove exactly one unit.
    pub fn take_one(&mut self) -> Option<ItemTypeId> {
        self.take(1).map(|(item, _)| item)
    }

    /// Empty the slot, returning whatever it held.
    pub fn clear(&mut self) -> Option<ItemStack> {
        self.stack.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iron() -> ItemTypeId {
        ItemTypeId(0)
    }
    fn copper() -> ItemTypeId {
        ItemTypeId(1)
    }

    #[test]
    fn stack_never_constructed_empty() {
        assert!(ItemStack::new(iron(), 0, 50).is_none());
        assert!(ItemStack::new(iron(), 5, 0).is_none());
    }

    #[test]
    fn stack_clamps_to_capacity() {
        let s = ItemStack::new(iron(), 80, 50).unwrap();
        assert_eq!(s.count(), 50);
        assert_eq!(s.space(), 0);
    }

    #[test]
    fn slot_add_and_take() {
        let mut slot = ItemSlot::new();
        assert_eq!(slot.add(iron(), 30, 50), 0);
        assert_eq!(slot.count(), 30);
        assert_eq!(slot.take(10), Some((iron(), 10)));
        assert_eq!(slot.count(), 20);
    }

    #[test]
    fn slot_overflow_returned() {
        let mut slot = ItemSlot::new();
        assert_eq!(slot.add(iron(), 60, 50), 10);
        assert_eq!(slot.count(), 50);
    }

    #[test]
    fn slot_rejects_other_item() {
        let mut slot = ItemSlot::new();
        let _ = slot.add(iron(), 1, 50);
        assert_eq!(slot.space_for(copper(), 50), 0);
        assert_eq!(slot.add(copper(), 5, 50), 5);
        assert_eq!(slot.item(), Some(iron()));
    }

    #[test]
    fn slot_clears_identity_at_zero() {
        let mut slot = ItemSlot::new();
        let _ = slot.add(iron(), 2, 50);
        assert_eq!(slot.take(5), Some((iron(), 2)));
        assert!(slot.is_empty());
        assert_eq!(slot.item(), None);
        assert_eq!(slot.take_one(), None);
    }

    #[test]
    fn can_fit_requires_whole_count() {
        let mut slot = ItemSlot::new();
        let _ = slot.add(iron(), 48, 50);
        assert!(slot.can_fit(iron(), 2, 50));
        assert!(!slot.can_fit(iron(), 3, 50));
        assert!(!slot.can_fit(iron(), 0, 50));
    }
}
