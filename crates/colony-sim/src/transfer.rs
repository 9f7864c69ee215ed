//! The item-transfer contract shared by every building variant.
//!
//! Belts, inserters and machines never reach into each other's storage.
//! They ask the neighbouring building through [`TransferProtocol`], which
//! every variant implements explicitly. Directions are always given from
//! the point of view of the building being called:
//!
//! - `from` on `can_accept` / `insert` is the side the item enters through.
//! - `to` on `has_output` / `extract` is the side the item leaves through.

use colony_core::id::ItemTypeId;
use colony_core::registry::Registry;
use colony_spatial::Direction;

pub trait TransferProtocol {
    /// Whether `insert(item, 1, from, ..)` would succeed. No side effects.
    fn can_accept(&self, item: ItemTypeId, from: Direction, registry: &Registry) -> bool;

    /// Take `count` units of `item`. All-or-nothing: returns false and
    /// leaves state untouched unless every unit fits.
    fn insert(
        &mut self,
        item: ItemTypeId,
        count: u32,
        from: Direction,
        registry: &Registry,
    ) -> bool;

    /// The item an `extract(to)` would yield, without removing it.
    fn has_output(&self, to: Direction) -> Option<ItemTypeId>;

    /// Remove exactly one unit.
    fn extract(&mut self, to: Direction) -> Option<ItemTypeId>;
}

/// Buildings that never exchange items (generators, accumulators, poles
/// and inserters themselves) decline uniformly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Declines;

impl TransferProtocol for Declines {
    fn can_accept(&self, _: ItemTypeId, _: Direction, _: &Registry) -> bool {
        false
    }

    fn insert(&mut self, _: ItemTypeId, _: u32, _: Direction, _: &Registry) -> bool {
        false
    }

    fn has_output(&self, _: Direction) -> Option<ItemTypeId> {
        None
    }

    fn extract(&mut self, _: Direction) -> Option<ItemTypeId> {
        None
    }
}
