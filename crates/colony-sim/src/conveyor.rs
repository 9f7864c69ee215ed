//! Conveyor belts.
//!
//! A belt holds at most one item and moves it one tile forward. Progress
//! runs from 0 to 1 at `speed / 60` per tick; at 1 the item is handed to
//! whatever sits in front. Belts that face each other form chains: the
//! upstream belt's output link and the downstream belt's input link always
//! point at each other.
//!
//! # Order independence
//!
//! An item that lands on a belt during a tick is marked as arrived and is
//! not advanced until the next tick. Together with the pull step (an empty
//! belt takes a finished item from its input) this makes a chain advance
//! identically no matter which of its belts steps first.

use colony_core::fixed::{Fixed64, per_tick};
use colony_core::id::{BuildingId, ItemTypeId};
use colony_core::registry::Registry;
use colony_spatial::{Direction, GridIndex};

use crate::building::{BuildingArena, StepContext};
use crate::transfer::TransferProtocol;

#[derive(Debug, Clone, PartialEq)]
pub struct Belt {
    item: Option<ItemTypeId>,
    progress: Fixed64,
    speed: Fixed64,
    input: Option<BuildingId>,
    output_belt: Option<BuildingId>,
    output_building: Option<BuildingId>,
    /// Set when an item landed this tick.
    arrived: bool,
}

impl Belt {
    pub fn new(speed: Fixed64) -> Self {
        Self {
            item: None,
            progress: Fixed64::ZERO,
            speed,
            input: None,
            output_belt: None,
            output_building: None,
            arrived: false,
        }
    }

    pub fn item(&self) -> Option<ItemTypeId> {
        self.item
    }

    pub fn progress(&self) -> Fixed64 {
        self.progress
    }

    pub fn speed(&self) -> Fixed64 {
        self.speed
    }

    pub fn is_empty(&self) -> bool {
        self.item.is_none()
    }

    pub fn input(&self) -> Option<BuildingId> {
        self.input
    }

    pub fn output_belt(&self) -> Option<BuildingId> {
        self.output_belt
    }

    pub fn output_building(&self) -> Option<BuildingId> {
        self.output_building
    }

    /// Put back a saved item. Progress is clamped to `[0, 1]`.
    pub fn restore(&mut self, item: Option<ItemTypeId>, progress: Fixed64) {
        self.item = item;
        self.progress = if item.is_some() {
            progress.clamp(Fixed64::ZERO, Fixed64::ONE)
        } else {
            Fixed64::ZERO
        };
    }

    pub(crate) fn take_item(&mut self) -> Option<ItemTypeId> {
        self.progress = Fixed64::ZERO;
        self.item.take()
    }

    pub(crate) fn clear_arrival(&mut self) {
        self.arrived = false;
    }

    pub(crate) fn forget(&mut self, removed: BuildingId) {
        if self.input == Some(removed) {
            self.input = None;
        }
        if self.output_belt == Some(removed) {
            self.output_belt = None;
        }
        if self.output_building == Some(removed) {
            self.output_building = None;
        }
    }

    fn accept(&mut self, item: ItemTypeId) {
        self.item = Some(item);
        self.progress = Fixed64::ZERO;
        self.arrived = true;
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    pub(crate) fn step(&mut self, id: BuildingId, facing: Direction, ctx: &mut StepContext<'_>) {
        if let Some(item) = self.item
            && !self.arrived
        {
            if self.progress < Fixed64::ONE {
                self.progress = (self.progress + per_tick(self.speed)).min(Fixed64::ONE);
            }
            if self.progress >= Fixed64::ONE {
                self.push(id, item, facing, ctx);
            }
        }
        if self.item.is_none() {
            self.pull(id, ctx);
        }
    }

    /// Hand a finished item forward. On failure the item stays at full
    /// progress and is retried next tick.
    fn push(
        &mut self,
        id: BuildingId,
        item: ItemTypeId,
        facing: Direction,
        ctx: &mut StepContext<'_>,
    ) {
        let moved = if let Some(out) = self.output_belt {
            match ctx.arena.belt_mut(out) {
                Some(next) if next.input == Some(id) && next.item.is_none() => {
                    next.accept(item);
                    true
                }
                _ => false,
            }
        } else if let Some(out) = self.output_building {
            ctx.arena
                .state_mut(out)
                .is_some_and(|target| target.insert(item, 1, facing.opposite(), ctx.registry))
        } else {
            false
        };
        if moved {
            self.item = None;
            self.progress = Fixed64::ZERO;
        }
    }

    /// Take a finished item from the input belt.
    fn pull(&mut self, id: BuildingId, ctx: &mut StepContext<'_>) {
        let Some(input) = self.input else {
            return;
        };
        let Some(prev) = ctx.arena.belt_mut(input) else {
            return;
        };
        if prev.output_belt != Some(id) || prev.progress < Fixed64::ONE {
            return;
        }
        if let Some(item) = prev.take_item() {
            self.accept(item);
        }
    }
}

impl TransferProtocol for Belt {
    fn can_accept(&self, item: ItemTypeId, _from: Direction, registry: &Registry) -> bool {
        self.item.is_none() && !registry.is_fluid(item)
    }

    fn insert(
        &mut self,
        item: ItemTypeId,
        count: u32,
        from: Direction,
        registry: &Registry,
    ) -> bool {
        if count != 1 || !self.can_accept(item, from, registry) {
            return false;
        }
        self.accept(item);
        true
    }

    fn has_output(&self, _to: Direction) -> Option<ItemTypeId> {
        self.item
    }

    fn extract(&mut self, _to: Direction) -> Option<ItemTypeId> {
        self.take_item()
    }
}

// ---------------------------------------------------------------------------
// Link resolution
// ---------------------------------------------------------------------------

/// Whether belt `from` points straight at the tile of belt `to`.
fn feeds_into(arena: &BuildingArena, from: BuildingId, to: BuildingId) -> bool {
    let (Some(f), Some(t)) = (arena.get(from), arena.get(to)) else {
        return false;
    };
    f.state.as_belt().is_some()
        && t.footprint.contains(t.origin, f.origin.step(f.facing, 1))
}

/// Re-resolve the input and output links of belt `id` from the grid.
///
/// An output belt is only claimed when its input is free or already ours,
/// so when two belts feed the same tile the one relinked first keeps it.
pub(crate) fn relink(arena: &mut BuildingArena, grid: &GridIndex, id: BuildingId) {
    let Some(inst) = arena.get(id) else {
        return;
    };
    let Some(belt) = inst.state.as_belt() else {
        return;
    };
    let (origin, facing) = (inst.origin, inst.facing);
    let old_output = belt.output_belt;
    let old_input = belt.input;

    // Output side.
    let mut output_belt = None;
    let mut output_building = None;
    if let Some(target) = grid
        .building_at(origin.step(facing, 1))
        .filter(|&t| t != id)
    {
        match arena.belt(target) {
            Some(next) => {
                if next.input.is_none_or(|i| i == id) {
                    output_belt = Some(target);
                }
            }
            None => output_building = Some(target),
        }
    }
    if let Some(old) = old_output
        && old_output != output_belt
        && let Some(prev) = arena.belt_mut(old)
        && prev.input == Some(id)
    {
        prev.input = None;
    }
    if let Some(next) = output_belt.and_then(|t| arena.belt_mut(t)) {
        next.input = Some(id);
    }

    // Input side: keep a still-valid input, otherwise claim the belt behind.
    let keep_input = old_input.filter(|&i| {
        feeds_into(arena, i, id) && arena.belt(i).is_some_and(|b| b.output_belt == Some(id))
    });
    let input = keep_input.or_else(|| {
        grid.building_at(origin.step(facing.opposite(), 1))
            .filter(|&b| b != id && feeds_into(arena, b, id))
            .filter(|&b| {
                arena
                    .belt(b)
                    .is_some_and(|prev| prev.output_belt.is_none_or(|o| o == id))
            })
    });
    if let Some(prev) = input.and_then(|b| arena.belt_mut(b)) {
        prev.output_belt = Some(id);
        prev.output_building = None;
    }

    if let Some(belt) = arena.belt_mut(id) {
        belt.output_belt = output_belt;
        belt.output_building = output_building;
        belt.input = input;
    }
}
