//! Placed buildings and the arena that owns them.
//!
//! Every building is a [`BuildingInstance`] whose per-kind data lives in
//! [`BuildingState`]. The arena hands out versioned [`BuildingId`]s and
//! remembers placement order, which is the order buildings step in.
//!
//! A building that is stepping is checked out of the arena for the
//! duration of its step, so it can freely borrow its neighbours mutably.
//! While checked out it is invisible to lookups; since no building
//! targets itself this never changes an outcome.

use colony_core::fixed::{Fixed64, Ticks};
use colony_core::id::{BuildingId, BuildingTypeId, ItemTypeId};
use colony_core::registry::{BuildingDef, BuildingKind, Registry};
use colony_spatial::{Direction, Footprint, GridIndex, TilePosition};
use colony_tech_tree::TechTree;
use slotmap::SlotMap;

use crate::chest::Chest;
use crate::conveyor::{self, Belt};
use crate::event::EventQueue;
use crate::inserter::{self, Inserter};
use crate::production::ProductionUnit;
use crate::transfer::{Declines, TransferProtocol};

// ---------------------------------------------------------------------------
// Building state
// ---------------------------------------------------------------------------

/// Per-kind state of a placed building.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildingState {
    Conveyor(Belt),
    Inserter(Inserter),
    Production(ProductionUnit),
    Chest(Chest),
    Generator,
    Accumulator,
    Pole,
}

impl BuildingState {
    /// Fresh state for a newly placed building of `def`.
    pub fn for_def(def: &BuildingDef, registry: &Registry) -> Self {
        match &def.kind {
            BuildingKind::Conveyor { speed } => BuildingState::Conveyor(Belt::new(*speed)),
            BuildingKind::Inserter { swing_ticks, reach } => {
                BuildingState::Inserter(Inserter::new(*swing_ticks, *reach))
            }
            BuildingKind::Furnace {
                speed,
                fuel_kw,
                input_slots,
            } => BuildingState::Production(ProductionUnit::furnace(
                *speed,
                *fuel_kw,
                *input_slots,
                registry,
            )),
            BuildingKind::Assembler { speed } => {
                BuildingState::Production(ProductionUnit::assembler(*speed))
            }
            BuildingKind::Chest { slots } => BuildingState::Chest(Chest::new(*slots as usize)),
            BuildingKind::Generator { .. } => BuildingState::Generator,
            BuildingKind::Accumulator { .. } => BuildingState::Accumulator,
            BuildingKind::Pole => BuildingState::Pole,
        }
    }

    pub fn as_belt(&self) -> Option<&Belt> {
        match self {
            BuildingState::Conveyor(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_belt_mut(&mut self) -> Option<&mut Belt> {
        match self {
            BuildingState::Conveyor(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_inserter(&self) -> Option<&Inserter> {
        match self {
            BuildingState::Inserter(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_production(&self) -> Option<&ProductionUnit> {
        match self {
            BuildingState::Production(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_chest(&self) -> Option<&Chest> {
        match self {
            BuildingState::Chest(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_chest_mut(&mut self) -> Option<&mut Chest> {
        match self {
            BuildingState::Chest(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_inserter_mut(&mut self) -> Option<&mut Inserter> {
        match self {
            BuildingState::Inserter(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_production_mut(&mut self) -> Option<&mut ProductionUnit> {
        match self {
            BuildingState::Production(p) => Some(p),
            _ => None,
        }
    }

    /// Empty the building of every item it holds.
    pub fn take_contents(&mut self) -> Vec<(ItemTypeId, u32)> {
        match self {
            BuildingState::Conveyor(b) => b.take_item().map(|i| vec![(i, 1)]).unwrap_or_default(),
            BuildingState::Inserter(i) => i.take_held().map(|h| vec![(h, 1)]).unwrap_or_default(),
            BuildingState::Production(p) => p.drain(),
            BuildingState::Chest(c) => c.drain(),
            BuildingState::Generator | BuildingState::Accumulator | BuildingState::Pole => {
                Vec::new()
            }
        }
    }

    /// Drop every link that points at `removed`.
    pub fn forget(&mut self, removed: BuildingId) {
        match self {
            BuildingState::Conveyor(b) => b.forget(removed),
            BuildingState::Inserter(i) => i.forget(removed),
            _ => {}
        }
    }
}

impl TransferProtocol for BuildingState {
    fn can_accept(&self, item: ItemTypeId, from: Direction, registry: &Registry) -> bool {
        match self {
            BuildingState::Conveyor(b) => b.can_accept(item, from, registry),
            BuildingState::Production(p) => p.can_accept(item, from, registry),
            BuildingState::Chest(c) => c.can_accept(item, from, registry),
            BuildingState::Inserter(_)
            | BuildingState::Generator
            | BuildingState::Accumulator
            | BuildingState::Pole => Declines.can_accept(item, from, registry),
        }
    }

    fn insert(
        &mut self,
        item: ItemTypeId,
        count: u32,
        from: Direction,
        registry: &Registry,
    ) -> bool {
        match self {
            BuildingState::Conveyor(b) => b.insert(item, count, from, registry),
            BuildingState::Production(p) => p.insert(item, count, from, registry),
            BuildingState::Chest(c) => c.insert(item, count, from, registry),
            BuildingState::Inserter(_)
            | BuildingState::Generator
            | BuildingState::Accumulator
            | BuildingState::Pole => Declines.insert(item, count, from, registry),
        }
    }

    fn has_output(&self, to: Direction) -> Option<ItemTypeId> {
        match self {
            BuildingState::Conveyor(b) => b.has_output(to),
            BuildingState::Production(p) => p.has_output(to),
            BuildingState::Chest(c) => c.has_output(to),
            BuildingState::Inserter(_)
            | BuildingState::Generator
            | BuildingState::Accumulator
            | BuildingState::Pole => Declines.has_output(to),
        }
    }

    fn extract(&mut self, to: Direction) -> Option<ItemTypeId> {
        match self {
            BuildingState::Conveyor(b) => b.extract(to),
            BuildingState::Production(p) => p.extract(to),
            BuildingState::Chest(c) => c.extract(to),
            BuildingState::Inserter(_)
            | BuildingState::Generator
            | BuildingState::Accumulator
            | BuildingState::Pole => Declines.extract(to),
        }
    }
}

// ---------------------------------------------------------------------------
// Building instance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingInstance {
    pub def: BuildingTypeId,
    /// Top-left footprint tile.
    pub origin: TilePosition,
    /// Footprint as placed (axes already swapped for east/west facing).
    pub footprint: Footprint,
    pub facing: Direction,
    /// Electric draw in kW; zero means unpowered machinery at full speed.
    pub power_kw: Fixed64,
    /// Placement sequence number. Buildings step in ascending order.
    pub seq: u64,
    pub state: BuildingState,
}

impl BuildingInstance {
    pub fn new(
        def_id: BuildingTypeId,
        def: &BuildingDef,
        origin: TilePosition,
        facing: Direction,
        registry: &Registry,
    ) -> Self {
        Self {
            def: def_id,
            origin,
            footprint: Footprint::new(def.width, def.height).facing(facing),
            facing,
            power_kw: def.power_kw,
            seq: 0,
            state: BuildingState::for_def(def, registry),
        }
    }

    /// The tile `distance` steps from this building's origin in `dir`.
    pub fn tile_towards(&self, dir: Direction, distance: i32) -> TilePosition {
        self.origin.step(dir, distance)
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Owns every placed building.
#[derive(Debug, Default)]
pub struct BuildingArena {
    slots: SlotMap<BuildingId, Option<BuildingInstance>>,
    /// Ids in placement order.
    order: Vec<BuildingId>,
    next_seq: u64,
}

impl BuildingArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with the next placement sequence number.
    pub fn insert(&mut self, mut instance: BuildingInstance) -> BuildingId {
        instance.seq = self.next_seq;
        self.next_seq += 1;
        self.insert_with_seq(instance)
    }

    /// Insert keeping `instance.seq` (used when restoring). Callers must
    /// insert in ascending sequence order.
    pub fn insert_with_seq(&mut self, instance: BuildingInstance) -> BuildingId {
        self.next_seq = self.next_seq.max(instance.seq.saturating_add(1));
        let id = self.slots.insert(Some(instance));
        self.order.push(id);
        id
    }

    pub fn remove(&mut self, id: BuildingId) -> Option<BuildingInstance> {
        let instance = self.slots.remove(id)??;
        self.order.retain(|&o| o != id);
        Some(instance)
    }

    pub fn contains(&self, id: BuildingId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn get(&self, id: BuildingId) -> Option<&BuildingInstance> {
        self.slots.get(id)?.as_ref()
    }

    pub fn get_mut(&mut self, id: BuildingId) -> Option<&mut BuildingInstance> {
        self.slots.get_mut(id)?.as_mut()
    }

    pub fn state(&self, id: BuildingId) -> Option<&BuildingState> {
        self.get(id).map(|b| &b.state)
    }

    pub fn state_mut(&mut self, id: BuildingId) -> Option<&mut BuildingState> {
        self.get_mut(id).map(|b| &mut b.state)
    }

    pub fn belt(&self, id: BuildingId) -> Option<&Belt> {
        self.state(id)?.as_belt()
    }

    pub fn belt_mut(&mut self, id: BuildingId) -> Option<&mut Belt> {
        self.state_mut(id)?.as_belt_mut()
    }

    /// Take a building out for exclusive use. Must be returned with
    /// [`checkin`](Self::checkin).
    pub(crate) fn checkout(&mut self, id: BuildingId) -> Option<BuildingInstance> {
        self.slots.get_mut(id)?.take()
    }

    pub(crate) fn checkin(&mut self, id: BuildingId, instance: BuildingInstance) {
        if let Some(slot) = self.slots.get_mut(id) {
            *slot = Some(instance);
        }
    }

    /// Ids in placement order.
    pub fn ids(&self) -> &[BuildingId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (BuildingId, &BuildingInstance)> {
        self.order
            .iter()
            .filter_map(|&id| self.get(id).map(|b| (id, b)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sort ids by placement order.
    pub fn sort_by_placement(&self, ids: &mut [BuildingId]) {
        ids.sort_by_key(|&id| self.get(id).map(|b| b.seq).unwrap_or(u64::MAX));
    }
}

// ---------------------------------------------------------------------------
// Step context
// ---------------------------------------------------------------------------

/// What a building sees while it steps.
pub struct StepContext<'a> {
    pub arena: &'a mut BuildingArena,
    pub registry: &'a Registry,
    pub tech: &'a TechTree,
    pub events: &'a mut EventQueue,
    pub tick: Ticks,
    /// Network satisfaction, before the per-building zero-draw rule.
    pub satisfaction: Fixed64,
}

impl StepContext<'_> {
    /// The satisfaction a building with `power_kw` draw experiences.
    pub fn satisfaction_for(&self, power_kw: Fixed64) -> Fixed64 {
        if power_kw == Fixed64::ZERO {
            Fixed64::ONE
        } else {
            self.satisfaction
        }
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Re-resolve the links of a single building.
pub(crate) fn relink(arena: &mut BuildingArena, grid: &GridIndex, id: BuildingId) {
    match arena.state(id) {
        Some(BuildingState::Conveyor(_)) => conveyor::relink(arena, grid, id),
        Some(BuildingState::Inserter(_)) => inserter::relink(arena, grid, id),
        _ => {}
    }
}

/// Relink every building within two tiles of a footprint, plus `extra`,
/// in placement order.
pub(crate) fn relink_around(
    arena: &mut BuildingArena,
    grid: &GridIndex,
    origin: TilePosition,
    footprint: Footprint,
    extra: Option<BuildingId>,
) {
    let mut ids = grid.buildings_around(origin, footprint, 2);
    ids.extend(extra);
    arena.sort_by_placement(&mut ids);
    ids.dedup();
    for id in ids {
        relink(arena, grid, id);
    }
}

/// Drop every link to `removed` held by any building.
pub(crate) fn forget_everywhere(arena: &mut BuildingArena, removed: BuildingId) {
    for slot in arena.slots.values_mut().flatten() {
        slot.state.forget(removed);
    }
}

/// Start-of-tick reset of belt arrival markers.
pub(crate) fn clear_arrivals(arena: &mut BuildingArena) {
    for slot in arena.slots.values_mut().flatten() {
        if let BuildingState::Conveyor(belt) = &mut slot.state {
            belt.clear_arrival();
        }
    }
}

/// Run one building's per-tick behaviour.
pub(crate) fn step_building(id: BuildingId, ctx: &mut StepContext<'_>) {
    let Some(mut instance) = ctx.arena.checkout(id) else {
        return;
    };
    let satisfaction = ctx.satisfaction_for(instance.power_kw);
    let facing = instance.facing;
    match &mut instance.state {
        BuildingState::Conveyor(belt) => belt.step(id, facing, ctx),
        BuildingState::Inserter(inserter) => inserter.step(facing, satisfaction, ctx),
        BuildingState::Production(unit) => unit.step(id, satisfaction, ctx),
        BuildingState::Chest(_)
        | BuildingState::Generator
        | BuildingState::Accumulator
        | BuildingState::Pole => {}
    }
    ctx.arena.checkin(id, instance);
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_core::test_utils::*;

    fn instance(c: &TestContent, def: BuildingTypeId, x: i32) -> BuildingInstance {
        let d = c.registry.get_building(def).unwrap();
        BuildingInstance::new(def, d, TilePosition::new(x, 0), Direction::North, &c.registry)
    }

    #[test]
    fn arena_keeps_placement_order() {
        let c = test_content();
        let mut arena = BuildingArena::new();
        let a = arena.insert(instance(&c, c.chest, 0));
        let b = arena.insert(instance(&c, c.belt, 1));
        let d = arena.insert(instance(&c, c.pole, 2));
        assert_eq!(arena.ids(), &[a, b, d]);

        arena.remove(b);
        assert_eq!(arena.ids(), &[a, d]);
        let e = arena.insert(instance(&c, c.belt, 1));
        assert_ne!(e, b, "ids are versioned");
        assert_eq!(arena.get(e).unwrap().seq, 3);

        let mut ids = vec![e, d, a];
        arena.sort_by_placement(&mut ids);
        assert_eq!(ids, vec![a, d, e]);
    }

    #[test]
    fn checked_out_building_is_invisible() {
        let c = test_content();
        let mut arena = BuildingArena::new();
        let a = arena.insert(instance(&c, c.chest, 0));
        let taken = arena.checkout(a).unwrap();
        assert!(arena.get(a).is_none());
        assert!(arena.contains(a));
        arena.checkin(a, taken);
        assert!(arena.get(a).is_some());
    }

    #[test]
    fn footprint_follows_facing() {
        let c = test_content();
        let d = c.registry.get_building(c.generator).unwrap();
        let north = BuildingInstance::new(
            c.generator,
            d,
            TilePosition::new(0, 0),
            Direction::North,
            &c.registry,
        );
        let east = BuildingInstance::new(
            c.generator,
            d,
            TilePosition::new(0, 0),
            Direction::East,
            &c.registry,
        );
        assert_eq!(north.footprint, Footprint::new(2, 3));
        assert_eq!(east.footprint, Footprint::new(3, 2));
    }

    #[test]
    fn non_transfer_buildings_decline() {
        let c = test_content();
        let mut state = BuildingState::Generator;
        assert!(!state.can_accept(c.coal, Direction::North, &c.registry));
        assert!(!state.insert(c.coal, 1, Direction::North, &c.registry));
        assert_eq!(state.extract(Direction::North), None);

        let mut inserter = instance(&c, c.inserter, 0).state;
        assert!(!inserter.insert(c.coal, 1, Direction::North, &c.registry));
        assert_eq!(inserter.has_output(Direction::South), None);
    }
}
