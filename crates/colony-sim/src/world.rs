//! The world: single owner of all mutable simulation state.
//!
//! Commands (`place_building`, `remove_building`, `rotate_building`, ...)
//! validate against the grid, tech tree and player inventory and either
//! apply completely or return an error without mutating anything. The
//! per-tick pipeline lives in [`World::step`]:
//!
//! 1. **Pre-tick** -- clear belt arrival markers.
//! 2. **Power** -- recompute satisfaction, prune stale entries, report
//!    brownout transitions.
//! 3. **Buildings** -- every building steps once, in placement order.
//! 4. **Crafting** -- the hand-crafting queue advances.
//! 5. **Bookkeeping** -- tick counter and state hash.

use std::sync::Arc;
use std::time::Duration;

use colony_core::fixed::{Fixed64, Ticks};
use colony_core::id::{BuildingId, BuildingTypeId, ItemTypeId, RecipeId, TechId};
use colony_core::item::ItemSlot;
use colony_core::registry::{BuildingDef, BuildingKind, Registry};
use colony_core::sim::{AdvanceResult, StateHash};
use colony_power::{PowerEvent, PowerNetwork};
use colony_spatial::{Direction, Footprint, GridIndex, TilePosition};
use colony_tech_tree::{ResearchState, TechEvent, TechTree, TechTreeError};

use crate::building::{self, BuildingArena, BuildingInstance, BuildingState, StepContext};
use crate::config::{RemovalPolicy, SimConfig};
use crate::crafting::{CraftError, CraftingQueue};
use crate::event::{Event, EventQueue};
use crate::inventory::{ItemStore, PlayerInventory};
use crate::production::ProductionError;
use crate::sim::SimulationClock;
use crate::transfer::TransferProtocol;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("unknown building type: {0:?}")]
    UnknownBuilding(BuildingTypeId),
    #[error("building type {0:?} is not unlocked")]
    Locked(BuildingTypeId),
    #[error("footprint at {0:?} lacks foundation or overlaps a building")]
    Blocked(TilePosition),
    #[error("cannot afford building type {0:?}")]
    Unaffordable(BuildingTypeId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("no building at {0:?}")]
    NoBuilding(TilePosition),
    #[error("building at {0:?} does not support this command")]
    WrongKind(TilePosition),
    #[error("recipe {0:?} is not unlocked")]
    RecipeLocked(RecipeId),
    #[error("not enough {0:?} in inventory")]
    NotEnoughItems(ItemTypeId),
    #[error("building rejected the items")]
    Rejected,
    #[error(transparent)]
    Production(#[from] ProductionError),
    #[error(transparent)]
    Research(#[from] TechTreeError),
    #[error(transparent)]
    Craft(#[from] CraftError),
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct World {
    pub(crate) registry: Arc<Registry>,
    pub(crate) config: SimConfig,
    pub(crate) grid: GridIndex,
    pub(crate) arena: BuildingArena,
    pub(crate) power: PowerNetwork,
    pub(crate) tech: TechTree,
    pub(crate) inventory: PlayerInventory,
    pub(crate) crafting: CraftingQueue,
    pub(crate) events: EventQueue,
    pub(crate) clock: SimulationClock,
    last_hash: u64,
}

impl World {
    pub fn new(registry: Arc<Registry>, config: SimConfig) -> Self {
        let tech = TechTree::from_registry(&registry);
        let events = EventQueue::new(config.event_capacity);
        let clock = SimulationClock::new(config.max_steps_per_advance);
        let mut world = Self {
            registry,
            config,
            grid: GridIndex::new(),
            arena: BuildingArena::new(),
            power: PowerNetwork::new(),
            tech,
            inventory: PlayerInventory::new(),
            crafting: CraftingQueue::new(),
            events,
            clock,
            last_hash: 0,
        };
        world.refresh_hash();
        world
    }

    // -- Read access --

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    pub fn buildings(&self) -> &BuildingArena {
        &self.arena
    }

    pub fn building(&self, id: BuildingId) -> Option<&BuildingInstance> {
        self.arena.get(id)
    }

    pub fn building_at(&self, pos: TilePosition) -> Option<(BuildingId, &BuildingInstance)> {
        let id = self.grid.building_at(pos)?;
        self.arena.get(id).map(|b| (id, b))
    }

    pub fn power(&self) -> &PowerNetwork {
        &self.power
    }

    pub fn tech(&self) -> &TechTree {
        &self.tech
    }

    pub fn inventory(&self) -> &PlayerInventory {
        &self.inventory
    }

    /// Direct inventory access for scripted setups and item pickup.
    pub fn inventory_mut(&mut self) -> &mut PlayerInventory {
        &mut self.inventory
    }

    pub fn crafting(&self) -> &CraftingQueue {
        &self.crafting
    }

    pub fn tick(&self) -> Ticks {
        self.clock.tick()
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Hash of the state after the last completed step.
    pub fn state_hash(&self) -> u64 {
        self.last_hash
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Event queue access for suppression.
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    // -- Foundations --

    pub fn add_foundation(&mut self, pos: TilePosition) -> bool {
        self.grid.add_foundation(pos)
    }

    /// Fails while a building stands on the tile.
    pub fn remove_foundation(&mut self, pos: TilePosition) -> bool {
        self.grid.remove_foundation(pos)
    }

    // -- Placement --

    pub fn place_building(
        &mut self,
        pos: TilePosition,
        def_id: BuildingTypeId,
        facing: Direction,
    ) -> Result<BuildingId, PlacementError> {
        let registry = Arc::clone(&self.registry);
        let def = registry
            .get_building(def_id)
            .ok_or(PlacementError::UnknownBuilding(def_id))?;
        if !self.tech.is_building_unlocked(&registry, def_id) {
            return Err(PlacementError::Locked(def_id));
        }
        let footprint = Footprint::new(def.width, def.height).facing(facing);
        if !self.grid.can_place(pos, footprint) {
            return Err(PlacementError::Blocked(pos));
        }
        if !self.inventory.remove_all(&def.cost) {
            return Err(PlacementError::Unaffordable(def_id));
        }

        let instance = BuildingInstance::new(def_id, def, pos, facing, &registry);
        let id = self.arena.insert(instance);
        self.grid.place(pos, id, footprint);
        self.register_power(id, def);
        building::relink_around(&mut self.arena, &self.grid, pos, footprint, Some(id));

        tracing::debug!(building = %def.name, x = pos.x, y = pos.y, ?facing, "building placed");
        self.events.push(Event::BuildingPlaced {
            building: id,
            building_type: def_id,
            origin: pos,
            tick: self.tick(),
        });
        Ok(id)
    }

    pub(crate) fn register_power(&mut self, id: BuildingId, def: &BuildingDef) {
        match def.kind {
            BuildingKind::Generator { output_kw } => self.power.set_producer(id, output_kw),
            BuildingKind::Accumulator { capacity_kj } => self.power.set_storage(id, capacity_kj),
            _ => {}
        }
        if def.power_kw > Fixed64::ZERO {
            self.power.set_consumer(id, def.power_kw);
        }
    }

    /// Remove the building covering `pos`. Items it held are refunded or
    /// discarded according to the configured removal policy; the returned
    /// instance is empty.
    pub fn remove_building(&mut self, pos: TilePosition) -> Option<BuildingInstance> {
        let id = self.grid.remove(pos)?;
        let mut instance = self.arena.remove(id)?;
        self.power.remove(id);
        building::forget_everywhere(&mut self.arena, id);

        let contents = instance.state.take_contents();
        if !contents.is_empty() {
            match self.config.removal_policy {
                RemovalPolicy::Refund => {
                    for &(item, count) in &contents {
                        self.inventory.add(item, count);
                    }
                }
                RemovalPolicy::Discard => {
                    tracing::debug!(items = contents.len(), "discarding contents of removed building");
                    self.events.push(Event::ItemsDiscarded {
                        origin: instance.origin,
                        items: contents,
                        tick: self.tick(),
                    });
                }
            }
        }
        if self.config.refund_on_remove
            && let Some(def) = self.registry.get_building(instance.def)
        {
            self.inventory.add_all(&def.cost);
        }

        building::relink_around(
            &mut self.arena,
            &self.grid,
            instance.origin,
            instance.footprint,
            None,
        );
        tracing::debug!(x = instance.origin.x, y = instance.origin.y, "building removed");
        self.events.push(Event::BuildingRemoved {
            building: id,
            building_type: instance.def,
            origin: instance.origin,
            tick: self.tick(),
        });
        Some(instance)
    }

    /// Turn the building covering `pos` to face `facing`. Fails when the
    /// rotated footprint would not fit.
    pub fn rotate_building(&mut self, pos: TilePosition, facing: Direction) -> bool {
        let Some(id) = self.grid.building_at(pos) else {
            return false;
        };
        let Some(inst) = self.arena.get(id) else {
            return false;
        };
        let Some(def) = self.registry.get_building(inst.def) else {
            return false;
        };
        let (origin, old_footprint) = (inst.origin, inst.footprint);
        let footprint = Footprint::new(def.width, def.height).facing(facing);
        if footprint != old_footprint && !self.grid.reshape(id, footprint) {
            return false;
        }
        if let Some(inst) = self.arena.get_mut(id) {
            inst.facing = facing;
            inst.footprint = footprint;
        }
        building::relink_around(&mut self.arena, &self.grid, origin, old_footprint, Some(id));
        if footprint != old_footprint {
            building::relink_around(&mut self.arena, &self.grid, origin, footprint, None);
        }
        true
    }

    // -- Building configuration --

    /// Assign or clear an assembler's recipe. Emptied slots go back to the
    /// player.
    pub fn set_recipe(
        &mut self,
        pos: TilePosition,
        recipe: Option<RecipeId>,
    ) -> Result<(), CommandError> {
        if let Some(r) = recipe
            && !self.tech.is_recipe_unlocked(&self.registry, r)
        {
            return Err(CommandError::RecipeLocked(r));
        }
        let id = self.grid.building_at(pos).ok_or(CommandError::NoBuilding(pos))?;
        let unit = self
            .arena
            .state_mut(id)
            .and_then(BuildingState::as_production_mut)
            .ok_or(CommandError::WrongKind(pos))?;
        let returned = unit.assign_recipe(recipe, &self.registry)?;
        for (item, count) in returned {
            self.inventory.add(item, count);
        }
        Ok(())
    }

    pub fn set_inserter_filter(
        &mut self,
        pos: TilePosition,
        filter: Option<ItemTypeId>,
    ) -> Result<(), CommandError> {
        let id = self.grid.building_at(pos).ok_or(CommandError::NoBuilding(pos))?;
        self.arena
            .state_mut(id)
            .and_then(BuildingState::as_inserter_mut)
            .ok_or(CommandError::WrongKind(pos))?
            .set_filter(filter);
        Ok(())
    }

    /// Move items from the player inventory into a building.
    pub fn insert_into(
        &mut self,
        pos: TilePosition,
        item: ItemTypeId,
        count: u32,
    ) -> Result<(), CommandError> {
        let id = self.grid.building_at(pos).ok_or(CommandError::NoBuilding(pos))?;
        if self.inventory.quantity(item) < count {
            return Err(CommandError::NotEnoughItems(item));
        }
        let inst = self.arena.get_mut(id).ok_or(CommandError::NoBuilding(pos))?;
        let from = inst.facing.opposite();
        if !inst.state.insert(item, count, from, &self.registry) {
            return Err(CommandError::Rejected);
        }
        self.inventory.remove(item, count);
        Ok(())
    }

    /// Move one unit of a building's output to the player inventory.
    pub fn take_from(&mut self, pos: TilePosition) -> Option<ItemTypeId> {
        let id = self.grid.building_at(pos)?;
        let inst = self.arena.get_mut(id)?;
        let item = inst.state.extract(inst.facing)?;
        self.inventory.add(item, 1);
        Some(item)
    }

    // -- Research --

    pub fn start_research(&mut self, tech: TechId) -> Result<(), CommandError> {
        let tick = self.tick();
        self.tech.start_research(tech, tick)?;
        self.forward_tech_events();
        Ok(())
    }

    /// Offer every science pack the technology still needs from the
    /// player inventory. Returns what was consumed.
    pub fn contribute_research(
        &mut self,
        tech: TechId,
    ) -> Result<Vec<(ItemTypeId, u32)>, CommandError> {
        let offer: Vec<(ItemTypeId, u32)> = self
            .tech
            .remaining(tech)?
            .into_iter()
            .map(|(item, need)| (item, need.min(self.inventory.quantity(item))))
            .filter(|&(_, n)| n > 0)
            .collect();
        let consumed = self.tech.contribute_items(tech, &offer, self.tick())?;
        for &(item, count) in &consumed {
            self.inventory.remove(item, count);
        }
        self.forward_tech_events();
        Ok(consumed)
    }

    fn forward_tech_events(&mut self) {
        for event in self.tech.drain_events() {
            if let TechEvent::ResearchCompleted { tech_id, tick, .. } = event {
                self.events.push(Event::ResearchCompleted {
                    tech: tech_id,
                    tick,
                });
            }
        }
    }

    // -- Hand crafting --

    pub fn queue_craft(&mut self, recipe: RecipeId) -> Result<(), CommandError> {
        self.crafting
            .queue(recipe, &self.registry, &self.tech, &mut self.inventory)?;
        Ok(())
    }

    pub fn cancel_craft(&mut self, index: usize) -> Result<RecipeId, CommandError> {
        Ok(self
            .crafting
            .cancel(index, &self.registry, &mut self.inventory)?)
    }

    // -- Clock --

    /// Feed elapsed real time and run every step now due, up to the
    /// configured cap.
    pub fn advance(&mut self, dt: Duration) -> AdvanceResult {
        let result = self.clock.schedule(dt);
        for _ in 0..result.steps_run {
            self.run_step();
        }
        result
    }

    /// Run exactly one tick. Does nothing while paused.
    pub fn step(&mut self) -> AdvanceResult {
        if self.clock.is_paused() {
            return AdvanceResult::default();
        }
        self.run_step();
        AdvanceResult {
            steps_run: 1,
            steps_dropped: 0,
        }
    }

    fn run_step(&mut self) {
        let tick = self.tick();

        // Pre-tick
        building::clear_arrivals(&mut self.arena);

        // Power
        let arena = &self.arena;
        let power_events = self.power.tick(tick, |id| arena.contains(id));
        for event in power_events {
            self.events.push(match event {
                PowerEvent::BrownoutStarted { deficit, tick } => {
                    Event::BrownoutStarted { deficit, tick }
                }
                PowerEvent::BrownoutEnded { tick } => Event::BrownoutEnded { tick },
            });
        }

        // Buildings
        let ids = self.arena.ids().to_vec();
        let mut ctx = StepContext {
            arena: &mut self.arena,
            registry: &self.registry,
            tech: &self.tech,
            events: &mut self.events,
            tick,
            satisfaction: self.power.satisfaction(),
        };
        for id in ids {
            building::step_building(id, &mut ctx);
        }

        // Crafting
        self.crafting
            .tick(tick, &self.registry, &mut self.inventory, &mut self.events);

        // Bookkeeping
        self.clock.finish_step();
        self.refresh_hash();
    }

    // -- Hashing --

    pub(crate) fn refresh_hash(&mut self) {
        self.last_hash = self.compute_hash();
    }

    /// Deterministic hash over every piece of persisted simulation state.
    /// Buildings are visited by origin, so the hash does not depend on
    /// slot reuse.
    pub(crate) fn compute_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.tick());

        for pos in self.grid.foundations() {
            h.write_i32(pos.x);
            h.write_i32(pos.y);
        }

        let mut buildings: Vec<(BuildingId, &BuildingInstance)> = self.arena.iter().collect();
        buildings.sort_by_key(|(_, b)| b.origin);
        for (id, b) in buildings {
            h.write_i32(b.origin.x);
            h.write_i32(b.origin.y);
            h.write_u32(b.def.0);
            h.write_u32(u32::from(b.facing.index()));
            h.write_u64(b.seq);
            hash_state(&mut h, &b.state);
            if let Some(storage) = self.power.storage(id) {
                h.write_fixed64(storage.charge);
            }
        }

        for (item, count) in self.inventory.iter() {
            h.write_u32(item.0);
            h.write_u32(count);
        }

        for (id, _) in self.registry.technologies() {
            match self.tech.get_state(id) {
                Some(ResearchState::Completed) => h.write_u32(2),
                Some(ResearchState::InProgress(progress)) => {
                    h.write_u32(1);
                    for &(item, n) in progress {
                        h.write_u32(item.0);
                        h.write_u32(n);
                    }
                }
                _ => h.write_u32(0),
            }
        }

        for job in self.crafting.jobs() {
            h.write_u32(job.recipe.0);
            h.write_u64(job.remaining);
        }
        h.finish()
    }
}

fn hash_slot(h: &mut StateHash, slot: &ItemSlot) {
    match slot.item() {
        Some(item) => {
            h.write_u32(item.0);
            h.write_u32(slot.count());
        }
        None => h.write_u32(u32::MAX),
    }
}

fn hash_item(h: &mut StateHash, item: Option<ItemTypeId>) {
    h.write_u32(item.map_or(u32::MAX, |i| i.0));
}

fn hash_state(h: &mut StateHash, state: &BuildingState) {
    match state {
        BuildingState::Conveyor(belt) => {
            hash_item(h, belt.item());
            h.write_fixed64(belt.progress());
        }
        BuildingState::Inserter(ins) => {
            h.write_u32(ins.state() as u32);
            h.write_fixed64(ins.arm());
            hash_item(h, ins.held());
            hash_item(h, ins.filter());
        }
        BuildingState::Production(unit) => {
            h.write_u32(unit.state() as u32);
            h.write_u32(unit.recipe().map_or(u32::MAX, |r| r.0));
            h.write_u32(unit.active_recipe().map_or(u32::MAX, |r| r.0));
            h.write_fixed64(unit.progress());
            h.write_fixed64(unit.burn_remaining());
            for slot in unit.inputs().iter().chain(unit.outputs()) {
                hash_slot(h, slot);
            }
            hash_slot(h, unit.fuel());
        }
        BuildingState::Chest(chest) => {
            for slot in chest.slots() {
                hash_slot(h, slot);
            }
        }
        BuildingState::Generator | BuildingState::Accumulator | BuildingState::Pole => {}
    }
}
