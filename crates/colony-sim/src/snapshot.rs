//! Persisted world state.
//!
//! [`SaveState`] is a flat, order-independent key-value picture of a
//! world: buildings are keyed by their origin (`"x,y"`) and every item,
//! recipe, technology and building type is referenced by name, so a save
//! survives content being reordered or extended. Links between buildings
//! are not stored; they are re-resolved from the grid on import.
//!
//! Two encodings are provided: JSON via `serde_json` and a compact binary
//! form via `bitcode` with a versioned [`SnapshotHeader`].
//!
//! Import is lenient. Missing fields take their defaults and entries that
//! name unknown content are skipped with a warning. Only bytes that cannot
//! be decoded at all are an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use colony_core::fixed::{Fixed64, Ticks};
use colony_core::id::{ItemTypeId, RecipeId};
use colony_core::item::ItemSlot;
use colony_core::registry::Registry;
use colony_core::sim::SimState;
use colony_spatial::{Direction, TilePosition};
use colony_tech_tree::ResearchState;
use serde::{Deserialize, Serialize};

use crate::building::{self, BuildingInstance, BuildingState};
use crate::chest::Chest;
use crate::config::SimConfig;
use crate::crafting::CraftJob;
use crate::inserter::InserterState;
use crate::inventory::ItemStore;
use crate::production::ProductionState;
use crate::sim::SimulationClock;
use crate::world::World;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a binary colony save.
pub const SNAPSHOT_MAGIC: u32 = 0xC010_0001;

/// Current binary format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("save from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick at which the save was taken.
    pub tick: Ticks,
}

impl SnapshotHeader {
    pub fn new(tick: Ticks) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(SnapshotError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SaveFile {
    header: SnapshotHeader,
    state: SaveState,
}

// ---------------------------------------------------------------------------
// Save state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveState {
    pub tick: Ticks,
    /// Clock accumulator (nanoseconds scaled by the tick rate).
    pub accumulator: u64,
    pub paused: bool,
    /// Foundation tiles as `[x, y]`, sorted.
    pub foundations: Vec<(i32, i32)>,
    /// Buildings keyed by origin, `"x,y"`.
    pub buildings: BTreeMap<String, SavedBuilding>,
    /// Player inventory by item name.
    pub inventory: BTreeMap<String, u32>,
    pub research: SavedResearch,
    /// Hand-crafting queue, front first.
    pub crafting: Vec<SavedCraftJob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedBuilding {
    /// Building definition name.
    pub def: String,
    /// Direction index, 0 = north.
    pub facing: u8,
    /// Placement sequence number.
    pub seq: u64,
    pub state: SavedBuildingState,
    /// Stored energy in kJ (accumulators only).
    pub charge: Fixed64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum SavedBuildingState {
    #[default]
    Stateless,
    Belt {
        item: Option<String>,
        progress: Fixed64,
    },
    Inserter {
        state: InserterState,
        /// Arm position in swing ticks.
        position: Fixed64,
        held: Option<String>,
        filter: Option<String>,
    },
    Production {
        state: ProductionState,
        recipe: Option<String>,
        active_recipe: Option<String>,
        progress: Fixed64,
        burn_remaining: Fixed64,
        inputs: Vec<Option<SavedStack>>,
        outputs: Vec<Option<SavedStack>>,
        fuel: Option<SavedStack>,
    },
    Chest {
        slots: Vec<Option<SavedStack>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedStack {
    pub item: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedResearch {
    /// Completed technology names.
    pub completed: Vec<String>,
    /// Pack counts contributed so far, by technology then item name.
    pub in_progress: BTreeMap<String, BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCraftJob {
    pub recipe: String,
    pub remaining: Ticks,
}

impl SaveState {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Binary encoding with a versioned header.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let file = SaveFile {
            header: SnapshotHeader::new(self.tick),
            state: self.clone(),
        };
        bitcode::serialize(&file).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        let file: SaveFile =
            bitcode::deserialize(data).map_err(|e| SnapshotError::Decode(e.to_string()))?;
        file.header.validate()?;
        Ok(file.state)
    }
}

fn position_key(pos: TilePosition) -> String {
    format!("{},{}", pos.x, pos.y)
}

fn parse_position_key(key: &str) -> Option<TilePosition> {
    let (x, y) = key.split_once(',')?;
    Some(TilePosition::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

struct Names<'a>(&'a Registry);

impl Names<'_> {
    fn item(&self, item: ItemTypeId) -> Option<String> {
        self.0.item_name(item).map(str::to_owned)
    }

    fn stack(&self, slot: &ItemSlot) -> Option<SavedStack> {
        Some(SavedStack {
            item: self.item(slot.item()?)?,
            count: slot.count(),
        })
    }

    fn stacks(&self, slots: &[ItemSlot]) -> Vec<Option<SavedStack>> {
        slots.iter().map(|s| self.stack(s)).collect()
    }

    fn recipe(&self, recipe: Option<RecipeId>) -> Option<String> {
        recipe
            .and_then(|r| self.0.get_recipe(r))
            .map(|d| d.name.clone())
    }
}

impl World {
    pub fn export_state(&self) -> SaveState {
        let names = Names(&self.registry);
        let clock = self.clock.state();

        let mut foundations: Vec<(i32, i32)> =
            self.grid.foundations().map(|p| (p.x, p.y)).collect();
        foundations.sort_unstable();

        let mut buildings = BTreeMap::new();
        for (id, b) in self.arena.iter() {
            let Some(def) = self.registry.get_building(b.def) else {
                continue;
            };
            let state = match &b.state {
                BuildingState::Conveyor(belt) => SavedBuildingState::Belt {
                    item: belt.item().and_then(|i| names.item(i)),
                    progress: belt.progress(),
                },
                BuildingState::Inserter(ins) => SavedBuildingState::Inserter {
                    state: ins.state(),
                    position: ins.position(),
                    held: ins.held().and_then(|i| names.item(i)),
                    filter: ins.filter().and_then(|i| names.item(i)),
                },
                BuildingState::Production(unit) => SavedBuildingState::Production {
                    state: unit.state(),
                    recipe: names.recipe(unit.recipe()),
                    active_recipe: names.recipe(unit.active_recipe()),
                    progress: unit.progress(),
                    burn_remaining: unit.burn_remaining(),
                    inputs: names.stacks(unit.inputs()),
                    outputs: names.stacks(unit.outputs()),
                    fuel: names.stack(unit.fuel()),
                },
                BuildingState::Chest(chest) => SavedBuildingState::Chest {
                    slots: names.stacks(chest.slots()),
                },
                BuildingState::Generator | BuildingState::Accumulator | BuildingState::Pole => {
                    SavedBuildingState::Stateless
                }
            };
            buildings.insert(
                position_key(b.origin),
                SavedBuilding {
                    def: def.name.clone(),
                    facing: b.facing.index(),
                    seq: b.seq,
                    state,
                    charge: self
                        .power
                        .storage(id)
                        .map_or(Fixed64::ZERO, |s| s.charge),
                },
            );
        }

        let inventory = self
            .inventory
            .iter()
            .filter_map(|(item, n)| Some((names.item(item)?, n)))
            .collect();

        let mut research = SavedResearch::default();
        for (tech_id, def) in self.registry.technologies() {
            match self.tech.get_state(tech_id) {
                Some(ResearchState::Completed) => research.completed.push(def.name.clone()),
                Some(ResearchState::InProgress(progress)) => {
                    let packs = progress
                        .iter()
                        .filter_map(|&(item, n)| Some((names.item(item)?, n)))
                        .collect();
                    research.in_progress.insert(def.name.clone(), packs);
                }
                _ => {}
            }
        }

        let crafting = self
            .crafting
            .jobs()
            .filter_map(|job| {
                Some(SavedCraftJob {
                    recipe: names.recipe(Some(job.recipe))?,
                    remaining: job.remaining,
                })
            })
            .collect();

        SaveState {
            tick: clock.tick,
            accumulator: clock.accumulator,
            paused: clock.paused,
            foundations,
            buildings,
            inventory,
            research,
            crafting,
        }
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    /// Rebuild a world from saved state. Entries naming unknown content,
    /// or buildings that no longer fit the grid, are skipped with a
    /// warning.
    pub fn import_state(registry: Arc<Registry>, config: SimConfig, save: &SaveState) -> World {
        let mut world = World::new(Arc::clone(&registry), config);
        world.clock = SimulationClock::from_state(
            SimState {
                tick: save.tick,
                accumulator: save.accumulator,
                paused: save.paused,
            },
            world.config.max_steps_per_advance,
        );

        for &(x, y) in &save.foundations {
            world.grid.insert_foundation_unchecked(TilePosition::new(x, y));
        }

        let mut saved: Vec<(TilePosition, &SavedBuilding)> = Vec::new();
        for (key, b) in &save.buildings {
            match parse_position_key(key) {
                Some(pos) => saved.push((pos, b)),
                None => tracing::warn!(key = %key, "skipping building with malformed position"),
            }
        }
        saved.sort_by_key(|&(pos, b)| (b.seq, pos));

        for (pos, b) in saved {
            let Some(def_id) = registry.building_id(&b.def) else {
                tracing::warn!(building = %b.def, "skipping unknown building type");
                continue;
            };
            let Some(def) = registry.get_building(def_id) else {
                continue;
            };
            let facing = Direction::from_index(b.facing).unwrap_or_default();
            let mut instance = BuildingInstance::new(def_id, def, pos, facing, &registry);
            if !world.grid.can_place(pos, instance.footprint) {
                tracing::warn!(building = %b.def, x = pos.x, y = pos.y, "skipping building that no longer fits");
                continue;
            }
            instance.seq = b.seq;
            restore_building_state(&mut instance.state, &b.state, &registry);
            let footprint = instance.footprint;
            let id = world.arena.insert_with_seq(instance);
            world.grid.place(pos, id, footprint);
            world.register_power(id, def);
            world.power.set_charge(id, b.charge);
        }

        let ids = world.arena.ids().to_vec();
        for id in ids {
            building::relink(&mut world.arena, &world.grid, id);
        }

        for (name, &count) in &save.inventory {
            match registry.item_id(name) {
                Some(item) => world.inventory.add(item, count),
                None => tracing::warn!(item = %name, "skipping unknown inventory item"),
            }
        }

        for name in &save.research.completed {
            match registry.tech_id(name) {
                Some(id) => {
                    let _ = world.tech.complete(id, save.tick);
                }
                None => tracing::warn!(tech = %name, "skipping unknown technology"),
            }
        }
        for (name, packs) in &save.research.in_progress {
            let Some(id) = registry.tech_id(name) else {
                tracing::warn!(tech = %name, "skipping unknown technology");
                continue;
            };
            let contributed: Vec<(ItemTypeId, u32)> = packs
                .iter()
                .filter_map(|(item, &n)| Some((registry.item_id(item)?, n)))
                .collect();
            if !world.tech.is_completed(id) {
                let _ = world.tech.restore_progress(id, &contributed);
            }
        }
        world.tech.drain_events();

        for job in &save.crafting {
            match registry.recipe_id(&job.recipe) {
                Some(recipe) => world.crafting.restore_job(CraftJob {
                    recipe,
                    remaining: job.remaining.max(1),
                }),
                None => tracing::warn!(recipe = %job.recipe, "skipping unknown craft job"),
            }
        }

        world.events.drain();
        world.refresh_hash();
        world
    }
}

fn restore_stack(stack: &Option<SavedStack>, registry: &Registry) -> ItemSlot {
    stack
        .as_ref()
        .and_then(|s| {
            let item = registry.item_id(&s.item)?;
            Some(ItemSlot::with(item, s.count, registry.stack_size(item)))
        })
        .unwrap_or_default()
}

fn restore_slots(saved: &[Option<SavedStack>], registry: &Registry) -> Vec<ItemSlot> {
    saved.iter().map(|s| restore_stack(s, registry)).collect()
}

fn restore_building_state(state: &mut BuildingState, saved: &SavedBuildingState, registry: &Registry) {
    let item = |name: &Option<String>| name.as_deref().and_then(|n| registry.item_id(n));
    let recipe = |name: &Option<String>| name.as_deref().and_then(|n| registry.recipe_id(n));
    match (state, saved) {
        (BuildingState::Conveyor(belt), SavedBuildingState::Belt { item: held, progress }) => {
            belt.restore(item(held), *progress);
        }
        (
            BuildingState::Inserter(ins),
            SavedBuildingState::Inserter {
                state,
                position,
                held,
                filter,
            },
        ) => {
            ins.restore(*state, *position, item(held), item(filter));
        }
        (
            BuildingState::Production(unit),
            SavedBuildingState::Production {
                state,
                recipe: assigned,
                active_recipe,
                progress,
                burn_remaining,
                inputs,
                outputs,
                fuel,
            },
        ) => {
            let (input_len, output_len) = (unit.inputs.len(), unit.outputs.len());
            unit.state = *state;
            unit.recipe = recipe(assigned);
            unit.active_recipe = recipe(active_recipe);
            unit.progress = *progress;
            unit.burn_remaining = *burn_remaining;
            unit.inputs = restore_slots(inputs, registry);
            unit.outputs = restore_slots(outputs, registry);
            if unit.recipe.is_none() {
                unit.inputs.resize(input_len, ItemSlot::new());
                unit.outputs.resize(output_len, ItemSlot::new());
            }
            unit.fuel = restore_stack(fuel, registry);
            unit.normalize(registry);
        }
        (BuildingState::Chest(chest), SavedBuildingState::Chest { slots }) => {
            let count = chest.slots().len();
            *chest = Chest::with_slots(count, restore_slots(slots, registry));
        }
        (_, SavedBuildingState::Stateless) => {}
        (_, _) => tracing::warn!("saved state does not match building kind, using defaults"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_core::test_utils::*;

    fn sample_world() -> (TestContent, World) {
        let c = test_content();
        let registry = Arc::new(test_content().registry);
        let mut world = World::new(registry, SimConfig::default());
        for y in 0..4 {
            for x in 0..6 {
                world.grid.insert_foundation_unchecked(TilePosition::new(x, y));
            }
        }
        world.inventory_mut().add(c.iron_plate, 50);
        world.inventory_mut().add(c.gear, 10);
        world.inventory_mut().add(c.coal, 5);
        world.inventory_mut().add(c.iron_ore, 5);
        world
            .place_building(TilePosition::new(0, 0), c.belt, Direction::East)
            .unwrap();
        world
            .place_building(TilePosition::new(1, 0), c.belt, Direction::East)
            .unwrap();
        world
            .place_building(TilePosition::new(2, 0), c.stone_furnace, Direction::North)
            .unwrap();
        world
            .place_building(TilePosition::new(0, 1), c.chest, Direction::North)
            .unwrap();
        world
            .place_building(TilePosition::new(1, 1), c.burner_inserter, Direction::East)
            .unwrap();
        world
            .place_building(TilePosition::new(4, 0), c.accumulator, Direction::North)
            .unwrap();
        world.insert_into(TilePosition::new(0, 0), c.iron_ore, 1).unwrap();
        world.insert_into(TilePosition::new(0, 1), c.coal, 3).unwrap();
        world.queue_craft(c.craft_gear).unwrap();
        for _ in 0..20 {
            world.step();
        }
        (c, world)
    }

    #[test]
    fn json_round_trip_is_identical() {
        let (_, world) = sample_world();
        let save = world.export_state();
        let json = save.to_json().unwrap();
        let loaded = SaveState::from_json(&json).unwrap();
        assert_eq!(loaded, save);

        let restored = World::import_state(
            Arc::clone(world.registry()),
            SimConfig::default(),
            &loaded,
        );
        assert_eq!(restored.export_state(), save);
        assert_eq!(restored.state_hash(), world.state_hash());
    }

    #[test]
    fn restored_world_continues_identically() {
        let (_, mut world) = sample_world();
        let save = world.export_state();
        let mut restored = World::import_state(
            Arc::clone(world.registry()),
            SimConfig::default(),
            &save,
        );
        for _ in 0..300 {
            world.step();
            restored.step();
            assert_eq!(world.state_hash(), restored.state_hash());
        }
    }

    #[test]
    fn binary_round_trip() {
        let (_, world) = sample_world();
        let save = world.export_state();
        let bytes = save.to_bytes().unwrap();
        assert_eq!(SaveState::from_bytes(&bytes).unwrap(), save);
    }

    #[test]
    fn binary_rejects_garbage_and_wrong_magic() {
        assert!(matches!(
            SaveState::from_bytes(&[1, 2, 3]),
            Err(SnapshotError::Decode(_))
        ));
        let file = SaveFile {
            header: SnapshotHeader {
                magic: 0xDEAD_BEEF,
                version: FORMAT_VERSION,
                tick: 0,
            },
            state: SaveState::default(),
        };
        let bytes = bitcode::serialize(&file).unwrap();
        assert!(matches!(
            SaveState::from_bytes(&bytes),
            Err(SnapshotError::InvalidMagic(0xDEAD_BEEF))
        ));
    }

    #[test]
    fn header_version_checks() {
        let mut header = SnapshotHeader::new(5);
        assert!(header.validate().is_ok());
        header.version = FORMAT_VERSION + 1;
        assert!(matches!(header.validate(), Err(SnapshotError::FutureVersion(_))));
        header.version = 0;
        assert!(matches!(header.validate(), Err(SnapshotError::UnsupportedVersion(0))));
    }

    #[test]
    fn missing_fields_default() {
        let save = SaveState::from_json(r#"{ "tick": 7 }"#).unwrap();
        assert_eq!(save.tick, 7);
        assert!(save.buildings.is_empty());
        let world = World::import_state(
            Arc::new(test_content().registry),
            SimConfig::default(),
            &save,
        );
        assert_eq!(world.tick(), 7);
        assert_eq!(world.buildings().len(), 0);
    }

    #[test]
    fn unknown_names_are_skipped() {
        let json = r#"{
            "foundations": [[0, 0], [1, 0]],
            "buildings": {
                "0,0": { "def": "teleporter", "facing": 1, "seq": 0 },
                "1,0": { "def": "chest", "facing": 0, "seq": 1,
                         "state": { "Chest": { "slots": [
                             { "item": "unobtainium", "count": 3 },
                             { "item": "coal", "count": 4 }
                         ] } } },
                "nonsense": { "def": "chest" }
            },
            "inventory": { "coal": 2, "mystery": 9 },
            "research": { "completed": ["automation", "time_travel"] }
        }"#;
        let save = SaveState::from_json(json).unwrap();
        let c = test_content();
        let world = World::import_state(Arc::new(test_content().registry), SimConfig::default(), &save);
        assert_eq!(world.buildings().len(), 1);
        let (_, chest) = world.building_at(TilePosition::new(1, 0)).unwrap();
        assert_eq!(chest.state.as_chest().unwrap().count_of(c.coal), 4);
        assert_eq!(world.inventory().quantity(c.coal), 2);
        assert!(world.tech().is_completed(c.automation));
    }

    #[test]
    fn position_keys_parse() {
        assert_eq!(parse_position_key("-3,12"), Some(TilePosition::new(-3, 12)));
        assert_eq!(parse_position_key("4"), None);
        assert_eq!(parse_position_key("a,b"), None);
        assert_eq!(position_key(TilePosition::new(-1, 2)), "-1,2");
    }
}
