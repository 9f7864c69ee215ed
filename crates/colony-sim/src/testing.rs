//! A bare building harness for unit tests: arena, grid and step loop
//! without the command layer of [`World`](crate::world::World).

use colony_core::fixed::{Fixed64, Ticks};
use colony_core::id::{BuildingId, BuildingTypeId, ItemTypeId};
use colony_core::test_utils::{TestContent, test_content};
use colony_spatial::{Direction, GridIndex, TilePosition};
use colony_tech_tree::TechTree;

use crate::building::{self, BuildingArena, BuildingInstance, StepContext};
use crate::event::EventQueue;
use crate::transfer::TransferProtocol;

pub(crate) struct Rig {
    pub c: TestContent,
    pub arena: BuildingArena,
    pub grid: GridIndex,
    pub tech: TechTree,
    pub events: EventQueue,
    pub tick: Ticks,
    pub satisfaction: Fixed64,
}

impl Rig {
    fn with_tiles(tiles: impl IntoIterator<Item = TilePosition>) -> Self {
        let c = test_content();
        let tech = TechTree::from_registry(&c.registry);
        let mut grid = GridIndex::new();
        for pos in tiles {
            grid.insert_foundation_unchecked(pos);
        }
        Self {
            c,
            arena: BuildingArena::new(),
            grid,
            tech,
            events: EventQueue::default(),
            tick: 0,
            satisfaction: Fixed64::ONE,
        }
    }

    /// Foundation along `y = 0` from `x = 0` to `len - 1`.
    pub fn strip(len: i32) -> Self {
        Self::with_tiles((0..len).map(|x| TilePosition::new(x, 0)))
    }

    /// `n x n` foundation with its corner at the origin.
    pub fn square(n: i32) -> Self {
        Self::with_tiles((0..n).flat_map(|y| (0..n).map(move |x| TilePosition::new(x, y))))
    }

    pub fn unlock_all(&mut self) {
        let ids: Vec<_> = self.c.registry.technologies().map(|(id, _)| id).collect();
        for id in ids {
            let _ = self.tech.complete(id, 0);
        }
    }

    pub fn place(&mut self, def: BuildingTypeId, x: i32, y: i32, facing: Direction) -> BuildingId {
        let d = self.c.registry.get_building(def).unwrap();
        let origin = TilePosition::new(x, y);
        let instance = BuildingInstance::new(def, d, origin, facing, &self.c.registry);
        let footprint = instance.footprint;
        let id = self.arena.insert(instance);
        assert!(self.grid.place(origin, id, footprint), "placement at {origin:?}");
        building::relink_around(&mut self.arena, &self.grid, origin, footprint, Some(id));
        id
    }

    pub fn remove(&mut self, pos: TilePosition) -> Option<BuildingInstance> {
        let id = self.grid.remove(pos)?;
        let instance = self.arena.remove(id)?;
        building::forget_everywhere(&mut self.arena, id);
        building::relink_around(
            &mut self.arena,
            &self.grid,
            instance.origin,
            instance.footprint,
            None,
        );
        Some(instance)
    }

    pub fn insert(&mut self, id: BuildingId, item: ItemTypeId) -> bool {
        self.insert_n(id, item, 1)
    }

    pub fn insert_n(&mut self, id: BuildingId, item: ItemTypeId, count: u32) -> bool {
        self.arena
            .state_mut(id)
            .is_some_and(|s| s.insert(item, count, Direction::North, &self.c.registry))
    }

    pub fn step(&mut self) {
        building::clear_arrivals(&mut self.arena);
        let ids = self.arena.ids().to_vec();
        let mut ctx = StepContext {
            arena: &mut self.arena,
            registry: &self.c.registry,
            tech: &self.tech,
            events: &mut self.events,
            tick: self.tick,
            satisfaction: self.satisfaction,
        };
        for id in ids {
            building::step_building(id, &mut ctx);
        }
        self.tick += 1;
    }
}
