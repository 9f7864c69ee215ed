//! Criterion benchmarks for the colony world step.
//!
//! Two benchmark groups:
//! - `belt_lines`: 64 parallel belt lines of 60 tiles each, fed at the head
//! - `smelter_rows`: chest -> inserter -> furnace -> inserter -> chest rows

use std::sync::Arc;

use colony_core::test_utils::*;
use colony_sim::inventory::ItemStore;
use colony_sim::{SimConfig, World};
use colony_spatial::{Direction, TilePosition};
use criterion::{Criterion, criterion_group, criterion_main};

fn world_on(c: &TestContent, width: i32, height: i32) -> World {
    let mut world = World::new(Arc::new(test_content().registry), SimConfig::default());
    for y in 0..height {
        for x in 0..width {
            world.add_foundation(TilePosition::new(x, y));
        }
    }
    world.inventory_mut().add(c.iron_plate, 100_000);
    world.inventory_mut().add(c.gear, 100_000);
    world.inventory_mut().add(c.iron_ore, 100_000);
    world.inventory_mut().add(c.coal, 100_000);
    world
}

fn build_belt_lines(c: &TestContent) -> World {
    let (lines, length) = (64, 60);
    let mut world = world_on(c, length, lines);
    for y in 0..lines {
        for x in 0..length {
            let _ = world.place_building(TilePosition::new(x, y), c.belt, Direction::East);
        }
    }
    for _ in 0..5 {
        world.step();
    }
    world
}

fn build_smelter_rows(c: &TestContent) -> World {
    let rows = 16;
    let mut world = world_on(c, 6, rows * 2);
    for r in 0..rows {
        let y = r * 2;
        let _ = world.place_building(TilePosition::new(0, y), c.chest, Direction::North);
        let _ = world.place_building(TilePosition::new(1, y), c.burner_inserter, Direction::East);
        let _ = world.place_building(TilePosition::new(2, y), c.stone_furnace, Direction::North);
        let _ = world.place_building(TilePosition::new(4, y), c.burner_inserter, Direction::East);
        let _ = world.place_building(TilePosition::new(5, y), c.chest, Direction::North);
        let _ = world.insert_into(TilePosition::new(0, y), c.iron_ore, 50);
        let _ = world.insert_into(TilePosition::new(0, y), c.coal, 10);
    }
    world
}

fn bench_belt_lines(c: &mut Criterion) {
    let content = test_content();
    let mut world = build_belt_lines(&content);
    let heads: Vec<TilePosition> = (0..64).map(|y| TilePosition::new(0, y)).collect();
    c.bench_function("belt_lines", |b| {
        b.iter(|| {
            for &head in &heads {
                let _ = world.insert_into(head, content.iron_ore, 1);
            }
            world.step();
        })
    });
}

fn bench_smelter_rows(c: &mut Criterion) {
    let content = test_content();
    let mut world = build_smelter_rows(&content);
    c.bench_function("smelter_rows", |b| {
        b.iter(|| {
            world.step();
        })
    });
}

criterion_group!(benches, bench_belt_lines, bench_smelter_rows);
criterion_main!(benches);
