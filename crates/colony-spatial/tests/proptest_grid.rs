//! Property-based tests for grid occupancy.
//!
//! Random place/remove sequences on a fully founded area must keep the
//! tile map and the per-building placement records in agreement.

use colony_core::id::BuildingId;
use colony_spatial::{Footprint, GridIndex, TilePosition};
use proptest::prelude::*;
use slotmap::SlotMap;

#[derive(Debug, Clone)]
enum GridOp {
    Place { x: i32, y: i32, w: u32, h: u32 },
    Remove { x: i32, y: i32 },
}

fn arb_ops(max_ops: usize) -> impl Strategy<Value = Vec<GridOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..8i32, 0..8i32, 1..4u32, 1..4u32)
                .prop_map(|(x, y, w, h)| GridOp::Place { x, y, w, h }),
            (0..8i32, 0..8i32).prop_map(|(x, y)| GridOp::Remove { x, y }),
        ],
        1..=max_ops,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn occupancy_matches_placements(ops in arb_ops(60)) {
        let mut grid = GridIndex::new();
        for y in 0..8 {
            for x in 0..8 {
                grid.add_foundation(TilePosition::new(x, y));
            }
        }
        let mut ids = SlotMap::<BuildingId, ()>::with_key();
        let mut live: Vec<BuildingId> = Vec::new();

        for op in ops {
            match op {
                GridOp::Place { x, y, w, h } => {
                    let id = ids.insert(());
                    let origin = TilePosition::new(x, y);
                    let fp = Footprint::new(w, h);
                    let expected = grid.can_place(origin, fp);
                    prop_assert_eq!(grid.place(origin, id, fp), expected);
                    if expected {
                        live.push(id);
                    }
                }
                GridOp::Remove { x, y } => {
                    if let Some(id) = grid.remove(TilePosition::new(x, y)) {
                        live.retain(|&l| l != id);
                    }
                }
            }

            // Every live building covers exactly its footprint.
            let mut covered = 0;
            for &id in &live {
                let origin = grid.origin_of(id).unwrap();
                let fp = grid.footprint_of(id).unwrap();
                for tile in fp.tiles(origin) {
                    prop_assert_eq!(grid.building_at(tile), Some(id));
                    covered += 1;
                }
            }
            prop_assert_eq!(grid.tile_count(), covered);
            prop_assert_eq!(grid.building_count(), live.len());
        }
    }
}
