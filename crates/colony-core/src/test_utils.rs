//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::fixed::Fixed64;
use crate::id::*;
use crate::registry::*;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Standard content
// ===========================================================================

/// A small but complete content set: ores, plates, fuel, a fluid, two
/// technologies, hand/smelting/assembling recipes and one building of
/// every kind.
pub struct TestContent {
    pub registry: Registry,

    pub iron_ore: ItemTypeId,
    pub iron_plate: ItemTypeId,
    pub copper_ore: ItemTypeId,
    pub copper_plate: ItemTypeId,
    pub coal: ItemTypeId,
    pub gear: ItemTypeId,
    pub red_science: ItemTypeId,
    pub water: ItemTypeId,

    pub automation: TechId,
    pub logistics: TechId,

    pub smelt_iron: RecipeId,
    pub smelt_copper: RecipeId,
    pub craft_gear: RecipeId,
    pub craft_red_science: RecipeId,

    /// 1.875 tiles/s.
    pub belt: BuildingTypeId,
    /// 7.5 tiles/s, unlocked by logistics.
    pub fast_belt: BuildingTypeId,
    /// 30-tick swing, 13 kW.
    pub inserter: BuildingTypeId,
    /// Reach 2, 20 kW.
    pub long_inserter: BuildingTypeId,
    /// Unpowered 1x1 inserter with a 10-tick swing.
    pub burner_inserter: BuildingTypeId,
    /// 2x2, 90 kW fuel.
    pub stone_furnace: BuildingTypeId,
    /// 3x3, speed 0.5, 75 kW, unlocked by automation.
    pub assembler: BuildingTypeId,
    /// 4 slots.
    pub chest: BuildingTypeId,
    pub generator: BuildingTypeId,
    pub accumulator: BuildingTypeId,
    pub pole: BuildingTypeId,
}

pub fn test_content() -> TestContent {
    let mut b = RegistryBuilder::new();

    let iron_ore = b.register_item(ItemDef::new("iron_ore", 50));
    let iron_plate = b.register_item(ItemDef::new("iron_plate", 100));
    let copper_ore = b.register_item(ItemDef::new("copper_ore", 50));
    let copper_plate = b.register_item(ItemDef::new("copper_plate", 100));
    let coal = b.register_item(ItemDef::new("coal", 50).with_fuel_value(fixed(4000.0)));
    let gear = b.register_item(ItemDef::new("gear", 100));
    let red_science = b.register_item(ItemDef::new("red_science", 200));
    let water = b.register_item(ItemDef::new("water", 1000).fluid());

    let automation = b.register_technology(TechnologyDef::new(
        "automation",
        vec![],
        vec![RecipeEntry::new(red_science, 10)],
    ));
    let logistics = b.register_technology(TechnologyDef::new(
        "logistics",
        vec![automation],
        vec![RecipeEntry::new(red_science, 20)],
    ));

    let smelt_iron = b.register_recipe(RecipeDef::new(
        "smelt_iron",
        CraftingCategory::Smelting,
        vec![RecipeEntry::new(iron_ore, 1)],
        vec![RecipeEntry::new(iron_plate, 1)],
        3.2,
    ));
    let smelt_copper = b.register_recipe(RecipeDef::new(
        "smelt_copper",
        CraftingCategory::Smelting,
        vec![RecipeEntry::new(copper_ore, 1)],
        vec![RecipeEntry::new(copper_plate, 1)],
        3.2,
    ));
    let craft_gear = b.register_recipe(RecipeDef::new(
        "gear",
        CraftingCategory::Hand,
        vec![RecipeEntry::new(iron_plate, 2)],
        vec![RecipeEntry::new(gear, 1)],
        0.5,
    ));
    let craft_red_science = b.register_recipe(
        RecipeDef::new(
            "red_science",
            CraftingCategory::Assembling,
            vec![RecipeEntry::new(copper_plate, 1), RecipeEntry::new(gear, 1)],
            vec![RecipeEntry::new(red_science, 1)],
            5.0,
        )
        .unlocked_by(automation),
    );

    let belt = b.register_building(
        BuildingDef::new("belt", BuildingKind::Conveyor { speed: fixed(1.875) })
            .cost(vec![RecipeEntry::new(iron_plate, 1)]),
    );
    let fast_belt = b.register_building(
        BuildingDef::new("fast_belt", BuildingKind::Conveyor { speed: fixed(7.5) })
            .cost(vec![RecipeEntry::new(iron_plate, 2)])
            .unlocked_by(logistics),
    );
    let inserter = b.register_building(
        BuildingDef::new(
            "inserter",
            BuildingKind::Inserter {
                swing_ticks: 30,
                reach: 1,
            },
        )
        .cost(vec![RecipeEntry::new(iron_plate, 1), RecipeEntry::new(gear, 1)])
        .power(fixed(13.0)),
    );
    let long_inserter = b.register_building(
        BuildingDef::new(
            "long_inserter",
            BuildingKind::Inserter {
                swing_ticks: 20,
                reach: 2,
            },
        )
        .power(fixed(20.0))
        .unlocked_by(automation),
    );
    let burner_inserter = b.register_building(BuildingDef::new(
        "burner_inserter",
        BuildingKind::Inserter {
            swing_ticks: 10,
            reach: 1,
        },
    ));
    let stone_furnace = b.register_building(
        BuildingDef::new(
            "stone_furnace",
            BuildingKind::Furnace {
                speed: Fixed64::ONE,
                fuel_kw: fixed(90.0),
                input_slots: 1,
            },
        )
        .size(2, 2),
    );
    let assembler = b.register_building(
        BuildingDef::new("assembler", BuildingKind::Assembler { speed: fixed(0.5) })
            .size(3, 3)
            .power(fixed(75.0))
            .unlocked_by(automation),
    );
    let chest = b.register_building(BuildingDef::new("chest", BuildingKind::Chest { slots: 4 }));
    let generator = b.register_building(
        BuildingDef::new(
            "generator",
            BuildingKind::Generator {
                output_kw: fixed(900.0),
            },
        )
        .size(2, 3),
    );
    let accumulator = b.register_building(
        BuildingDef::new(
            "accumulator",
            BuildingKind::Accumulator {
                capacity_kj: fixed(5000.0),
            },
        )
        .size(2, 2),
    );
    let pole = b.register_building(BuildingDef::new("pole", BuildingKind::Pole));

    let registry = b.build().expect("test content is valid");

    TestContent {
        registry,
        iron_ore,
        iron_plate,
        copper_ore,
        copper_plate,
        coal,
        gear,
        red_science,
        water,
        automation,
        logistics,
        smelt_iron,
        smelt_copper,
        craft_gear,
        craft_red_science,
        belt,
        fast_belt,
        inserter,
        long_inserter,
        burner_inserter,
        stone_furnace,
        assembler,
        chest,
        generator,
        accumulator,
        pole,
    }
}
