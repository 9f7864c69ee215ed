//! Data-driven registry loading from JSON.
//!
//! Feature-gated behind `data-loader`. Content files reference items,
//! technologies and recipes by name; names are resolved to ids here, in
//! the order items -> technologies -> recipes -> buildings.

use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::{ItemTypeId, TechId};
use crate::registry::{
    BuildingDef, BuildingKind, CraftingCategory, ItemDef, RecipeDef, RecipeEntry,
    RegistryBuilder, RegistryError, TechnologyDef,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("unknown item reference: {0}")]
    UnknownItemRef(String),
    #[error("unknown technology reference: {0}")]
    UnknownTechRef(String),
}

// ---------------------------------------------------------------------------
// JSON data structures
// ---------------------------------------------------------------------------

/// Top-level registry data structure for JSON deserialization.
#[derive(Debug, serde::Deserialize)]
pub struct RegistryData {
    #[serde(default)]
    pub items: Vec<ItemData>,
    #[serde(default)]
    pub technologies: Vec<TechnologyData>,
    #[serde(default)]
    pub recipes: Vec<RecipeData>,
    #[serde(default)]
    pub buildings: Vec<BuildingData>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ItemData {
    pub name: String,
    pub stack_size: u32,
    /// kJ released when burned.
    #[serde(default)]
    pub fuel_value: f64,
    #[serde(default)]
    pub fluid: bool,
}

#[derive(Debug, serde::Deserialize)]
pub struct TechnologyData {
    pub name: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub cost: Vec<EntryData>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RecipeData {
    pub name: String,
    pub category: CraftingCategory,
    #[serde(default)]
    pub ingredients: Vec<EntryData>,
    #[serde(default)]
    pub results: Vec<EntryData>,
    /// Seconds at speed 1.0.
    pub crafting_time: f64,
    #[serde(default)]
    pub unlocked_by: Option<String>,
}

/// An item reference with a quantity.
#[derive(Debug, serde::Deserialize)]
pub struct EntryData {
    pub item: String,
    pub quantity: u32,
}

#[derive(Debug, serde::Deserialize)]
pub struct BuildingData {
    pub name: String,
    #[serde(default = "one")]
    pub width: u32,
    #[serde(default = "one")]
    pub height: u32,
    #[serde(default)]
    pub cost: Vec<EntryData>,
    #[serde(default)]
    pub power_kw: f64,
    #[serde(default)]
    pub unlocked_by: Option<String>,
    pub kind: KindData,
}

fn one() -> u32 {
    1
}

/// JSON form of [`BuildingKind`], with plain floats for the rates.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindData {
    Conveyor {
        speed: f64,
    },
    Inserter {
        swing_ticks: u32,
        #[serde(default = "one_u8")]
        reach: u8,
    },
    Furnace {
        speed: f64,
        #[serde(default)]
        fuel_kw: f64,
        #[serde(default = "one_u8")]
        input_slots: u8,
    },
    Assembler {
        speed: f64,
    },
    Chest {
        slots: u8,
    },
    Generator {
        output_kw: f64,
    },
    Accumulator {
        capacity_kj: f64,
    },
    Pole,
}

fn one_u8() -> u8 {
    1
}

impl From<&KindData> for BuildingKind {
    fn from(kind: &KindData) -> Self {
        match *kind {
            KindData::Conveyor { speed } => BuildingKind::Conveyor {
                speed: f64_to_fixed64(speed),
            },
            KindData::Inserter { swing_ticks, reach } => {
                BuildingKind::Inserter { swing_ticks, reach }
            }
            KindData::Furnace {
                speed,
                fuel_kw,
                input_slots,
            } => BuildingKind::Furnace {
                speed: f64_to_fixed64(speed),
                fuel_kw: f64_to_fixed64(fuel_kw),
                input_slots,
            },
            KindData::Assembler { speed } => BuildingKind::Assembler {
                speed: f64_to_fixed64(speed),
            },
            KindData::Chest { slots } => BuildingKind::Chest { slots },
            KindData::Generator { output_kw } => BuildingKind::Generator {
                output_kw: f64_to_fixed64(output_kw),
            },
            KindData::Accumulator { capacity_kj } => BuildingKind::Accumulator {
                capacity_kj: f64_to_fixed64(capacity_kj),
            },
            KindData::Pole => BuildingKind::Pole,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

/// Load a registry from a JSON string.
pub fn load_registry_json(json: &str) -> Result<RegistryBuilder, DataLoadError> {
    let data: RegistryData = serde_json::from_str(json)?;
    build_registry(data)
}

/// Load a registry from JSON bytes.
pub fn load_registry_json_bytes(bytes: &[u8]) -> Result<RegistryBuilder, DataLoadError> {
    let data: RegistryData = serde_json::from_slice(bytes)?;
    build_registry(data)
}

fn resolve_item(builder: &RegistryBuilder, name: &str) -> Result<ItemTypeId, DataLoadError> {
    builder
        .item_id(name)
        .ok_or_else(|| DataLoadError::UnknownItemRef(name.to_string()))
}

fn resolve_tech(builder: &RegistryBuilder, name: &str) -> Result<TechId, DataLoadError> {
    builder
        .tech_id(name)
        .ok_or_else(|| DataLoadError::UnknownTechRef(name.to_string()))
}

fn resolve_entries(
    builder: &RegistryBuilder,
    entries: &[EntryData],
) -> Result<Vec<RecipeEntry>, DataLoadError> {
    entries
        .iter()
        .map(|e| Ok(RecipeEntry::new(resolve_item(builder, &e.item)?, e.quantity)))
        .collect()
}

fn resolve_gate(
    builder: &RegistryBuilder,
    name: &Option<String>,
) -> Result<Option<TechId>, DataLoadError> {
    name.as_deref().map(|n| resolve_tech(builder, n)).transpose()
}

fn build_registry(data: RegistryData) -> Result<RegistryBuilder, DataLoadError> {
    let mut builder = RegistryBuilder::new();

    for item in &data.items {
        let mut def = ItemDef::new(&item.name, item.stack_size);
        if item.fuel_value > 0.0 {
            def = def.with_fuel_value(f64_to_fixed64(item.fuel_value));
        }
        if item.fluid {
            def = def.fluid();
        }
        builder.register_item(def);
    }

    // Prerequisites resolve against technologies already registered, so
    // the file must list them in dependency order.
    for tech in &data.technologies {
        let prerequisites = tech
            .prerequisites
            .iter()
            .map(|p| resolve_tech(&builder, p))
            .collect::<Result<Vec<_>, _>>()?;
        let cost = resolve_entries(&builder, &tech.cost)?;
        builder.register_technology(TechnologyDef::new(&tech.name, prerequisites, cost));
    }

    for recipe in &data.recipes {
        let ingredients = resolve_entries(&builder, &recipe.ingredients)?;
        let results = resolve_entries(&builder, &recipe.results)?;
        let mut def = RecipeDef::new(
            &recipe.name,
            recipe.category,
            ingredients,
            results,
            recipe.crafting_time,
        );
        def.unlocked_by = resolve_gate(&builder, &recipe.unlocked_by)?;
        builder.register_recipe(def);
    }

    for building in &data.buildings {
        let mut def = BuildingDef::new(&building.name, BuildingKind::from(&building.kind))
            .size(building.width, building.height)
            .cost(resolve_entries(&builder, &building.cost)?)
            .power(Fixed64::from_num(building.power_kw));
        def.unlocked_by = resolve_gate(&builder, &building.unlocked_by)?;
        builder.register_building(def);
    }

    Ok(builder)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_empty_json() {
        let json = r#"{"items": [], "recipes": [], "buildings": []}"#;
        let reg = load_registry_json(json).unwrap().build().unwrap();
        assert_eq!(reg.item_count(), 0);
        assert_eq!(reg.recipe_count(), 0);
        assert_eq!(reg.building_count(), 0);
        assert_eq!(reg.technology_count(), 0);
    }

    #[test]
    fn load_items_with_fuel_and_fluid() {
        let json = r#"{"items": [
            {"name": "coal", "stack_size": 50, "fuel_value": 4000},
            {"name": "water", "stack_size": 100, "fluid": true}
        ]}"#;
        let reg = load_registry_json(json).unwrap().build().unwrap();
        let coal = reg.item_id("coal").unwrap();
        let water = reg.item_id("water").unwrap();
        assert_eq!(reg.fuel_value(coal), Fixed64::from_num(4000));
        assert!(reg.is_fluid(water));
        assert!(!reg.is_fuel(water));
    }

    #[test]
    fn load_full_registry() {
        let json = r#"{
            "items": [
                {"name": "iron_ore", "stack_size": 50},
                {"name": "iron_plate", "stack_size": 100},
                {"name": "red_science", "stack_size": 200}
            ],
            "technologies": [
                {"name": "automation", "cost": [{"item": "red_science", "quantity": 10}]},
                {"name": "logistics", "prerequisites": ["automation"]}
            ],
            "recipes": [
                {
                    "name": "smelt_iron",
                    "category": "Smelting",
                    "ingredients": [{"item": "iron_ore", "quantity": 1}],
                    "results": [{"item": "iron_plate", "quantity": 1}],
                    "crafting_time": 3.2
                }
            ],
            "buildings": [
                {"name": "stone_furnace", "width": 2, "height": 2,
                 "cost": [{"item": "iron_plate", "quantity": 5}],
                 "kind": {"type": "furnace", "speed": 1.0, "fuel_kw": 90}},
                {"name": "long_inserter", "power_kw": 20, "unlocked_by": "automation",
                 "kind": {"type": "inserter", "swing_ticks": 30, "reach": 2}}
            ]
        }"#;
        let reg = load_registry_json(json).unwrap().build().unwrap();
        assert_eq!(reg.item_count(), 3);
        assert_eq!(reg.technology_count(), 2);

        let smelt = reg.get_recipe(reg.recipe_id("smelt_iron").unwrap()).unwrap();
        assert_eq!(smelt.duration, 192);
        assert_eq!(smelt.ingredients.len(), 1);

        let furnace = reg
            .get_building(reg.building_id("stone_furnace").unwrap())
            .unwrap();
        assert_eq!((furnace.width, furnace.height), (2, 2));
        assert_eq!(
            furnace.kind,
            BuildingKind::Furnace {
                speed: Fixed64::ONE,
                fuel_kw: Fixed64::from_num(90),
                input_slots: 1,
            }
        );

        let automation = reg.tech_id("automation").unwrap();
        let logistics = reg.get_technology(reg.tech_id("logistics").unwrap()).unwrap();
        assert_eq!(logistics.prerequisites, vec![automation]);
        assert_eq!(reg.get_technology(automation).unwrap().unlocks.len(), 1);
    }

    #[test]
    fn load_unknown_item_fails() {
        let json = r#"{
            "items": [{"name": "ore", "stack_size": 50}],
            "recipes": [{"name": "bad", "category": "Hand",
                "ingredients": [{"item": "nonexistent", "quantity": 1}],
                "crafting_time": 1.0}]
        }"#;
        assert!(matches!(
            load_registry_json(json).unwrap_err(),
            DataLoadError::UnknownItemRef(_)
        ));
    }

    #[test]
    fn load_unknown_tech_fails() {
        let json = r#"{
            "buildings": [{"name": "b1", "unlocked_by": "nope", "kind": {"type": "pole"}}]
        }"#;
        assert!(matches!(
            load_registry_json(json).unwrap_err(),
            DataLoadError::UnknownTechRef(_)
        ));
    }

    #[test]
    fn load_invalid_json_fails() {
        let result = load_registry_json("not valid json {{{");
        assert!(matches!(result.unwrap_err(), DataLoadError::JsonParse(_)));
    }

    #[test]
    fn load_bytes_matches_str() {
        let json = r#"{"items": [{"name": "a", "stack_size": 10}]}"#;
        let reg = load_registry_json_bytes(json.as_bytes())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(reg.stack_size(reg.item_id("a").unwrap()), 10);
    }
}
