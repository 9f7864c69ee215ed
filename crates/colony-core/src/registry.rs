use crate::fixed::{Fixed64, Ticks, secs_to_ticks};
use crate::id::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An item type definition in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDef {
    pub name: String,
    /// Maximum units per slot. Always >= 1 once registered.
    pub stack_size: u32,
    /// Energy released when burned, in kJ. Zero means "not a fuel".
    pub fuel_value: Fixed64,
    /// Fluids never ride belts or sit in chests.
    pub fluid: bool,
}

impl ItemDef {
    pub fn new(name: &str, stack_size: u32) -> Self {
        Self {
            name: name.to_string(),
            stack_size,
            fuel_value: Fixed64::ZERO,
            fluid: false,
        }
    }

    pub fn with_fuel_value(mut self, kj: Fixed64) -> Self {
        self.fuel_value = kj;
        self
    }

    pub fn fluid(mut self) -> Self {
        self.fluid = true;
        self
    }
}

/// Which kind of machine may craft a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CraftingCategory {
    Hand,
    Smelting,
    Assembling,
}

/// A recipe ingredient, result, or cost entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeEntry {
    pub item: ItemTypeId,
    pub quantity: u32,
}

impl RecipeEntry {
    pub fn new(item: ItemTypeId, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

/// A recipe definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDef {
    pub name: String,
    pub ingredients: Vec<RecipeEntry>,
    pub results: Vec<RecipeEntry>,
    /// Crafting time in whole ticks at speed 1.0.
    pub duration: Ticks,
    pub category: CraftingCategory,
    /// `None` means always enabled.
    pub unlocked_by: Option<TechId>,
}

impl RecipeDef {
    /// Build a recipe from a crafting time in seconds.
    pub fn new(
        name: &str,
        category: CraftingCategory,
        ingredients: Vec<RecipeEntry>,
        results: Vec<RecipeEntry>,
        crafting_secs: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            ingredients,
            results,
            duration: secs_to_ticks(crafting_secs).max(1),
            category,
            unlocked_by: None,
        }
    }

    pub fn unlocked_by(mut self, tech: TechId) -> Self {
        self.unlocked_by = Some(tech);
        self
    }

    pub fn uses_ingredient(&self, item: ItemTypeId) -> bool {
        self.ingredients.iter().any(|e| e.item == item)
    }
}

/// What completing a technology unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unlock {
    Recipe(RecipeId),
    Building(BuildingTypeId),
}

/// A technology definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechnologyDef {
    pub name: String,
    pub prerequisites: Vec<TechId>,
    /// Science packs required to complete the research.
    pub cost: Vec<RecipeEntry>,
    /// Filled in by [`RegistryBuilder::build`] from the recipes and
    /// buildings gated on this technology.
    pub unlocks: Vec<Unlock>,
}

impl TechnologyDef {
    pub fn new(name: &str, prerequisites: Vec<TechId>, cost: Vec<RecipeEntry>) -> Self {
        Self {
            name: name.to_string(),
            prerequisites,
            cost,
            unlocks: Vec::new(),
        }
    }
}

/// Per-kind parameters of a building definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Tiles per second.
    Conveyor { speed: Fixed64 },
    /// `reach` is 1 for a normal inserter and 2 for a long one.
    Inserter { swing_ticks: u32, reach: u8 },
    /// `fuel_kw == 0` means the furnace is not fuel-gated.
    Furnace {
        speed: Fixed64,
        fuel_kw: Fixed64,
        input_slots: u8,
    },
    Assembler { speed: Fixed64 },
    Chest { slots: u8 },
    Generator { output_kw: Fixed64 },
    Accumulator { capacity_kj: Fixed64 },
    /// Decorative or power-only structure.
    Pole,
}

/// A building definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingDef {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub cost: Vec<RecipeEntry>,
    /// Electric draw in kW. Zero means the building needs no power.
    pub power_kw: Fixed64,
    pub unlocked_by: Option<TechId>,
    pub kind: BuildingKind,
}

impl BuildingDef {
    /// A 1x1 building with no cost and no power draw.
    pub fn new(name: &str, kind: BuildingKind) -> Self {
        Self {
            name: name.to_string(),
            width: 1,
            height: 1,
            cost: Vec::new(),
            power_kw: Fixed64::ZERO,
            unlocked_by: None,
            kind,
        }
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn cost(mut self, cost: Vec<RecipeEntry>) -> Self {
        self.cost = cost;
        self
    }

    pub fn power(mut self, kw: Fixed64) -> Self {
        self.power_kw = kw;
        self
    }

    pub fn unlocked_by(mut self, tech: TechId) -> Self {
        self.unlocked_by = Some(tech);
        self
    }
}

/// Builder for constructing an immutable Registry.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    technologies: Vec<TechnologyDef>,
    tech_name_to_id: HashMap<String, TechId>,
    buildings: Vec<BuildingDef>,
    building_name_to_id: HashMap<String, BuildingTypeId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register an item type. Returns its ID.
    pub fn register_item(&mut self, def: ItemDef) -> ItemTypeId {
        let id = ItemTypeId(self.items.len() as u32);
        self.item_name_to_id.insert(def.name.clone(), id);
        self.items.push(def);
        id
    }

    /// Phase 1: Register a technology. Returns its ID.
    pub fn register_technology(&mut self, def: TechnologyDef) -> TechId {
        let id = TechId(self.technologies.len() as u32);
        self.tech_name_to_id.insert(def.name.clone(), id);
        self.technologies.push(def);
        id
    }

    /// Phase 1: Register a recipe. Returns its ID.
    pub fn register_recipe(&mut self, def: RecipeDef) -> RecipeId {
        let id = RecipeId(self.recipes.len() as u32);
        self.recipe_name_to_id.insert(def.name.clone(), id);
        self.recipes.push(def);
        id
    }

    /// Phase 1: Register a building definition. Returns its ID.
    pub fn register_building(&mut self, def: BuildingDef) -> BuildingTypeId {
        let id = BuildingTypeId(self.buildings.len() as u32);
        self.building_name_to_id.insert(def.name.clone(), id);
        self.buildings.push(def);
        id
    }

    /// Phase 2: Mutate an existing recipe by name.
    pub fn mutate_recipe<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut RecipeDef),
    {
        let id = self
            .recipe_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.recipes[id.0 as usize]);
        Ok(())
    }

    /// Phase 2: Mutate an existing building definition by name.
    pub fn mutate_building<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut BuildingDef),
    {
        let id = self
            .building_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.buildings[id.0 as usize]);
        Ok(())
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    pub fn tech_id(&self, name: &str) -> Option<TechId> {
        self.tech_name_to_id.get(name).copied()
    }

    pub fn building_id(&self, name: &str) -> Option<BuildingTypeId> {
        self.building_name_to_id.get(name).copied()
    }

    /// Phase 3: Validate references and build the immutable registry.
    pub fn build(mut self) -> Result<Registry, RegistryError> {
        let item_count = self.items.len();
        let tech_count = self.technologies.len();
        let check_item = |item: ItemTypeId| {
            if (item.0 as usize) < item_count {
                Ok(())
            } else {
                Err(RegistryError::InvalidItemRef(item))
            }
        };
        let check_tech = |tech: TechId| {
            if (tech.0 as usize) < tech_count {
                Ok(())
            } else {
                Err(RegistryError::InvalidTechRef(tech))
            }
        };

        for item in &self.items {
            if item.stack_size == 0 {
                return Err(RegistryError::ZeroStackSize(item.name.clone()));
            }
        }
        for (index, tech) in self.technologies.iter().enumerate() {
            for prereq in &tech.prerequisites {
                // Prerequisites must be registered first, which also rules out cycles.
                if prereq.0 as usize >= index {
                    return Err(RegistryError::InvalidTechRef(*prereq));
                }
            }
            for entry in &tech.cost {
                check_item(entry.item)?;
            }
        }
        for recipe in &self.recipes {
            for entry in recipe.ingredients.iter().chain(recipe.results.iter()) {
                check_item(entry.item)?;
            }
            if let Some(tech) = recipe.unlocked_by {
                check_tech(tech)?;
            }
        }
        for building in &self.buildings {
            for entry in &building.cost {
                check_item(entry.item)?;
            }
            if let Some(tech) = building.unlocked_by {
                check_tech(tech)?;
            }
            if building.width == 0 || building.height == 0 {
                return Err(RegistryError::EmptyFootprint(building.name.clone()));
            }
        }

        for tech in &mut self.technologies {
            tech.unlocks.clear();
        }
        for (index, recipe) in self.recipes.iter().enumerate() {
            if let Some(tech) = recipe.unlocked_by {
                self.technologies[tech.0 as usize]
                    .unlocks
                    .push(Unlock::Recipe(RecipeId(index as u32)));
            }
        }
        for (index, building) in self.buildings.iter().enumerate() {
            if let Some(tech) = building.unlocked_by {
                self.technologies[tech.0 as usize]
                    .unlocks
                    .push(Unlock::Building(BuildingTypeId(index as u32)));
            }
        }

        let mut by_category: HashMap<CraftingCategory, Vec<RecipeId>> = HashMap::new();
        for (index, recipe) in self.recipes.iter().enumerate() {
            by_category
                .entry(recipe.category)
                .or_default()
                .push(RecipeId(index as u32));
        }

        Ok(Registry {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            recipes: self.recipes,
            recipe_name_to_id: self.recipe_name_to_id,
            technologies: self.technologies,
            tech_name_to_id: self.tech_name_to_id,
            buildings: self.buildings,
            building_name_to_id: self.building_name_to_id,
            by_category,
        })
    }
}

/// Immutable registry. Frozen after build(). Thread-safe to share.
#[derive(Debug)]
pub struct Registry {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    technologies: Vec<TechnologyDef>,
    tech_name_to_id: HashMap<String, TechId>,
    buildings: Vec<BuildingDef>,
    building_name_to_id: HashMap<String, BuildingTypeId>,
    by_category: HashMap<CraftingCategory, Vec<RecipeId>>,
}

impl Registry {
    pub fn get_item(&self, id: ItemTypeId) -> Option<&ItemDef> {
        self.items.get(id.0 as usize)
    }

    pub fn get_recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn get_technology(&self, id: TechId) -> Option<&TechnologyDef> {
        self.technologies.get(id.0 as usize)
    }

    pub fn get_building(&self, id: BuildingTypeId) -> Option<&BuildingDef> {
        self.buildings.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    pub fn tech_id(&self, name: &str) -> Option<TechId> {
        self.tech_name_to_id.get(name).copied()
    }

    pub fn building_id(&self, name: &str) -> Option<BuildingTypeId> {
        self.building_name_to_id.get(name).copied()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    pub fn technology_count(&self) -> usize {
        self.technologies.len()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// All technologies with their ids, in registration order.
    pub fn technologies(&self) -> impl Iterator<Item = (TechId, &TechnologyDef)> {
        self.technologies
            .iter()
            .enumerate()
            .map(|(i, t)| (TechId(i as u32), t))
    }

    /// Recipes of one crafting category, in registration order.
    pub fn recipes_in_category(&self, category: CraftingCategory) -> &[RecipeId] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Stack size of an item; zero for unknown items, so nothing fits.
    pub fn stack_size(&self, item: ItemTypeId) -> u32 {
        self.get_item(item).map(|d| d.stack_size).unwrap_or(0)
    }

    pub fn fuel_value(&self, item: ItemTypeId) -> Fixed64 {
        self.get_item(item)
            .map(|d| d.fuel_value)
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn is_fuel(&self, item: ItemTypeId) -> bool {
        self.fuel_value(item) > Fixed64::ZERO
    }

    pub fn is_fluid(&self, item: ItemTypeId) -> bool {
        self.get_item(item).map(|d| d.fluid).unwrap_or(false)
    }

    pub fn item_name(&self, item: ItemTypeId) -> Option<&str> {
        self.get_item(item).map(|d| d.name.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemTypeId),
    #[error("invalid technology reference: {0:?}")]
    InvalidTechRef(TechId),
    #[error("item {0} has a stack size of zero")]
    ZeroStackSize(String),
    #[error("building {0} has an empty footprint")]
    EmptyFootprint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    #[test]
    fn register_and_lookup() {
        let mut b = RegistryBuilder::new();
        let ore = b.register_item(ItemDef::new("iron_ore", 50));
        let plate = b.register_item(ItemDef::new("iron_plate", 100));
        let smelt = b.register_recipe(RecipeDef::new(
            "smelt_iron",
            CraftingCategory::Smelting,
            vec![RecipeEntry::new(ore, 1)],
            vec![RecipeEntry::new(plate, 1)],
            3.2,
        ));
        let reg = b.build().unwrap();

        assert_eq!(reg.item_id("iron_ore"), Some(ore));
        assert_eq!(reg.recipe_id("smelt_iron"), Some(smelt));
        assert_eq!(reg.get_recipe(smelt).unwrap().duration, 192);
        assert_eq!(reg.stack_size(plate), 100);
        assert_eq!(reg.recipes_in_category(CraftingCategory::Smelting), &[smelt]);
        assert!(reg.recipes_in_category(CraftingCategory::Hand).is_empty());
    }

    #[test]
    fn fuel_and_fluid_flags() {
        let mut b = RegistryBuilder::new();
        let coal = b.register_item(ItemDef::new("coal", 50).with_fuel_value(fixed(4000.0)));
        let water = b.register_item(ItemDef::new("water", 1000).fluid());
        let reg = b.build().unwrap();

        assert!(reg.is_fuel(coal));
        assert!(!reg.is_fuel(water));
        assert!(reg.is_fluid(water));
        assert_eq!(reg.fuel_value(coal), fixed(4000.0));
        assert_eq!(reg.stack_size(ItemTypeId(99)), 0);
    }

    #[test]
    fn unlocks_are_derived_from_gated_content() {
        let mut b = RegistryBuilder::new();
        let pack = b.register_item(ItemDef::new("red_science", 200));
        let gear = b.register_item(ItemDef::new("gear", 100));
        let auto = b.register_technology(TechnologyDef::new(
            "automation",
            vec![],
            vec![RecipeEntry::new(pack, 10)],
        ));
        let recipe = b.register_recipe(
            RecipeDef::new(
                "gear",
                CraftingCategory::Assembling,
                vec![],
                vec![RecipeEntry::new(gear, 1)],
                0.5,
            )
            .unlocked_by(auto),
        );
        let assembler = b.register_building(
            BuildingDef::new("assembler", BuildingKind::Assembler { speed: fixed(0.5) })
                .size(3, 3)
                .unlocked_by(auto),
        );
        let reg = b.build().unwrap();
        let tech = reg.get_technology(auto).unwrap();
        assert_eq!(
            tech.unlocks,
            vec![Unlock::Recipe(recipe), Unlock::Building(assembler)]
        );
    }

    #[test]
    fn invalid_item_reference_rejected() {
        let mut b = RegistryBuilder::new();
        b.register_recipe(RecipeDef::new(
            "bad",
            CraftingCategory::Hand,
            vec![RecipeEntry::new(ItemTypeId(7), 1)],
            vec![],
            1.0,
        ));
        assert!(matches!(b.build(), Err(RegistryError::InvalidItemRef(_))));
    }

    #[test]
    fn prerequisite_must_precede_technology() {
        let mut b = RegistryBuilder::new();
        b.register_technology(TechnologyDef::new("a", vec![TechId(1)], vec![]));
        b.register_technology(TechnologyDef::new("b", vec![], vec![]));
        assert!(matches!(b.build(), Err(RegistryError::InvalidTechRef(_))));
    }

    #[test]
    fn zero_stack_size_rejected() {
        let mut b = RegistryBuilder::new();
        b.register_item(ItemDef::new("ghost", 0));
        assert!(matches!(b.build(), Err(RegistryError::ZeroStackSize(_))));
    }

    #[test]
    fn mutate_building_by_name() {
        let mut b = RegistryBuilder::new();
        b.register_building(BuildingDef::new(
            "belt",
            BuildingKind::Conveyor { speed: fixed(1.875) },
        ));
        b.mutate_building("belt", |d| d.kind = BuildingKind::Conveyor { speed: fixed(3.75) })
            .unwrap();
        assert!(b.mutate_building("missing", |_| {}).is_err());
        let reg = b.build().unwrap();
        let belt = reg.get_building(reg.building_id("belt").unwrap()).unwrap();
        assert_eq!(belt.kind, BuildingKind::Conveyor { speed: fixed(3.75) });
    }
}
