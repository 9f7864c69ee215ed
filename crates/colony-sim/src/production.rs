//! Furnaces and assemblers.
//!
//! Both run the same state machine:
//!
//! ```text
//!            ingredients present,          progress >= duration
//!            results fit                   (results emitted)
//!   Idle ───────────────────────► Active ───────────────────────► Idle
//!                                  │  ▲
//!                  burn time spent,│  │ fuel arrives
//!                  no fuel         ▼  │
//!                               FuelPending
//! ```
//!
//! Progress is counted in work ticks: a unit advances by
//! `speed * satisfaction` per tick and finishes once it reaches the
//! recipe's duration in ticks. Fuel-gated units (`fuel_kw > 0`) burn one
//! fuel item whenever their remaining burn time runs out, converting
//! `fuel_value / fuel_kw` seconds of energy into burn ticks.
//!
//! Furnaces pick their recipe automatically from every unlocked smelting
//! recipe, in registry order. Assemblers run the single recipe assigned to
//! them.

use colony_core::fixed::{Fixed64, TICKS_PER_SECOND};
use colony_core::id::{BuildingId, ItemTypeId, RecipeId};
use colony_core::item::ItemSlot;
use colony_core::registry::{CraftingCategory, RecipeDef, RecipeEntry, Registry};
use colony_spatial::Direction;
use serde::{Deserialize, Serialize};

use crate::building::StepContext;
use crate::event::Event;
use crate::transfer::TransferProtocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionKind {
    Furnace,
    Assembler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProductionState {
    #[default]
    Idle,
    Active,
    FuelPending,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductionError {
    #[error("cannot change recipe while a craft is in progress")]
    Busy,
    #[error("furnaces choose their recipe automatically")]
    NotAssignable,
    #[error("recipe not found: {0:?}")]
    UnknownRecipe(RecipeId),
    #[error("recipe {0:?} is not an assembling recipe")]
    WrongCategory(RecipeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductionUnit {
    pub(crate) kind: ProductionKind,
    pub(crate) state: ProductionState,
    /// Assigned recipe. Always `None` for furnaces.
    pub(crate) recipe: Option<RecipeId>,
    /// Recipe whose ingredients were consumed for the current craft.
    pub(crate) active_recipe: Option<RecipeId>,
    /// Work ticks accumulated toward `active_recipe`.
    pub(crate) progress: Fixed64,
    pub(crate) inputs: Vec<ItemSlot>,
    pub(crate) outputs: Vec<ItemSlot>,
    pub(crate) fuel: ItemSlot,
    /// Remaining burn time in ticks.
    pub(crate) burn_remaining: Fixed64,
    speed: Fixed64,
    fuel_kw: Fixed64,
}

impl ProductionUnit {
    pub fn furnace(speed: Fixed64, fuel_kw: Fixed64, input_slots: u8, registry: &Registry) -> Self {
        let output_slots = registry
            .recipes_in_category(CraftingCategory::Smelting)
            .iter()
            .filter_map(|&r| registry.get_recipe(r))
            .map(|r| r.results.len())
            .max()
            .unwrap_or(1)
            .max(1);
        Self {
            kind: ProductionKind::Furnace,
            state: ProductionState::Idle,
            recipe: None,
            active_recipe: None,
            progress: Fixed64::ZERO,
            inputs: vec![ItemSlot::new(); usize::from(input_slots.max(1))],
            outputs: vec![ItemSlot::new(); output_slots],
            fuel: ItemSlot::new(),
            burn_remaining: Fixed64::ZERO,
            speed,
            fuel_kw,
        }
    }

    pub fn assembler(speed: Fixed64) -> Self {
        Self {
            kind: ProductionKind::Assembler,
            state: ProductionState::Idle,
            recipe: None,
            active_recipe: None,
            progress: Fixed64::ZERO,
            inputs: Vec::new(),
            outputs: Vec::new(),
            fuel: ItemSlot::new(),
            burn_remaining: Fixed64::ZERO,
            speed,
            fuel_kw: Fixed64::ZERO,
        }
    }

    pub fn kind(&self) -> ProductionKind {
        self.kind
    }

    pub fn state(&self) -> ProductionState {
        self.state
    }

    pub fn recipe(&self) -> Option<RecipeId> {
        self.recipe
    }

    pub fn active_recipe(&self) -> Option<RecipeId> {
        self.active_recipe
    }

    pub fn progress(&self) -> Fixed64 {
        self.progress
    }

    pub fn inputs(&self) -> &[ItemSlot] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ItemSlot] {
        &self.outputs
    }

    pub fn fuel(&self) -> &ItemSlot {
        &self.fuel
    }

    pub fn burn_remaining(&self) -> Fixed64 {
        self.burn_remaining
    }

    pub fn is_fuel_gated(&self) -> bool {
        self.fuel_kw > Fixed64::ZERO
    }

    /// Units of `item` sitting in the output slots.
    pub fn output_count(&self, item: ItemTypeId) -> u32 {
        self.outputs
            .iter()
            .filter(|s| s.item() == Some(item))
            .map(ItemSlot::count)
            .sum()
    }

    pub fn input_count(&self, item: ItemTypeId) -> u32 {
        self.inputs
            .iter()
            .filter(|s| s.item() == Some(item))
            .map(ItemSlot::count)
            .sum()
    }

    /// Assign (or clear) an assembler's recipe. Returns the items emptied
    /// out of the input and output slots, which the caller hands back to
    /// the player.
    pub fn assign_recipe(
        &mut self,
        recipe: Option<RecipeId>,
        registry: &Registry,
    ) -> Result<Vec<(ItemTypeId, u32)>, ProductionError> {
        if self.kind != ProductionKind::Assembler {
            return Err(ProductionError::NotAssignable);
        }
        if self.state != ProductionState::Idle {
            return Err(ProductionError::Busy);
        }
        let def = match recipe {
            Some(id) => {
                let def = registry
                    .get_recipe(id)
                    .ok_or(ProductionError::UnknownRecipe(id))?;
                if def.category != CraftingCategory::Assembling {
                    return Err(ProductionError::WrongCategory(id));
                }
                Some(def)
            }
            None => None,
        };
        let returned = drain_slots(&mut self.inputs)
            .into_iter()
            .chain(drain_slots(&mut self.outputs))
            .collect();
        self.recipe = recipe;
        self.inputs = vec![ItemSlot::new(); def.map_or(0, |d| d.ingredients.len())];
        self.outputs = vec![ItemSlot::new(); def.map_or(0, |d| d.results.len())];
        self.progress = Fixed64::ZERO;
        Ok(returned)
    }

    /// Empty every slot. An in-progress craft is abandoned.
    pub(crate) fn drain(&mut self) -> Vec<(ItemTypeId, u32)> {
        let mut items = drain_slots(&mut self.inputs);
        items.extend(drain_slots(&mut self.outputs));
        items.extend(self.fuel.clear().map(|s| (s.item(), s.count())));
        self.state = ProductionState::Idle;
        self.active_recipe = None;
        self.progress = Fixed64::ZERO;
        items
    }

    /// Restore invariants after loading saved state.
    pub(crate) fn normalize(&mut self, registry: &Registry) {
        if self.kind == ProductionKind::Assembler {
            let def = self.recipe.and_then(|r| registry.get_recipe(r));
            self.inputs
                .resize(def.map_or(0, |d| d.ingredients.len()), ItemSlot::new());
            self.outputs
                .resize(def.map_or(0, |d| d.results.len()), ItemSlot::new());
        }
        if self
            .active_recipe
            .is_some_and(|r| registry.get_recipe(r).is_none())
        {
            self.active_recipe = None;
        }
        match self.active_recipe {
            None => {
                self.state = ProductionState::Idle;
                self.progress = Fixed64::ZERO;
            }
            Some(_) => {
                let pending_without_fuel =
                    self.state == ProductionState::FuelPending && !self.is_fuel_gated();
                if self.state == ProductionState::Idle || pending_without_fuel {
                    self.state = ProductionState::Active;
                }
            }
        }
        self.progress = self.progress.max(Fixed64::ZERO);
        self.burn_remaining = self.burn_remaining.max(Fixed64::ZERO);
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    pub(crate) fn step(&mut self, id: BuildingId, satisfaction: Fixed64, ctx: &mut StepContext<'_>) {
        if self.state == ProductionState::Idle {
            self.try_start(id, ctx);
        }
        let Some(recipe_id) = self.active_recipe else {
            return;
        };

        if self.is_fuel_gated() && self.burn_remaining <= Fixed64::ZERO {
            match self.fuel.take_one() {
                Some(fuel) => {
                    // kJ / kW = seconds
                    let energy = ctx.registry.fuel_value(fuel) * Fixed64::from_num(TICKS_PER_SECOND);
                    self.burn_remaining += energy / self.fuel_kw;
                }
                None => {
                    self.state = ProductionState::FuelPending;
                    return;
                }
            }
        }
        self.state = ProductionState::Active;

        self.progress += self.speed * satisfaction;
        if self.is_fuel_gated() {
            self.burn_remaining -= Fixed64::ONE;
        }

        let Some(recipe) = ctx.registry.get_recipe(recipe_id) else {
            self.state = ProductionState::Idle;
            self.active_recipe = None;
            return;
        };
        if self.progress >= Fixed64::from_num(recipe.duration) {
            for result in &recipe.results {
                // Space was reserved when the craft started.
                let _ = place_entry(
                    &mut self.outputs,
                    result,
                    ctx.registry.stack_size(result.item),
                );
            }
            self.state = ProductionState::Idle;
            self.active_recipe = None;
            self.progress = Fixed64::ZERO;
            ctx.events.push(Event::RecipeCompleted {
                building: id,
                recipe: recipe_id,
                tick: ctx.tick,
            });
        }
    }

    fn try_start(&mut self, id: BuildingId, ctx: &mut StepContext<'_>) {
        let chosen = self.candidates(ctx.registry).into_iter().find(|&r| {
            ctx.tech.is_recipe_unlocked(ctx.registry, r)
                && ctx
                    .registry
                    .get_recipe(r)
                    .is_some_and(|def| self.can_start(def, ctx.registry))
        });
        let Some(recipe_id) = chosen else {
            return;
        };
        let Some(def) = ctx.registry.get_recipe(recipe_id) else {
            return;
        };
        for entry in &def.ingredients {
            take_from_slots(&mut self.inputs, entry.item, entry.quantity);
        }
        self.active_recipe = Some(recipe_id);
        self.progress = Fixed64::ZERO;
        self.state = ProductionState::Active;
        ctx.events.push(Event::RecipeStarted {
            building: id,
            recipe: recipe_id,
            tick: ctx.tick,
        });
    }

    fn candidates(&self, registry: &Registry) -> Vec<RecipeId> {
        match self.kind {
            ProductionKind::Furnace => registry
                .recipes_in_category(CraftingCategory::Smelting)
                .to_vec(),
            ProductionKind::Assembler => self.recipe.into_iter().collect(),
        }
    }

    fn can_start(&self, def: &RecipeDef, registry: &Registry) -> bool {
        let inputs_ok = def.ingredients.iter().all(|e| {
            let needed: u32 = def
                .ingredients
                .iter()
                .filter(|o| o.item == e.item)
                .map(|o| o.quantity)
                .sum();
            self.input_count(e.item) >= needed
        });
        if !inputs_ok {
            return false;
        }
        let mut outputs = self.outputs.clone();
        def.results
            .iter()
            .all(|r| place_entry(&mut outputs, r, registry.stack_size(r.item)))
    }

    /// Whether `item` is an ingredient this unit could ever use.
    fn wants_ingredient(&self, item: ItemTypeId, registry: &Registry) -> bool {
        self.candidates(registry)
            .into_iter()
            .filter_map(|r| registry.get_recipe(r))
            .any(|def| def.uses_ingredient(item))
    }

    fn input_slot_for(&self, item: ItemTypeId, count: u32, registry: &Registry) -> Option<usize> {
        let stack_size = registry.stack_size(item);
        match self.kind {
            ProductionKind::Furnace => self
                .inputs
                .iter()
                .position(|s| s.item() == Some(item))
                .or_else(|| self.inputs.iter().position(ItemSlot::is_empty))
                .filter(|&i| self.inputs[i].can_fit(item, count, stack_size)),
            ProductionKind::Assembler => {
                let def = self.recipe.and_then(|r| registry.get_recipe(r))?;
                def.ingredients
                    .iter()
                    .position(|e| e.item == item)
                    .filter(|&i| {
                        self.inputs
                            .get(i)
                            .is_some_and(|s| s.can_fit(item, count, stack_size))
                    })
            }
        }
    }

    fn takes_as_fuel(&self, item: ItemTypeId, registry: &Registry) -> bool {
        self.is_fuel_gated() && registry.is_fuel(item)
    }

    /// Where `count` units of `item` would go, if they fit.
    fn insert_target(&self, item: ItemTypeId, count: u32, registry: &Registry) -> Option<SlotTarget> {
        if count == 0 || registry.is_fluid(item) {
            return None;
        }
        if self.takes_as_fuel(item, registry) {
            return self
                .fuel
                .can_fit(item, count, registry.stack_size(item))
                .then_some(SlotTarget::Fuel);
        }
        if !self.wants_ingredient(item, registry) {
            return None;
        }
        self.input_slot_for(item, count, registry).map(SlotTarget::Input)
    }
}

enum SlotTarget {
    Fuel,
    Input(usize),
}

impl TransferProtocol for ProductionUnit {
    fn can_accept(&self, item: ItemTypeId, _from: Direction, registry: &Registry) -> bool {
        self.insert_target(item, 1, registry).is_some()
    }

    fn insert(
        &mut self,
        item: ItemTypeId,
        count: u32,
        _from: Direction,
        registry: &Registry,
    ) -> bool {
        let stack_size = registry.stack_size(item);
        let slot = match self.insert_target(item, count, registry) {
            Some(SlotTarget::Fuel) => &mut self.fuel,
            Some(SlotTarget::Input(i)) => &mut self.inputs[i],
            None => return false,
        };
        slot.add(item, count, stack_size) == 0
    }

    fn has_output(&self, _to: Direction) -> Option<ItemTypeId> {
        self.outputs.iter().find_map(ItemSlot::item)
    }

    fn extract(&mut self, _to: Direction) -> Option<ItemTypeId> {
        self.outputs.iter_mut().find_map(|s| s.take_one())
    }
}

// ---------------------------------------------------------------------------
// Slot helpers
// ---------------------------------------------------------------------------

fn drain_slots(slots: &mut [ItemSlot]) -> Vec<(ItemTypeId, u32)> {
    slots
        .iter_mut()
        .filter_map(|s| s.clear().map(|stack| (stack.item(), stack.count())))
        .collect()
}

fn take_from_slots(slots: &mut [ItemSlot], item: ItemTypeId, mut count: u32) {
    for slot in slots.iter_mut().filter(|s| s.item() == Some(item)) {
        if count == 0 {
            break;
        }
        if let Some((_, taken)) = slot.take(count) {
            count -= taken;
        }
    }
}

/// Add a whole entry to the first matching slot with room, else the first
/// empty slot. Returns false without mutation if it does not fit.
fn place_entry(slots: &mut [ItemSlot], entry: &RecipeEntry, stack_size: u32) -> bool {
    let target = slots
        .iter()
        .position(|s| s.item() == Some(entry.item) && s.can_fit(entry.item, entry.quantity, stack_size))
        .or_else(|| {
            slots
                .iter()
                .position(|s| s.is_empty() && s.can_fit(entry.item, entry.quantity, stack_size))
        });
    match target {
        Some(i) => slots[i].add(entry.item, entry.quantity, stack_size) == 0,
        None => false,
    }
}
