//! Hand crafting.
//!
//! Queued jobs pay their ingredients up front and complete one at a time
//! in FIFO order. Only the job at the front of the queue makes progress.

use std::collections::VecDeque;

use colony_core::fixed::Ticks;
use colony_core::id::RecipeId;
use colony_core::registry::{CraftingCategory, Registry};
use colony_tech_tree::TechTree;

use crate::event::{Event, EventQueue};
use crate::inventory::ItemStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CraftError {
    #[error("recipe not found: {0:?}")]
    UnknownRecipe(RecipeId),
    #[error("recipe {0:?} cannot be crafted by hand")]
    NotHandCraftable(RecipeId),
    #[error("recipe {0:?} is locked")]
    Locked(RecipeId),
    #[error("missing ingredients for recipe {0:?}")]
    MissingIngredients(RecipeId),
    #[error("no queued job at index {0}")]
    NoSuchJob(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CraftJob {
    pub recipe: RecipeId,
    /// Ticks until the job completes.
    pub remaining: Ticks,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CraftingQueue {
    jobs: VecDeque<CraftJob>,
}

impl CraftingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a hand recipe, paying its ingredients from `store`.
    pub fn queue(
        &mut self,
        recipe: RecipeId,
        registry: &Registry,
        tech: &TechTree,
        store: &mut impl ItemStore,
    ) -> Result<(), CraftError> {
        let def = registry
            .get_recipe(recipe)
            .ok_or(CraftError::UnknownRecipe(recipe))?;
        if def.category != CraftingCategory::Hand {
            return Err(CraftError::NotHandCraftable(recipe));
        }
        if !tech.is_recipe_unlocked(registry, recipe) {
            return Err(CraftError::Locked(recipe));
        }
        if !store.remove_all(&def.ingredients) {
            return Err(CraftError::MissingIngredients(recipe));
        }
        self.jobs.push_back(CraftJob {
            recipe,
            remaining: def.duration,
        });
        Ok(())
    }

    /// Cancel the job at `index`, refunding its ingredients.
    pub fn cancel(
        &mut self,
        index: usize,
        registry: &Registry,
        store: &mut impl ItemStore,
    ) -> Result<RecipeId, CraftError> {
        let job = self.jobs.remove(index).ok_or(CraftError::NoSuchJob(index))?;
        if let Some(def) = registry.get_recipe(job.recipe) {
            store.add_all(&def.ingredients);
        }
        Ok(job.recipe)
    }

    /// Advance the front job by one tick.
    pub fn tick(
        &mut self,
        tick: Ticks,
        registry: &Registry,
        store: &mut impl ItemStore,
        events: &mut EventQueue,
    ) {
        let Some(front) = self.jobs.front_mut() else {
            return;
        };
        front.remaining = front.remaining.saturating_sub(1);
        if front.remaining > 0 {
            return;
        }
        let Some(job) = self.jobs.pop_front() else {
            return;
        };
        if let Some(def) = registry.get_recipe(job.recipe) {
            store.add_all(&def.results);
        }
        events.push(Event::CraftCompleted {
            recipe: job.recipe,
            tick,
        });
    }

    /// Restore a saved job without paying for it again.
    pub fn restore_job(&mut self, job: CraftJob) {
        self.jobs.push_back(job);
    }

    pub fn jobs(&self) -> impl Iterator<Item = &CraftJob> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::PlayerInventory;
    use colony_core::test_utils::*;

    fn setup() -> (TestContent, TechTree, PlayerInventory, EventQueue) {
        let c = test_content();
        let tech = TechTree::from_registry(&c.registry);
        (c, tech, PlayerInventory::new(), EventQueue::default())
    }

    #[test]
    fn gear_takes_30_ticks() {
        let (c, tech, mut inv, mut events) = setup();
        inv.add(c.iron_plate, 4);
        let mut q = CraftingQueue::new();
        q.queue(c.craft_gear, &c.registry, &tech, &mut inv).unwrap();
        assert_eq!(inv.quantity(c.iron_plate), 2, "paid on queue");

        for t in 0..29 {
            q.tick(t, &c.registry, &mut inv, &mut events);
        }
        assert_eq!(inv.quantity(c.gear), 0);
        q.tick(29, &c.registry, &mut inv, &mut events);
        assert_eq!(inv.quantity(c.gear), 1);
        assert!(q.is_empty());
        assert_eq!(
            events.drain(),
            vec![Event::CraftCompleted {
                recipe: c.craft_gear,
                tick: 29
            }]
        );
    }

    #[test]
    fn jobs_complete_in_order() {
        let (c, tech, mut inv, mut events) = setup();
        inv.add(c.iron_plate, 4);
        let mut q = CraftingQueue::new();
        q.queue(c.craft_gear, &c.registry, &tech, &mut inv).unwrap();
        q.queue(c.craft_gear, &c.registry, &tech, &mut inv).unwrap();
        for t in 0..30 {
            q.tick(t, &c.registry, &mut inv, &mut events);
        }
        assert_eq!(inv.quantity(c.gear), 1);
        assert_eq!(q.len(), 1);
        for t in 30..60 {
            q.tick(t, &c.registry, &mut inv, &mut events);
        }
        assert_eq!(inv.quantity(c.gear), 2);
    }

    #[test]
    fn queue_rejections_leave_inventory_untouched() {
        let (c, tech, mut inv, _) = setup();
        inv.add(c.iron_plate, 1);
        let mut q = CraftingQueue::new();
        assert_eq!(
            q.queue(c.craft_gear, &c.registry, &tech, &mut inv),
            Err(CraftError::MissingIngredients(c.craft_gear))
        );
        assert_eq!(
            q.queue(c.smelt_iron, &c.registry, &tech, &mut inv),
            Err(CraftError::NotHandCraftable(c.smelt_iron))
        );
        assert_eq!(
            q.queue(RecipeId(99), &c.registry, &tech, &mut inv),
            Err(CraftError::UnknownRecipe(RecipeId(99)))
        );
        assert_eq!(inv.quantity(c.iron_plate), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_refunds() {
        let (c, tech, mut inv, _) = setup();
        inv.add(c.iron_plate, 2);
        let mut q = CraftingQueue::new();
        q.queue(c.craft_gear, &c.registry, &tech, &mut inv).unwrap();
        assert_eq!(q.cancel(0, &c.registry, &mut inv), Ok(c.craft_gear));
        assert_eq!(inv.quantity(c.iron_plate), 2);
        assert_eq!(q.cancel(0, &c.registry, &mut inv), Err(CraftError::NoSuchJob(0)));
    }
}
