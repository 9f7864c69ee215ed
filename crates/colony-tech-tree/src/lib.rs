//! Research runtime for the colony simulation.
//!
//! Technology definitions live in the immutable [`Registry`]; this crate
//! tracks which of them are in progress or completed and answers the
//! "is this recipe / building unlocked" questions the rest of the
//! simulation asks before letting the player use content.
//!
//! Research is paid in science packs: [`TechTree::contribute_items`]
//! consumes up to the outstanding requirement and completes the technology
//! once every pack count is met.

use colony_core::fixed::Ticks;
use colony_core::id::{BuildingTypeId, ItemTypeId, RecipeId, TechId};
use colony_core::registry::{Registry, Unlock};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Research state (runtime)
// ---------------------------------------------------------------------------

/// The current state of research for a single technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResearchState {
    NotStarted,

    /// Packs contributed so far, one entry per cost entry, in cost order.
    InProgress(Vec<(ItemTypeId, u32)>),

    Completed,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TechEvent {
    ResearchStarted { tech_id: TechId, tick: Ticks },

    ResearchCompleted {
        tech_id: TechId,
        unlocks: Vec<Unlock>,
        tick: Ticks,
    },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TechTreeError {
    #[error("technology not found: {0:?}")]
    TechNotFound(TechId),

    #[error("prerequisite not met: {0:?} requires {1:?}")]
    PrerequisiteNotMet(TechId, TechId),

    #[error("technology {0:?} is already being researched")]
    AlreadyInProgress(TechId),

    #[error("technology {0:?} is already completed")]
    AlreadyCompleted(TechId),

    #[error("technology {0:?} is not being researched")]
    NotInProgress(TechId),
}

// ---------------------------------------------------------------------------
// TechTree
// ---------------------------------------------------------------------------

/// Per-technology definition data copied out of the registry.
#[derive(Debug, Clone)]
struct TechEntry {
    prerequisites: Vec<TechId>,
    cost: Vec<(ItemTypeId, u32)>,
    unlocks: Vec<Unlock>,
}

/// Research progress for every technology in a registry.
#[derive(Debug, Clone)]
pub struct TechTree {
    entries: Vec<TechEntry>,
    states: Vec<ResearchState>,
    /// Events emitted since last drain. Transient.
    events: Vec<TechEvent>,
}

impl TechTree {
    /// One `NotStarted` entry per technology in the registry.
    pub fn from_registry(registry: &Registry) -> Self {
        let entries: Vec<TechEntry> = registry
            .technologies()
            .map(|(_, def)| TechEntry {
                prerequisites: def.prerequisites.clone(),
                cost: def.cost.iter().map(|e| (e.item, e.quantity)).collect(),
                unlocks: def.unlocks.clone(),
            })
            .collect();
        let states = vec![ResearchState::NotStarted; entries.len()];
        Self {
            entries,
            states,
            events: Vec::new(),
        }
    }

    fn entry(&self, id: TechId) -> Result<&TechEntry, TechTreeError> {
        self.entries
            .get(id.0 as usize)
            .ok_or(TechTreeError::TechNotFound(id))
    }

    // -- Query API --

    pub fn get_state(&self, id: TechId) -> Option<&ResearchState> {
        self.states.get(id.0 as usize)
    }

    pub fn technology_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_completed(&self, id: TechId) -> bool {
        matches!(self.get_state(id), Some(ResearchState::Completed))
    }

    pub fn is_in_progress(&self, id: TechId) -> bool {
        matches!(self.get_state(id), Some(ResearchState::InProgress(_)))
    }

    /// Check whether all prerequisites for a technology are completed.
    pub fn prerequisites_met(&self, id: TechId) -> Result<bool, TechTreeError> {
        Ok(self
            .entry(id)?
            .prerequisites
            .iter()
            .all(|&p| self.is_completed(p)))
    }

    /// `None` gates are always open.
    pub fn is_gate_open(&self, gate: Option<TechId>) -> bool {
        gate.is_none_or(|tech| self.is_completed(tech))
    }

    pub fn is_recipe_unlocked(&self, registry: &Registry, recipe: RecipeId) -> bool {
        registry
            .get_recipe(recipe)
            .is_some_and(|def| self.is_gate_open(def.unlocked_by))
    }

    pub fn is_building_unlocked(&self, registry: &Registry, building: BuildingTypeId) -> bool {
        registry
            .get_building(building)
            .is_some_and(|def| self.is_gate_open(def.unlocked_by))
    }

    /// Completed technologies in id order.
    pub fn completed(&self) -> impl Iterator<Item = TechId> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, ResearchState::Completed))
            .map(|(i, _)| TechId(i as u32))
    }

    /// In-progress technologies with their contributed packs, in id order.
    pub fn in_progress(&self) -> impl Iterator<Item = (TechId, &[(ItemTypeId, u32)])> + '_ {
        self.states.iter().enumerate().filter_map(|(i, s)| match s {
            ResearchState::InProgress(p) => Some((TechId(i as u32), p.as_slice())),
            _ => None,
        })
    }

    /// Packs still needed to finish an in-progress technology.
    pub fn remaining(&self, id: TechId) -> Result<Vec<(ItemTypeId, u32)>, TechTreeError> {
        let entry = self.entry(id)?;
        match &self.states[id.0 as usize] {
            ResearchState::InProgress(progress) => Ok(entry
                .cost
                .iter()
                .zip(progress)
                .map(|(&(item, need), &(_, have))| (item, need.saturating_sub(have)))
                .filter(|&(_, n)| n > 0)
                .collect()),
            _ => Err(TechTreeError::NotInProgress(id)),
        }
    }

    // -- Research actions --

    /// Start researching a technology. Emits `ResearchStarted` on success.
    pub fn start_research(&mut self, id: TechId, tick: Ticks) -> Result<(), TechTreeError> {
        let entry = self.entry(id)?;
        if let Some(&missing) = entry.prerequisites.iter().find(|&&p| !self.is_completed(p)) {
            return Err(TechTreeError::PrerequisiteNotMet(id, missing));
        }
        match self.states[id.0 as usize] {
            ResearchState::InProgress(_) => return Err(TechTreeError::AlreadyInProgress(id)),
            ResearchState::Completed => return Err(TechTreeError::AlreadyCompleted(id)),
            ResearchState::NotStarted => {}
        }

        let progress = entry.cost.iter().map(|&(item, _)| (item, 0)).collect();
        self.states[id.0 as usize] = ResearchState::InProgress(progress);
        self.events
            .push(TechEvent::ResearchStarted { tech_id: id, tick });
        tracing::debug!(tech = id.0, tick, "research started");

        // Free research completes immediately.
        if self.entries[id.0 as usize].cost.is_empty() {
            self.finish(id, tick);
        }
        Ok(())
    }

    /// Contribute science packs. Returns the amount of each item actually
    /// consumed (may be less than offered if research needs fewer).
    /// Completes research once every requirement is met.
    pub fn contribute_items(
        &mut self,
        id: TechId,
        contributions: &[(ItemTypeId, u32)],
        tick: Ticks,
    ) -> Result<Vec<(ItemTypeId, u32)>, TechTreeError> {
        let index = id.0 as usize;
        let cost = self.entry(id)?.cost.clone();
        let ResearchState::InProgress(progress) = &mut self.states[index] else {
            return Err(TechTreeError::NotInProgress(id));
        };

        let mut consumed = Vec::new();
        for &(item, amount) in contributions {
            let Some(slot) = progress.iter().position(|&(i, _)| i == item) else {
                continue;
            };
            let remaining = cost[slot].1.saturating_sub(progress[slot].1);
            let take = amount.min(remaining);
            if take > 0 {
                progress[slot].1 += take;
                consumed.push((item, take));
            }
        }

        let done = progress
            .iter()
            .zip(&cost)
            .all(|(&(_, have), &(_, need))| have >= need);
        if done {
            self.finish(id, tick);
        }
        Ok(consumed)
    }

    /// Complete a technology directly, regardless of cost and prerequisites.
    /// Used when restoring saved progress and by scripted unlocks.
    pub fn complete(&mut self, id: TechId, tick: Ticks) -> Result<(), TechTreeError> {
        self.entry(id)?;
        if self.is_completed(id) {
            return Err(TechTreeError::AlreadyCompleted(id));
        }
        self.finish(id, tick);
        Ok(())
    }

    /// Overwrite in-progress pack counts (used when restoring saved state).
    /// Counts for items the technology does not require are ignored; counts
    /// are clamped to the requirement.
    pub fn restore_progress(
        &mut self,
        id: TechId,
        contributed: &[(ItemTypeId, u32)],
    ) -> Result<(), TechTreeError> {
        let entry = self.entry(id)?;
        let progress = entry
            .cost
            .iter()
            .map(|&(item, need)| {
                let have = contributed
                    .iter()
                    .filter(|&&(i, _)| i == item)
                    .map(|&(_, n)| n)
                    .sum::<u32>();
                (item, have.min(need))
            })
            .collect();
        self.states[id.0 as usize] = ResearchState::InProgress(progress);
        Ok(())
    }

    // -- Event API --

    /// Drain all pending events.
    pub fn drain_events(&mut self) -> Vec<TechEvent> {
        std::mem::take(&mut self.events)
    }

    fn finish(&mut self, id: TechId, tick: Ticks) {
        let index = id.0 as usize;
        self.states[index] = ResearchState::Completed;
        self.events.push(TechEvent::ResearchCompleted {
            tech_id: id,
            unlocks: self.entries[index].unlocks.clone(),
            tick,
        });
        tracing::info!(tech = id.0, tick, "research completed");
    }
}

// ===========================================================================
// Tests
// ===========================================================================
