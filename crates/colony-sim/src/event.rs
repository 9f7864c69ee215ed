//! Simulation events for external observers.
//!
//! Commands report success or failure through their return values; the
//! event queue exists for observers (UI, audio, analytics) that want to
//! know what happened during a tick. The caller drains it once per tick.
//!
//! The queue has a fixed capacity. When full, the oldest events are
//! dropped and counted. Event kinds can be suppressed, in which case they
//! are never recorded.

use std::collections::VecDeque;

use colony_core::fixed::{Fixed64, Ticks};
use colony_core::id::{BuildingId, BuildingTypeId, ItemTypeId, RecipeId, TechId};
use colony_spatial::TilePosition;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BuildingPlaced {
        building: BuildingId,
        building_type: BuildingTypeId,
        origin: TilePosition,
        tick: Ticks,
    },
    BuildingRemoved {
        building: BuildingId,
        building_type: BuildingTypeId,
        origin: TilePosition,
        tick: Ticks,
    },
    /// Items held by a removed building that were thrown away.
    ItemsDiscarded {
        origin: TilePosition,
        items: Vec<(ItemTypeId, u32)>,
        tick: Ticks,
    },
    RecipeStarted {
        building: BuildingId,
        recipe: RecipeId,
        tick: Ticks,
    },
    RecipeCompleted {
        building: BuildingId,
        recipe: RecipeId,
        tick: Ticks,
    },
    BrownoutStarted {
        deficit: Fixed64,
        tick: Ticks,
    },
    BrownoutEnded {
        tick: Ticks,
    },
    CraftCompleted {
        recipe: RecipeId,
        tick: Ticks,
    },
    ResearchCompleted {
        tech: TechId,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BuildingPlaced,
    BuildingRemoved,
    ItemsDiscarded,
    RecipeStarted,
    RecipeCompleted,
    BrownoutStarted,
    BrownoutEnded,
    CraftCompleted,
    ResearchCompleted,
}

const EVENT_KIND_COUNT: usize = 9;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::BuildingPlaced { .. } => EventKind::BuildingPlaced,
            Event::BuildingRemoved { .. } => EventKind::BuildingRemoved,
            Event::ItemsDiscarded { .. } => EventKind::ItemsDiscarded,
            Event::RecipeStarted { .. } => EventKind::RecipeStarted,
            Event::RecipeCompleted { .. } => EventKind::RecipeCompleted,
            Event::BrownoutStarted { .. } => EventKind::BrownoutStarted,
            Event::BrownoutEnded { .. } => EventKind::BrownoutEnded,
            Event::CraftCompleted { .. } => EventKind::CraftCompleted,
            Event::ResearchCompleted { .. } => EventKind::ResearchCompleted,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventQueue
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<Event>,
    capacity: usize,
    suppressed: [bool; EVENT_KIND_COUNT],
    /// Events dropped because the queue was full.
    dropped: u64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventQueue {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            suppressed: [false; EVENT_KIND_COUNT],
            dropped: 0,
        }
    }

    /// Record an event unless its kind is suppressed.
    pub fn push(&mut self, event: Event) {
        if self.suppressed[event.kind().index()] {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.events.retain(|e| e.kind() != kind);
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Remove and return every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
