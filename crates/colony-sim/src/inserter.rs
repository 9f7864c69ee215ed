//! Inserters: swing arms that move one item at a time from the building
//! behind them to the building in front.
//!
//! The arm position is tracked in swing ticks, from 0 (over the source) to
//! `swing_ticks` (over the destination). At full power it moves one tick's
//! worth per tick, so a 30-tick inserter takes exactly 15 ticks to reach
//! the pickup from the rest position and 30 to carry an item across.

use colony_core::fixed::Fixed64;
use colony_core::id::{BuildingId, ItemTypeId};
use colony_spatial::{Direction, GridIndex};
use serde::{Deserialize, Serialize};

use crate::building::{BuildingArena, StepContext};
use crate::transfer::TransferProtocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InserterState {
    #[default]
    Idle,
    SwingingToPickup,
    SwingingToDrop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inserter {
    state: InserterState,
    /// Arm position in swing ticks, `0..=swing_ticks`.
    position: Fixed64,
    held: Option<ItemTypeId>,
    filter: Option<ItemTypeId>,
    swing_ticks: u32,
    reach: u8,
    source: Option<BuildingId>,
    dest: Option<BuildingId>,
}

impl Inserter {
    pub fn new(swing_ticks: u32, reach: u8) -> Self {
        Self {
            state: InserterState::Idle,
            position: Fixed64::ZERO,
            held: None,
            filter: None,
            swing_ticks: swing_ticks.max(1),
            reach: reach.max(1),
            source: None,
            dest: None,
        }
    }

    pub fn state(&self) -> InserterState {
        self.state
    }

    /// Arm extension as a fraction: 0 over the source, 1 over the
    /// destination.
    pub fn arm(&self) -> Fixed64 {
        self.position / Fixed64::from_num(self.swing_ticks)
    }

    pub fn held(&self) -> Option<ItemTypeId> {
        self.held
    }

    pub fn filter(&self) -> Option<ItemTypeId> {
        self.filter
    }

    pub fn set_filter(&mut self, filter: Option<ItemTypeId>) {
        self.filter = filter;
    }

    pub fn reach(&self) -> u8 {
        self.reach
    }

    pub fn swing_ticks(&self) -> u32 {
        self.swing_ticks
    }

    pub fn source(&self) -> Option<BuildingId> {
        self.source
    }

    pub fn dest(&self) -> Option<BuildingId> {
        self.dest
    }

    /// Arm position in swing ticks.
    pub fn position(&self) -> Fixed64 {
        self.position
    }

    /// Put back saved arm state. `position` is in swing ticks and is
    /// clamped to the swing range.
    pub fn restore(
        &mut self,
        state: InserterState,
        position: Fixed64,
        held: Option<ItemTypeId>,
        filter: Option<ItemTypeId>,
    ) {
        // A drop swing without an item has nothing to deliver.
        self.state = match (state, held) {
            (InserterState::SwingingToDrop, None) => InserterState::Idle,
            (s, _) => s,
        };
        self.position = position.clamp(Fixed64::ZERO, self.full_swing());
        self.held = held;
        self.filter = filter;
    }

    pub(crate) fn take_held(&mut self) -> Option<ItemTypeId> {
        self.state = InserterState::Idle;
        self.held.take()
    }

    pub(crate) fn forget(&mut self, removed: BuildingId) {
        if self.source == Some(removed) {
            self.source = None;
        }
        if self.dest == Some(removed) {
            self.dest = None;
        }
    }

    fn passes_filter(&self, item: ItemTypeId) -> bool {
        self.filter.is_none_or(|f| f == item)
    }

    fn full_swing(&self) -> Fixed64 {
        Fixed64::from_num(self.swing_ticks)
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    pub(crate) fn step(
        &mut self,
        facing: Direction,
        satisfaction: Fixed64,
        ctx: &mut StepContext<'_>,
    ) {
        if satisfaction <= Fixed64::ZERO {
            return;
        }
        match self.state {
            InserterState::Idle => self.start_swing(facing, ctx),
            InserterState::SwingingToPickup => {
                self.position = (self.position - satisfaction).max(Fixed64::ZERO);
                if self.position == Fixed64::ZERO {
                    self.pick_up(facing, ctx);
                }
            }
            InserterState::SwingingToDrop => {
                if self.dest.and_then(|d| ctx.arena.get(d)).is_none() {
                    self.state = InserterState::Idle;
                    self.position = Fixed64::ZERO;
                    return;
                }
                self.position = (self.position + satisfaction).min(self.full_swing());
                if self.position >= self.full_swing() {
                    self.drop(facing, ctx);
                }
            }
        }
    }

    fn start_swing(&mut self, facing: Direction, ctx: &mut StepContext<'_>) {
        let Some(dest) = self.dest.and_then(|d| ctx.arena.state(d)) else {
            return;
        };
        if self.held.is_some() {
            self.state = InserterState::SwingingToDrop;
            self.position = Fixed64::ZERO;
            return;
        }
        let Some(item) = self
            .source
            .and_then(|s| ctx.arena.state(s))
            .and_then(|source| source.has_output(facing))
        else {
            return;
        };
        if self.passes_filter(item) && dest.can_accept(item, facing.opposite(), ctx.registry) {
            self.state = InserterState::SwingingToPickup;
            self.position = self.full_swing() / 2;
        }
    }

    fn pick_up(&mut self, facing: Direction, ctx: &mut StepContext<'_>) {
        let filter = self.filter;
        let picked = self.source.and_then(|s| ctx.arena.state_mut(s)).and_then(|source| {
            match source.has_output(facing) {
                Some(item) if filter.is_none_or(|f| f == item) => source.extract(facing),
                _ => None,
            }
        });
        match picked {
            Some(item) => {
                self.held = Some(item);
                self.state = InserterState::SwingingToDrop;
            }
            None => self.state = InserterState::Idle,
        }
    }

    /// Deliver the held item. A refused insert keeps the arm extended and
    /// is retried next tick.
    fn drop(&mut self, facing: Direction, ctx: &mut StepContext<'_>) {
        let Some(item) = self.held else {
            self.state = InserterState::Idle;
            return;
        };
        let Some(dest) = self.dest.and_then(|d| ctx.arena.state_mut(d)) else {
            self.state = InserterState::Idle;
            self.position = Fixed64::ZERO;
            return;
        };
        if dest.insert(item, 1, facing.opposite(), ctx.registry) {
            self.held = None;
            self.state = InserterState::Idle;
        }
    }
}

/// Re-resolve source and destination from the grid.
pub(crate) fn relink(arena: &mut BuildingArena, grid: &GridIndex, id: BuildingId) {
    let Some(inst) = arena.get(id) else {
        return;
    };
    let Some(inserter) = inst.state.as_inserter() else {
        return;
    };
    let reach = i32::from(inserter.reach);
    let source = grid
        .building_at(inst.origin.step(inst.facing.opposite(), reach))
        .filter(|&b| b != id);
    let dest = grid
        .building_at(inst.origin.step(inst.facing, reach))
        .filter(|&b| b != id);
    if let Some(inserter) = arena.state_mut(id).and_then(|s| s.as_inserter_mut()) {
        inserter.source = source;
        inserter.dest = dest;
    }
}
