//! The fixed-rate simulation clock.
//!
//! Real elapsed time is fed in through [`SimulationClock::schedule`], which
//! says how many 1/60 s steps to run now. Time is accumulated exactly (as
//! nanoseconds scaled by the tick rate), so feeding 1/60 s sixty times
//! yields exactly sixty steps with nothing left over.
//!
//! A single call never runs more than `max_steps_per_advance` steps. Steps
//! due beyond the cap are dropped, not carried over, so a long stall does
//! not turn into a burst of catch-up ticks.

use std::time::Duration;

use colony_core::fixed::Ticks;
use colony_core::sim::{AdvanceResult, SimState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationClock {
    state: SimState,
    max_steps_per_advance: u32,
}

impl SimulationClock {
    pub fn new(max_steps_per_advance: u32) -> Self {
        Self::from_state(SimState::new(), max_steps_per_advance)
    }

    pub fn from_state(state: SimState, max_steps_per_advance: u32) -> Self {
        Self {
            state,
            max_steps_per_advance: max_steps_per_advance.max(1),
        }
    }

    pub fn tick(&self) -> Ticks {
        self.state.tick
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn pause(&mut self) {
        self.state.paused = true;
    }

    pub fn resume(&mut self) {
        self.state.paused = false;
    }

    /// Account for `dt` of real time. Returns how many steps the caller
    /// should run now and how many were dropped by the cap.
    pub fn schedule(&mut self, dt: Duration) -> AdvanceResult {
        if self.state.paused {
            return AdvanceResult::default();
        }
        let nanos = u64::try_from(dt.as_nanos()).unwrap_or(u64::MAX);
        let due = self.state.accumulate(nanos);
        let run = due.min(u64::from(self.max_steps_per_advance));
        let dropped = due - run;
        if dropped > 0 {
            tracing::warn!(
                tick = self.state.tick,
                due,
                dropped,
                "simulation falling behind, dropping steps"
            );
        }
        AdvanceResult {
            steps_run: run,
            steps_dropped: dropped,
        }
    }

    /// Count one completed step.
    pub(crate) fn finish_step(&mut self) {
        self.state.tick += 1;
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(5)
    }
}
