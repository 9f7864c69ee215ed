//! Simulation clock state and determinism hashing.
//!
//! The clock itself lives in `colony-sim`; this module holds the plain data
//! it keeps between calls so snapshots and tools can share it.

use crate::fixed::{Fixed64, TICKS_PER_SECOND, Ticks};

/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable clock state.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Current tick counter. Incremented by 1 for each simulation step.
    pub tick: Ticks,

    /// Real time not yet turned into ticks, in nanoseconds scaled by
    /// [`TICKS_PER_SECOND`]. One tick is due for every
    /// [`NANOS_PER_SECOND`] accumulated.
    pub accumulator: u64,

    /// While paused, neither `advance` nor `step` moves the clock.
    pub paused: bool,
}

impl SimState {
    /// Create a new simulation state starting at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed elapsed real time into the accumulator. Returns how many whole
    /// ticks are now due; the accumulator keeps only the remainder.
    pub fn accumulate(&mut self, elapsed_nanos: u64) -> u64 {
        let scaled = elapsed_nanos.saturating_mul(TICKS_PER_SECOND as u64);
        let total = self.accumulator.saturating_add(scaled);
        self.accumulator = total % NANOS_PER_SECOND;
        total / NANOS_PER_SECOND
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of one clock `advance()` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Number of simulation steps actually executed.
    pub steps_run: u64,

    /// Steps that were due but discarded by the per-call cap.
    pub steps_dropped: u64,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_state_starts_at_zero() {
        let state = SimState::new();
        assert_eq!(state.tick, 0);
        assert_eq!(state.accumulator, 0);
        assert!(!state.paused);
    }

    #[test]
    fn accumulate_one_second_is_sixty_ticks() {
        let mut state = SimState::new();
        assert_eq!(state.accumulate(NANOS_PER_SECOND), 60);
        assert_eq!(state.accumulator, 0);
    }

    #[test]
    fn accumulate_carries_remainder() {
        let mut state = SimState::new();
        // 10 ms = 0.6 ticks
        assert_eq!(state.accumulate(10_000_000), 0);
        assert_eq!(state.accumulate(10_000_000), 1);
        assert_eq!(state.accumulator, 200_000_000);
    }

    #[test]
    fn accumulate_exact_frame_time() {
        let mut state = SimState::new();
        // 1/60 s is not a whole number of nanoseconds; three 16_666_667 ns
        // frames overshoot by 60 scaled units, never losing a tick.
        let mut ticks = 0;
        for _ in 0..3 {
            ticks += state.accumulate(16_666_667);
        }
        assert_eq!(ticks, 3);
        assert_eq!(state.accumulator, 60);
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_u32(7);

        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_u32(7);

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_differs_for_different_inputs() {
        let mut h1 = StateHash::new();
        h1.write_u64(1);

        let mut h2 = StateHash::new();
        h2.write_u64(2);

        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);

        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);

        assert_ne!(h1.finish(), h2.finish());
    }
}
