//! Power network for the colony simulation.
//!
//! One network spans the whole colony. Each tick it sums production and
//! consumption (both in kW), balances the difference against storage (kJ),
//! and publishes a satisfaction ratio in `[0, 1]` that powered buildings
//! scale their work rate by.
//!
//! # Design
//!
//! - Entries are keyed by [`BuildingId`] and kept in ordered maps, so the
//!   charge/discharge order across accumulators is reproducible.
//! - Entries whose building no longer exists are pruned during the tick
//!   via a liveness predicate supplied by the caller.
//! - Events fire only on *transitions*, not every tick.

use std::collections::BTreeMap;

use colony_core::fixed::{Fixed64, TICKS_PER_SECOND, Ticks};
use colony_core::id::BuildingId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// An accumulator's charge state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerStorage {
    /// Maximum charge in kJ.
    pub capacity: Fixed64,
    /// Current charge in kJ. Clamped to [0, capacity].
    pub charge: Fixed64,
}

impl PowerStorage {
    pub fn empty(capacity: Fixed64) -> Self {
        Self {
            capacity,
            charge: Fixed64::ZERO,
        }
    }

    fn headroom(&self) -> Fixed64 {
        self.capacity - self.charge
    }
}

// ---------------------------------------------------------------------------
// Power events
// ---------------------------------------------------------------------------

/// Events emitted on satisfaction transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerEvent {
    /// Satisfaction dropped below 1.0.
    BrownoutStarted {
        /// Unmet demand in kW after storage discharge.
        deficit: Fixed64,
        tick: Ticks,
    },
    /// Satisfaction returned to 1.0.
    BrownoutEnded { tick: Ticks },
}

// ---------------------------------------------------------------------------
// Power network
// ---------------------------------------------------------------------------

/// Aggregates producers, consumers and storage into one satisfaction ratio.
///
/// - 1.0: all consumers fully powered
/// - 0.0: no power available
/// - Between: partial power (buildings operate at reduced rate)
#[derive(Debug, Clone)]
pub struct PowerNetwork {
    producers: BTreeMap<BuildingId, Fixed64>,
    consumers: BTreeMap<BuildingId, Fixed64>,
    storage: BTreeMap<BuildingId, PowerStorage>,
    satisfaction: Fixed64,
    brownout: bool,
    last_production: Fixed64,
    last_consumption: Fixed64,
}

impl Default for PowerNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerNetwork {
    pub fn new() -> Self {
        Self {
            producers: BTreeMap::new(),
            consumers: BTreeMap::new(),
            storage: BTreeMap::new(),
            satisfaction: Fixed64::ONE,
            brownout: false,
            last_production: Fixed64::ZERO,
            last_consumption: Fixed64::ZERO,
        }
    }

    // -- Registration --

    /// Register or update a producer's output in kW.
    pub fn set_producer(&mut self, building: BuildingId, kw: Fixed64) {
        self.producers.insert(building, kw);
    }

    /// Register or update a consumer's draw in kW.
    pub fn set_consumer(&mut self, building: BuildingId, kw: Fixed64) {
        self.consumers.insert(building, kw);
    }

    /// Register an accumulator. Re-registering keeps the current charge,
    /// clamped to the new capacity.
    pub fn set_storage(&mut self, building: BuildingId, capacity_kj: Fixed64) {
        let entry = self
            .storage
            .entry(building)
            .or_insert_with(|| PowerStorage::empty(capacity_kj));
        entry.capacity = capacity_kj;
        entry.charge = entry.charge.min(capacity_kj);
    }

    /// Set an accumulator's charge directly (used when restoring state).
    /// Returns false when `building` is not registered as storage.
    pub fn set_charge(&mut self, building: BuildingId, charge_kj: Fixed64) -> bool {
        match self.storage.get_mut(&building) {
            Some(s) => {
                s.charge = charge_kj.clamp(Fixed64::ZERO, s.capacity);
                true
            }
            None => false,
        }
    }

    /// Drop a building from every role.
    pub fn remove(&mut self, building: BuildingId) {
        self.producers.remove(&building);
        self.consumers.remove(&building);
        self.storage.remove(&building);
    }

    // -- Queries --

    /// Current satisfaction ratio.
    pub fn satisfaction(&self) -> Fixed64 {
        self.satisfaction
    }

    /// The ratio a building with the given draw experiences. Buildings that
    /// need no power always see 1.0.
    pub fn satisfaction_for(&self, draw_kw: Fixed64) -> Fixed64 {
        if draw_kw == Fixed64::ZERO {
            Fixed64::ONE
        } else {
            self.satisfaction
        }
    }

    /// `base * satisfaction`.
    pub fn effective_power(&self, base: Fixed64) -> Fixed64 {
        base * self.satisfaction
    }

    pub fn is_brownout(&self) -> bool {
        self.brownout
    }

    pub fn storage(&self, building: BuildingId) -> Option<&PowerStorage> {
        self.storage.get(&building)
    }

    /// Total charge across all accumulators, in kJ.
    pub fn stored_energy(&self) -> Fixed64 {
        self.storage
            .values()
            .fold(Fixed64::ZERO, |acc, s| acc + s.charge)
    }

    /// Production measured by the last tick, in kW.
    pub fn last_production(&self) -> Fixed64 {
        self.last_production
    }

    /// Consumption measured by the last tick, in kW.
    pub fn last_consumption(&self) -> Fixed64 {
        self.last_consumption
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn storage_count(&self) -> usize {
        self.storage.len()
    }

    // -- Tick --

    /// Recompute satisfaction for one tick.
    ///
    /// 1. Prune entries for which `is_alive` is false.
    /// 2. Sum production P and consumption C.
    /// 3. C == 0 or P >= C: satisfaction 1.0, surplus `(P - C) / 60` kJ
    ///    charges storage up to capacity.
    /// 4. P < C: storage discharges up to the per-tick deficit. Fully
    ///    covered gives 1.0, otherwise `(P + discharged rate) / C`.
    /// 5. Emit brownout events on state transitions.
    pub fn tick<F>(&mut self, current_tick: Ticks, is_alive: F) -> Vec<PowerEvent>
    where
        F: Fn(BuildingId) -> bool,
    {
        self.producers.retain(|&id, _| is_alive(id));
        self.consumers.retain(|&id, _| is_alive(id));
        self.storage.retain(|&id, _| is_alive(id));

        let zero = Fixed64::ZERO;
        let one = Fixed64::ONE;
        let ticks = Fixed64::from_num(TICKS_PER_SECOND);

        let production = self.producers.values().fold(zero, |acc, &kw| acc + kw);
        let consumption = self.consumers.values().fold(zero, |acc, &kw| acc + kw);
        self.last_production = production;
        self.last_consumption = consumption;

        let mut deficit_kw = zero;
        let satisfaction = if production >= consumption {
            self.charge((production - consumption) / ticks);
            one
        } else {
            let needed_kj = (consumption - production) / ticks;
            let discharged_kj = self.discharge(needed_kj);
            if discharged_kj >= needed_kj {
                one
            } else {
                let supplied_kw = production + discharged_kj * ticks;
                deficit_kw = (consumption - supplied_kw).max(zero);
                (supplied_kw / consumption).clamp(zero, one)
            }
        };
        self.satisfaction = satisfaction;

        let mut events = Vec::new();
        let is_brownout = satisfaction < one;
        if is_brownout && !self.brownout {
            tracing::debug!(
                tick = current_tick,
                production = %production,
                consumption = %consumption,
                "brownout started"
            );
            events.push(PowerEvent::BrownoutStarted {
                deficit: deficit_kw,
                tick: current_tick,
            });
        } else if !is_brownout && self.brownout {
            tracing::debug!(tick = current_tick, "brownout ended");
            events.push(PowerEvent::BrownoutEnded { tick: current_tick });
        }
        self.brownout = is_brownout;

        events
    }

    /// Push `kj` into storage in id order. Returns the amount absorbed.
    fn charge(&mut self, mut kj: Fixed64) -> Fixed64 {
        let mut absorbed = Fixed64::ZERO;
        for s in self.storage.values_mut() {
            if kj <= Fixed64::ZERO {
                break;
            }
            let take = kj.min(s.headroom());
            s.charge += take;
            kj -= take;
            absorbed += take;
        }
        absorbed
    }

    /// Draw up to `kj` from storage in id order. Returns the amount drawn.
    fn discharge(&mut self, mut kj: Fixed64) -> Fixed64 {
        let mut drawn = Fixed64::ZERO;
        for s in self.storage.values_mut() {
            if kj <= Fixed64::ZERO {
                break;
            }
            let take = kj.min(s.charge);
            s.charge -= take;
            kj -= take;
            drawn += take;
        }
        drawn
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn fixed(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    fn make_building_ids(count: usize) -> Vec<BuildingId> {
        let mut sm = SlotMap::<BuildingId, ()>::with_key();
        (0..count).map(|_| sm.insert(())).collect()
    }

    fn all_alive(_: BuildingId) -> bool {
        true
    }

    // -----------------------------------------------------------------------
    // Test 1: Balanced network: satisfaction equals exactly 1.0
    // -----------------------------------------------------------------------
    #[test]
    fn balanced_network_satisfaction_is_one() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(2);
        net.set_producer(ids[0], fixed(100.0));
        net.set_consumer(ids[1], fixed(100.0));

        let events = net.tick(1, all_alive);

        assert_eq!(net.satisfaction(), Fixed64::ONE);
        assert!(events.is_empty(), "no events on balanced network");
    }

    // -----------------------------------------------------------------------
    // Test 2: 100 kW against 150 kW, no storage
    // -----------------------------------------------------------------------
    #[test]
    fn underpowered_network_reports_ratio() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(2);
        net.set_producer(ids[0], fixed(100.0));
        net.set_consumer(ids[1], fixed(150.0));

        let events = net.tick(1, all_alive);

        assert_eq!(net.satisfaction(), fixed(100.0) / fixed(150.0));
        assert_eq!(
            events,
            vec![PowerEvent::BrownoutStarted {
                deficit: fixed(50.0),
                tick: 1
            }]
        );

        // Raising production ends the brownout.
        net.set_producer(ids[0], fixed(150.0));
        let events = net.tick(2, all_alive);
        assert_eq!(net.satisfaction(), Fixed64::ONE);
        assert_eq!(events, vec![PowerEvent::BrownoutEnded { tick: 2 }]);
    }

    // -----------------------------------------------------------------------
    // Test 3: Empty network and zero demand
    // -----------------------------------------------------------------------
    #[test]
    fn zero_demand_satisfaction_is_one() {
        let mut net = PowerNetwork::new();
        assert!(net.tick(1, all_alive).is_empty());
        assert_eq!(net.satisfaction(), Fixed64::ONE);

        let ids = make_building_ids(1);
        net.set_producer(ids[0], fixed(100.0));
        assert!(net.tick(2, all_alive).is_empty());
        assert_eq!(net.satisfaction(), Fixed64::ONE);
    }

    // -----------------------------------------------------------------------
    // Test 4: Zero production with demand: full brownout
    // -----------------------------------------------------------------------
    #[test]
    fn zero_production_full_brownout() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(1);
        net.set_consumer(ids[0], fixed(100.0));

        let events = net.tick(1, all_alive);
        assert_eq!(net.satisfaction(), Fixed64::ZERO);
        assert!(net.is_brownout());
        assert!(matches!(events[0], PowerEvent::BrownoutStarted { .. }));
    }

    // -----------------------------------------------------------------------
    // Test 5: Brownout fires only on transition
    // -----------------------------------------------------------------------
    #[test]
    fn brownout_event_fires_only_on_transition() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(2);
        net.set_producer(ids[0], fixed(50.0));
        net.set_consumer(ids[1], fixed(100.0));

        assert_eq!(net.tick(1, all_alive).len(), 1);
        assert!(net.tick(2, all_alive).is_empty());
        assert!(net.tick(3, all_alive).is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 6: Storage charges with surplus, per tick
    // -----------------------------------------------------------------------
    #[test]
    fn storage_charges_with_surplus() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(3);
        net.set_producer(ids[0], fixed(160.0));
        net.set_consumer(ids[1], fixed(100.0));
        net.set_storage(ids[2], fixed(1000.0));

        // 60 kW surplus = 1 kJ per tick.
        net.tick(1, all_alive);
        assert_eq!(net.storage(ids[2]).unwrap().charge, fixed(1.0));
        net.tick(2, all_alive);
        assert_eq!(net.stored_energy(), fixed(2.0));
    }

    // -----------------------------------------------------------------------
    // Test 7: Storage never exceeds capacity
    // -----------------------------------------------------------------------
    #[test]
    fn storage_does_not_overcharge() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(2);
        net.set_producer(ids[0], fixed(600.0));
        net.set_storage(ids[1], fixed(25.0));

        // 10 kJ per tick, capacity 25.
        for t in 1..=5 {
            net.tick(t, all_alive);
        }
        assert_eq!(net.storage(ids[1]).unwrap().charge, fixed(25.0));
    }

    // -----------------------------------------------------------------------
    // Test 8: Storage fully covers deficit: exactly 1.0, no brownout
    // -----------------------------------------------------------------------
    #[test]
    fn storage_fully_covers_deficit_no_brownout() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(2);
        net.set_consumer(ids[0], fixed(120.0));
        net.set_storage(ids[1], fixed(1000.0));
        assert!(net.set_charge(ids[1], fixed(500.0)));

        let events = net.tick(1, all_alive);

        assert_eq!(net.satisfaction(), Fixed64::ONE);
        assert!(events.is_empty());
        // 120 kW for one tick = 2 kJ.
        assert_eq!(net.storage(ids[1]).unwrap().charge, fixed(498.0));
    }

    // -----------------------------------------------------------------------
    // Test 9: Storage partially covers deficit
    // -----------------------------------------------------------------------
    #[test]
    fn storage_partially_covers_deficit() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(3);
        net.set_producer(ids[0], fixed(60.0));
        net.set_consumer(ids[1], fixed(180.0));
        net.set_storage(ids[2], fixed(10.0));
        net.set_charge(ids[2], fixed(1.0));

        // Deficit is 2 kJ this tick; storage holds 1 kJ = 60 kW for a tick.
        let events = net.tick(1, all_alive);
        assert_eq!(net.satisfaction(), fixed(120.0) / fixed(180.0));
        assert_eq!(net.stored_energy(), Fixed64::ZERO);
        assert_eq!(events.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 10: Stale entries are pruned by the liveness predicate
    // -----------------------------------------------------------------------
    #[test]
    fn dead_buildings_are_pruned() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(3);
        net.set_producer(ids[0], fixed(100.0));
        net.set_consumer(ids[1], fixed(500.0));
        net.set_storage(ids[2], fixed(10.0));

        let dead = ids[1];
        net.tick(1, |id| id != dead);

        assert_eq!(net.consumer_count(), 0);
        assert_eq!(net.producer_count(), 1);
        assert_eq!(net.satisfaction(), Fixed64::ONE);
        assert_eq!(net.last_consumption(), Fixed64::ZERO);
    }

    // -----------------------------------------------------------------------
    // Test 11: Zero-draw buildings always see 1.0
    // -----------------------------------------------------------------------
    #[test]
    fn zero_draw_ignores_brownout() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(2);
        net.set_producer(ids[0], fixed(50.0));
        net.set_consumer(ids[1], fixed(100.0));
        net.tick(1, all_alive);

        assert_eq!(net.satisfaction_for(Fixed64::ZERO), Fixed64::ONE);
        assert_eq!(net.satisfaction_for(fixed(100.0)), fixed(0.5));
        assert_eq!(net.effective_power(fixed(100.0)), fixed(50.0));
    }

    // -----------------------------------------------------------------------
    // Test 12: Remove clears every role
    // -----------------------------------------------------------------------
    #[test]
    fn remove_clears_every_role() {
        let mut net = PowerNetwork::new();
        let ids = make_building_ids(1);
        net.set_producer(ids[0], fixed(1.0));
        net.set_consumer(ids[0], fixed(1.0));
        net.set_storage(ids[0], fixed(1.0));
        net.remove(ids[0]);
        assert_eq!(net.producer_count(), 0);
        assert_eq!(net.consumer_count(), 0);
        assert_eq!(net.storage_count(), 0);
        assert!(!net.set_charge(ids[0], fixed(1.0)));
    }
}
