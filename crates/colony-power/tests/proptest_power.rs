//! Property-based tests for power satisfaction.

use colony_core::fixed::Fixed64;
use colony_core::id::BuildingId;
use colony_power::PowerNetwork;
use proptest::prelude::*;
use slotmap::SlotMap;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Satisfaction stays in [0, 1] and is exactly 1.0 whenever
    /// production covers consumption.
    #[test]
    fn satisfaction_is_bounded(
        producers in proptest::collection::vec(0..2000u32, 0..5),
        consumers in proptest::collection::vec(0..2000u32, 0..5),
        storage in proptest::collection::vec((1..500u32, 0..500u32), 0..3),
        ticks in 1..20u64,
    ) {
        let mut ids = SlotMap::<BuildingId, ()>::with_key();
        let mut net = PowerNetwork::new();
        for &kw in &producers {
            net.set_producer(ids.insert(()), Fixed64::from_num(kw));
        }
        for &kw in &consumers {
            net.set_consumer(ids.insert(()), Fixed64::from_num(kw));
        }
        for &(cap, charge) in &storage {
            let id = ids.insert(());
            net.set_storage(id, Fixed64::from_num(cap));
            net.set_charge(id, Fixed64::from_num(charge));
        }

        let production: u32 = producers.iter().sum();
        let consumption: u32 = consumers.iter().sum();
        let total_capacity: u32 = storage.iter().map(|&(cap, _)| cap).sum();

        for t in 1..=ticks {
            net.tick(t, |_| true);
            let s = net.satisfaction();
            prop_assert!(s >= Fixed64::ZERO);
            prop_assert!(s <= Fixed64::ONE);
            if production >= consumption {
                prop_assert_eq!(s, Fixed64::ONE);
            }
            prop_assert!(net.stored_energy() <= Fixed64::from_num(total_capacity));
        }
    }
}
