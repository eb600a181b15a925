use posture_core::{AlertEscalation, AlertEvent, AlertLevel, MilestoneTable, SlouchBudget};
use proptest::prelude::*;

prop_compose! {
    fn cycle_strategy()(
        bad in any::<bool>(),
        moving in any::<bool>(),
        delta_ms in 0u64..5_000,
    ) -> (bool, bool, u64) {
        (bad, moving, delta_ms)
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn budget_stays_within_window(
        window_ms in 1u64..2_000_000,
        start in 0u64..3_000_000,
        cycles in prop::collection::vec(cycle_strategy(), 0..400),
    ) {
        let mut b = SlouchBudget::with_cumulative(window_ms, start);
        prop_assert!(b.cumulative_ms() <= window_ms);
        for (bad, moving, delta) in cycles {
            let v = b.update(bad, moving, delta);
            prop_assert!(v <= window_ms);
        }
    }

    #[test]
    fn level_for_is_monotone(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let table = MilestoneTable::progressive();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(table.level_for(lo) <= table.level_for(hi));
    }

    #[test]
    fn one_activation_per_band(start_band in 0usize..6, steps in 1usize..200) {
        // Budget rises strictly but stays inside one band: no event at all.
        let table = MilestoneTable::progressive();
        let lo = table.entries()[start_band].at_ms;
        let hi = table.entries()[start_band + 1].at_ms;
        let mut esc = AlertEscalation::new(table, 15.0, 2.0);
        let mut budget = SlouchBudget::with_cumulative(900_000, lo);
        let first = esc.evaluate(&mut budget, 20.0, true, 0);
        let is_activation = matches!(first, Some(AlertEvent::Activated { .. }));
        prop_assert!(is_activation);
        let step = ((hi - lo - 1) / steps as u64).max(1);
        let mut events = 0;
        for i in 0..steps {
            if budget.cumulative_ms() + step >= hi {
                break;
            }
            budget.update(true, false, step);
            if esc.evaluate(&mut budget, 20.0, true, i as u64).is_some() {
                events += 1;
            }
        }
        prop_assert_eq!(events, 0);
    }

    #[test]
    fn recovery_halves_exactly(cum in 300_001u64..900_000) {
        let mut esc = AlertEscalation::new(MilestoneTable::progressive(), 15.0, 2.0);
        let mut budget = SlouchBudget::with_cumulative(900_000, cum);
        esc.evaluate(&mut budget, 20.0, true, 0);
        prop_assert_eq!(esc.state().level, AlertLevel::Critical);
        // Decay to just below the Critical mark in one update.
        let delta = cum - 299_999;
        budget.update(false, false, delta);
        let ev = esc.evaluate(&mut budget, 0.0, false, 1);
        prop_assert_eq!(ev, Some(AlertEvent::Recovered { from_ms: 299_999, to_ms: 149_999 }));
        prop_assert_eq!(budget.cumulative_ms(), 149_999);
    }
}
