//! Property tests for the safety invariants.

use std::sync::Arc;

use irrigator_core::ledger::RING_CAPACITY;
use irrigator_core::mocks::{RecordingPump, SharedLevel, SharedProbe};
use irrigator_core::{
    CalibrationCfg, CompensationCfg, DoseLedger, LedgerCfg, MoistureEstimator, PlantChannel,
    ReservoirCfg, WateringCfg,
};
use irrigator_traits::clock::test_clock::TestClock;
use proptest::prelude::*;

proptest! {
    /// The ring stays bounded, the per-cycle count never exceeds the
    /// rolling window, and reaching either cap pauses watering, for any
    /// interleaving of ledger operations.
    #[test]
    fn ledger_invariants_hold_for_any_op_sequence(
        ops in prop::collection::vec((0u8..4u8, 0u64..50_000u64), 1..200),
        cap in 1u32..10u32,
    ) {
        let mut ledger = DoseLedger::new(LedgerCfg {
            max_doses_per_cycle: cap,
            ..LedgerCfg::default()
        });
        let mut now_s = 0u64;
        for (op, dt) in ops {
            now_s += dt;
            match op {
                0 => ledger.start_cycle(now_s),
                1 => ledger.add_dose(),
                2 => ledger.end_cycle(),
                _ => ledger.tick(now_s),
            }
            prop_assert!(ledger.record_count() <= RING_CAPACITY);
            prop_assert!(ledger.doses_this_cycle() <= ledger.doses_today());
            if ledger.doses_this_cycle() >= cap || ledger.doses_today() >= cap {
                prop_assert!(ledger.should_pause_watering());
            }
        }
    }

    /// With the interlock on and no water, no probe sequence or tick
    /// timing ever turns the pump on.
    #[test]
    fn pump_never_runs_without_water(
        raws in prop::collection::vec(0i32..5_000i32, 1..40),
        advances in prop::collection::vec(0u64..120_000u64, 1..40),
    ) {
        let probe = SharedProbe::new(2042);
        let level = SharedLevel::new(false);
        let pump = RecordingPump::new();
        let clock = TestClock::new();
        let mut channel = PlantChannel::builder("p", probe.clone(), level, pump.clone())
            .watering(WateringCfg {
                inter_dose_ms: 0,
                recheck_ms: 1_000,
                ..WateringCfg::default()
            })
            .reservoir(ReservoirCfg {
                low_water_secs: 0.0,
                interlock_enabled: true,
            })
            .clock(Arc::new(clock.clone()))
            .enabled(true)
            .try_build()
            .unwrap();

        for (raw, adv) in raws.iter().zip(advances) {
            probe.set(*raw);
            clock.advance_ms(adv);
            channel.tick().unwrap();
            prop_assert!(!channel.pump_is_on());
        }
        prop_assert_eq!(pump.on_count(), 0);
    }

    /// The clamped filter output stays finite and inside [0, 100] for
    /// any raw sequence, including out-of-range samples.
    #[test]
    fn filtered_moisture_stays_in_range(
        raws in prop::collection::vec(0i32..6_000i32, 1..60),
        steps in prop::collection::vec(0u64..600_000u64, 1..60),
    ) {
        let probe = SharedProbe::new(2042);
        let mut est = MoistureEstimator::new(
            probe.clone(),
            CalibrationCfg::default(),
            CompensationCfg::default(),
            300.0,
        );
        let mut now_ms = 0u64;
        for (raw, dt) in raws.iter().zip(steps) {
            probe.set(*raw);
            now_ms += dt;
            est.read(now_ms);
            let v = est.filtered_value();
            prop_assert!(v.is_finite());
            prop_assert!((0.0..=100.0).contains(&v));
        }
    }

    /// While waiting for the next cycle sigma is non-decreasing and
    /// always inside the [5 min, 20 min] bounds.
    #[test]
    fn sigma_is_bounded_and_monotonic_while_waiting(
        advances in prop::collection::vec(1u64..400_000u64, 1..30),
    ) {
        let probe = SharedProbe::new(1684); // ~85%, above the max target
        let level = SharedLevel::new(true);
        let pump = RecordingPump::new();
        let clock = TestClock::new();
        let mut channel = PlantChannel::builder("s", probe, level, pump)
            .clock(Arc::new(clock.clone()))
            .enabled(true)
            .try_build()
            .unwrap();

        channel.tick().unwrap(); // Disabled poll picks up the flag
        clock.advance_ms(900_000); // past the boot inter-dose hold-off
        channel.tick().unwrap(); // Evaluate routes to WaitForNextCycle
        prop_assert_eq!(channel.state(), irrigator_core::ChannelState::WaitForNextCycle);

        let mut prev = channel.sigma_seconds();
        for adv in advances {
            clock.advance_ms(adv);
            channel.tick().unwrap();
            let sigma = channel.sigma_seconds();
            prop_assert!((300.0..=1200.0).contains(&sigma));
            prop_assert!(sigma >= prev);
            prev = sigma;
        }
    }
}
