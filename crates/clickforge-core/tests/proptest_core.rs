//! Property-based tests for the Clickforge core engine.
//!
//! Uses proptest to generate cost curves and random player sessions, then
//! verify the pricing and balance invariants hold.

use clickforge_core::cost::{batch_cost, unit_cost};
use clickforge_core::engine::Engine;
use clickforge_core::persistence::LoadOutcome;
use clickforge_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

/// One player or host action against the sample game.
#[derive(Debug, Clone)]
enum Op {
    Click(f64),
    BuyGenerator(usize, u32),
    BuyUpgrade(usize, u32),
    ClaimAchievement,
    ClaimQuest(usize),
    StartEvent,
    Prestige,
    BuyPrestigeUpgrade,
    Advance(f64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0.0..50.0f64).prop_map(Op::Click),
        3 => (0..2usize, 1..6u32).prop_map(|(i, q)| Op::BuyGenerator(i, q)),
        2 => (0..2usize, 1..4u32).prop_map(|(i, q)| Op::BuyUpgrade(i, q)),
        1 => Just(Op::ClaimAchievement),
        1 => (0..2usize).prop_map(Op::ClaimQuest),
        1 => Just(Op::StartEvent),
        1 => Just(Op::Prestige),
        1 => Just(Op::BuyPrestigeUpgrade),
        3 => (0.0..30.0f64).prop_map(Op::Advance),
    ]
}

fn apply(engine: &mut Engine, op: &Op) {
    const GENERATORS: [&str; 2] = ["cursor", "farm"];
    const UPGRADES: [&str; 2] = ["better_clicks", "efficient_cursors"];
    const QUESTS: [&str; 2] = ["clicker", "builder"];
    match op {
        Op::Click(amount) => {
            engine.click("points", *amount);
        }
        Op::BuyGenerator(i, q) => {
            engine.buy_generator(GENERATORS[*i], *q);
        }
        Op::BuyUpgrade(i, q) => {
            engine.buy_upgrade(UPGRADES[*i], *q);
        }
        Op::ClaimAchievement => {
            engine.claim_achievement("first_clicks");
        }
        Op::ClaimQuest(i) => {
            engine.claim_quest(QUESTS[*i]);
        }
        Op::StartEvent => {
            engine.start_event("golden_hour");
        }
        Op::Prestige => {
            engine.prestige();
        }
        Op::BuyPrestigeUpgrade => {
            engine.buy_prestige_upgrade("ascend");
        }
        Op::Advance(delta) => {
            engine.advance(*delta);
        }
    }
}

// ===========================================================================
// Cost curve
// ===========================================================================

proptest! {
    #[test]
    fn unit_cost_is_monotonic(
        base in 0.0..1e6f64,
        owned in 0..200u32,
        growth in 1.0..3.0f64,
    ) {
        prop_assert!(unit_cost(base, owned, growth) <= unit_cost(base, owned + 1, growth));
    }

    #[test]
    fn batch_equals_sequential_units(
        base in 0.0..1e4f64,
        owned in 0..50u32,
        quantity in 0..30u32,
        growth in 1.0..2.0f64,
    ) {
        let sequential: f64 = (0..quantity)
            .map(|i| unit_cost(base, owned + i, growth))
            .sum();
        prop_assert_eq!(batch_cost(base, owned, quantity, growth), sequential);
    }

    #[test]
    fn engine_batch_buy_matches_single_buys(quantity in 1..15u32, funds in 0..2_000u32) {
        let funds = f64::from(funds);
        let mut config = sample_config();
        config.resources.insert("points".into(), funds);
        let (mut batch, _, _) = running_engine(config.clone());
        let (mut single, _, _) = running_engine(config);

        let price = batch.generator_cost("cursor", quantity).unwrap();
        let bought = batch.buy_generator("cursor", quantity);
        prop_assert_eq!(bought, price <= funds);
        if bought {
            for _ in 0..quantity {
                prop_assert!(single.buy_generator("cursor", 1));
            }
            prop_assert_eq!(batch.resource("points"), single.resource("points"));
            prop_assert_eq!(batch.resource("points"), funds - price);
        } else {
            prop_assert_eq!(batch.resource("points"), funds);
        }
    }
}

// ===========================================================================
// Sessions
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn balances_never_go_negative(ops in proptest::collection::vec(arb_op(), 1..60)) {
        let (mut engine, _, _) = running_engine(sample_config());
        for op in &ops {
            apply(&mut engine, op);
            for (currency, balance) in &engine.state().resources {
                prop_assert!(*balance >= 0.0, "{} went negative after {:?}", currency, op);
            }
            prop_assert!(engine.prestige_currency() >= 0.0);
        }
    }

    #[test]
    fn save_load_round_trip(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let (mut engine, clock, storage) = running_engine(sample_config());
        for op in &ops {
            apply(&mut engine, op);
        }
        engine.save().unwrap();

        let (mut restored, _, _) = test_engine_with_clock(sample_config(), storage, clock);
        let outcome = restored.load().unwrap();
        let loaded = matches!(outcome, LoadOutcome::Loaded { .. });
        prop_assert!(loaded, "unexpected load outcome {:?}", outcome);

        let (a, b) = (engine.state(), restored.state());
        prop_assert_eq!(&a.resources, &b.resources);
        prop_assert_eq!(&a.entities, &b.entities);
        prop_assert_eq!(&a.prestige, &b.prestige);
        prop_assert_eq!(&a.granted, &b.granted);
        prop_assert_eq!(a.stats.total_clicks, b.stats.total_clicks);
    }

    #[test]
    fn check_unlocks_is_idempotent(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let (mut engine, _, _) = running_engine(sample_config());
        for op in &ops {
            apply(&mut engine, op);
        }
        engine.check_unlocks();
        let before = engine.state().clone();
        prop_assert_eq!(engine.check_unlocks(), 0);
        prop_assert_eq!(engine.state(), &before);
    }
}
