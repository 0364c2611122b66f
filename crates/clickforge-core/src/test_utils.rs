//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::clock::ManualClock;
use crate::condition::{Condition, Stat};
use crate::config::*;
use crate::engine::Engine;
use crate::event::{Event, EventKind};
use crate::modifier::{CLICK, ModifierDef, PRODUCTION, generator_key};
use crate::persistence::MemoryStorage;

/// Wall-clock start for every test engine (2023-11-14).
pub const START_MS: i64 = 1_700_000_000_000;

/// Fixed seed so critical and event rolls replay identically.
pub const TEST_SEED: u64 = 7;

// ===========================================================================
// Small builders
// ===========================================================================

pub fn price(currency: &str, amount: f64) -> BTreeMap<String, f64> {
    BTreeMap::from([(currency.to_string(), amount)])
}

pub fn upgrade(id: &str, cost: f64, modifiers: Vec<ModifierDef>) -> UpgradeDef {
    UpgradeDef {
        id: id.to_string(),
        cost: price(DEFAULT_CURRENCY, cost),
        modifiers,
        unlock: Condition::Always,
        max_level: None,
        always_visible: false,
    }
}

pub fn generator(id: &str, cost: f64, base_production: f64) -> GeneratorDef {
    GeneratorDef {
        id: id.to_string(),
        currency: DEFAULT_CURRENCY.to_string(),
        cost,
        cost_currency: None,
        base_production,
        efficiency: 1.0,
        unlock: Condition::Always,
    }
}

/// Defaults with every random roll disabled and a fixed seed.
pub fn quiet_config() -> GameConfig {
    GameConfig {
        crit_chance: 0.0,
        event_chance: 0.0,
        rng_seed: Some(TEST_SEED),
        ..GameConfig::default()
    }
}

// ===========================================================================
// Sample content
// ===========================================================================

/// A small game touching every entity kind.
///
/// - upgrades: `better_clicks` (10 points, click +1, max level 5) and
///   `efficient_cursors` (50 points, `generator_cursor` +1, unlocks with one
///   cursor)
/// - generators: `cursor` (10 points, 1/s) and `farm` (100 points, 8/s,
///   unlocks at 50 points held)
/// - achievement `first_clicks` (5 clicks, 5 points, production +0.1)
/// - event `golden_hour` (10 s, 100 points, click +0.5)
/// - quests: `clicker` (10 clicks, 25 points, production +0.05) and
///   `builder` (own 2 cursors, 10 points)
/// - prestige tier `ascend` (cost 1, unlocks at 1e6 points generated,
///   production +0.5)
pub fn sample_config() -> GameConfig {
    GameConfig {
        upgrades: vec![
            UpgradeDef {
                max_level: Some(5),
                ..upgrade("better_clicks", 10.0, vec![ModifierDef::additive(CLICK, 1.0)])
            },
            UpgradeDef {
                unlock: Condition::at_least(Stat::GeneratorOwned("cursor".into()), 1.0),
                ..upgrade(
                    "efficient_cursors",
                    50.0,
                    vec![ModifierDef::additive(&generator_key("cursor"), 1.0)],
                )
            },
        ],
        generators: vec![
            generator("cursor", 10.0, 1.0),
            GeneratorDef {
                unlock: Condition::at_least(Stat::Resource(DEFAULT_CURRENCY.into()), 50.0),
                ..generator("farm", 100.0, 8.0)
            },
        ],
        achievements: vec![AchievementDef {
            id: "first_clicks".into(),
            condition: Condition::at_least(Stat::TotalClicks, 5.0),
            reward: price(DEFAULT_CURRENCY, 5.0),
            modifiers: vec![ModifierDef::additive(PRODUCTION, 0.1)],
        }],
        events: vec![EventDef {
            id: "golden_hour".into(),
            duration: Some(10.0),
            rewards: price(DEFAULT_CURRENCY, 100.0),
            modifiers: vec![ModifierDef::additive(CLICK, 0.5)],
        }],
        quests: vec![
            QuestDef {
                id: "clicker".into(),
                goal: QuestGoal::Action {
                    action: QuestAction::Click,
                    subject: None,
                    measure: QuestMeasure::Count,
                    target: 10.0,
                },
                reward: price(DEFAULT_CURRENCY, 25.0),
                modifiers: vec![ModifierDef::additive(PRODUCTION, 0.05)],
            },
            QuestDef {
                id: "builder".into(),
                goal: QuestGoal::Condition(Condition::at_least(
                    Stat::GeneratorOwned("cursor".into()),
                    2.0,
                )),
                reward: price(DEFAULT_CURRENCY, 10.0),
                modifiers: Vec::new(),
            },
        ],
        prestige: vec![PrestigeDef {
            id: "ascend".into(),
            cost: 1.0,
            unlock: Condition::at_least(Stat::TotalGenerated(DEFAULT_CURRENCY.into()), 1e6),
            modifiers: vec![ModifierDef::additive(PRODUCTION, 0.5)],
        }],
        ..quiet_config()
    }
}

/// One entity per modifier source, for resolver tests.
pub fn modifier_config() -> GameConfig {
    GameConfig {
        upgrades: vec![
            upgrade("sharp_fingers", 10.0, vec![ModifierDef::additive(CLICK, 0.5)]),
            upgrade("overdrive", 100.0, vec![ModifierDef::exponential(PRODUCTION, 1.5)]),
        ],
        generators: vec![generator("miner", 10.0, 1.0)],
        achievements: vec![AchievementDef {
            id: "busy".into(),
            condition: Condition::Always,
            reward: BTreeMap::new(),
            modifiers: vec![ModifierDef::additive(PRODUCTION, 0.25)],
        }],
        prestige: vec![PrestigeDef {
            id: "heritage".into(),
            cost: 1.0,
            unlock: Condition::Always,
            modifiers: vec![ModifierDef::additive(CLICK, 1.0)],
        }],
        ..quiet_config()
    }
}

/// One `miner` (10 points, 1/s) and exactly enough points to buy it.
pub fn single_generator_config() -> GameConfig {
    GameConfig {
        resources: price(DEFAULT_CURRENCY, 10.0),
        generators: vec![generator("miner", 10.0, 1.0)],
        ..quiet_config()
    }
}

// ===========================================================================
// Engine builders
// ===========================================================================

/// A stopped engine on a manual clock at [`START_MS`] with fresh in-memory
/// storage. The returned clock and storage share state with the engine's.
pub fn test_engine(config: GameConfig) -> (Engine, ManualClock, MemoryStorage) {
    test_engine_with_storage(config, MemoryStorage::new())
}

pub fn test_engine_with_storage(
    config: GameConfig,
    storage: MemoryStorage,
) -> (Engine, ManualClock, MemoryStorage) {
    test_engine_with_clock(config, storage, ManualClock::new(START_MS))
}

pub fn test_engine_with_clock(
    config: GameConfig,
    storage: MemoryStorage,
    clock: ManualClock,
) -> (Engine, ManualClock, MemoryStorage) {
    let engine = Engine::new(config, Box::new(storage.clone()), Box::new(clock.clone()))
        .expect("test config should validate");
    (engine, clock, storage)
}

/// Like [`test_engine`], but already started.
pub fn running_engine(config: GameConfig) -> (Engine, ManualClock, MemoryStorage) {
    let (mut engine, clock, storage) = test_engine(config);
    engine.start();
    (engine, clock, storage)
}

// ===========================================================================
// Recording subscribers
// ===========================================================================

/// Collect every delivered event of `kind`.
pub fn record_events(engine: &mut Engine, kind: EventKind) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    engine.on(kind, move |notification, _| {
        sink.borrow_mut().push(notification.event.clone());
        Ok(())
    });
    seen
}
