//! Save/load integration tests: round trips, the config version gate,
//! offline catch-up, and export/import between engines.

use clickforge_core::clock::ManualClock;
use clickforge_core::engine::Engine;
use clickforge_core::event::{Event, EventKind};
use clickforge_core::persistence::{FileStorage, LoadOutcome, PersistenceError};
use clickforge_core::test_utils::*;

// ===========================================================================
// Round trip
// ===========================================================================

#[test]
fn save_then_load_restores_observable_state() {
    let mut config = sample_config();
    config.resources.insert("points".into(), 200.0);
    let (mut engine, clock, storage) = running_engine(config.clone());
    engine.buy_generator("cursor", 3);
    engine.buy_upgrade("better_clicks", 2);
    for _ in 0..5 {
        engine.click("points", 1.0);
    }
    engine.advance(0.5);
    engine.claim_achievement("first_clicks");
    engine.save().unwrap();

    let (mut restored, _, _) = test_engine_with_clock(config, storage, clock);
    assert!(matches!(restored.load().unwrap(), LoadOutcome::Loaded { .. }));

    let (a, b) = (engine.state(), restored.state());
    assert_eq!(a.resources, b.resources);
    assert_eq!(a.entities, b.entities);
    assert_eq!(a.prestige, b.prestige);
    assert_eq!(a.granted, b.granted);
    assert_eq!(a.stats.total_clicks, b.stats.total_clicks);
}

#[test]
fn file_storage_round_trip_through_engine() {
    let dir = std::env::temp_dir().join(format!("clickforge-it-{}", std::process::id()));
    let clock = ManualClock::new(START_MS);
    let mut engine = Engine::new(
        sample_config(),
        Box::new(FileStorage::new(&dir)),
        Box::new(clock.clone()),
    )
    .unwrap();
    engine.start();
    engine.click("points", 4.0);
    engine.stop();
    assert!(dir.join("ClickRegenSave.json").exists());

    let mut next = Engine::new(
        sample_config(),
        Box::new(FileStorage::new(&dir)),
        Box::new(clock),
    )
    .unwrap();
    next.load().unwrap();
    assert_eq!(next.resource("points"), 4.0);
    let _ = std::fs::remove_dir_all(&dir);
}

// ===========================================================================
// Version gate
// ===========================================================================

#[test]
fn version_mismatch_leaves_defaults_and_reports_both_versions() {
    let mut old_config = sample_config();
    old_config.version = "1.0".into();
    let (mut old, clock, storage) = running_engine(old_config);
    for _ in 0..7 {
        old.click("points", 1.0);
    }
    old.save().unwrap();

    let (mut engine, _, _) = test_engine_with_clock(sample_config(), storage, clock);
    let (fresh, _, _) = test_engine(sample_config());
    let mismatches = record_events(&mut engine, EventKind::VersionMismatch);

    let outcome = engine.load().unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::VersionMismatch {
            saved: "1.0".into(),
            current: "1.2".into()
        }
    );
    assert_eq!(engine.state(), fresh.state());
    assert_eq!(
        *mismatches.borrow(),
        vec![Event::VersionMismatch {
            saved_version: "1.0".into(),
            current_version: "1.2".into()
        }]
    );
}

// ===========================================================================
// Offline progress
// ===========================================================================

#[test]
fn offline_credit_is_clamped_to_max_offline_time() {
    let mut config = single_generator_config();
    config.max_offline_time = 60.0;
    let (mut engine, clock, storage) = running_engine(config.clone());
    engine.buy_generator("miner", 1);
    engine.save().unwrap();

    clock.advance_secs(60.0 + 500.0);
    let (mut restored, _, _) = test_engine_with_clock(config, storage, clock);
    let offline = record_events(&mut restored, EventKind::OfflineProgress);

    assert_eq!(
        restored.load().unwrap(),
        LoadOutcome::Loaded {
            offline_seconds: 60.0
        }
    );
    assert_eq!(restored.resource("points"), 60.0);
    assert_eq!(*offline.borrow(), vec![Event::OfflineProgress { seconds: 60.0 }]);
}

#[test]
fn offline_credit_below_cap_uses_elapsed_time() {
    let config = single_generator_config();
    let (mut engine, clock, storage) = running_engine(config.clone());
    engine.buy_generator("miner", 1);
    engine.save().unwrap();

    clock.advance_secs(30.0);
    let (mut restored, _, _) = test_engine_with_clock(config, storage, clock);
    restored.load().unwrap();
    assert_eq!(restored.resource("points"), 30.0);
    assert_eq!(restored.state().stats.total_generated["points"], 30.0);
}

// ===========================================================================
// Export / import
// ===========================================================================

#[test]
fn export_moves_a_game_between_engines() {
    let mut config = sample_config();
    config.resources.insert("points".into(), 50.0);
    let (mut engine, _, _) = running_engine(config);
    engine.buy_generator("cursor", 2);
    let text = engine.export_save().unwrap();
    assert!(!text.contains('{'));

    let (mut other, _, storage) = test_engine(sample_config());
    other.import_save(&text).unwrap();
    assert_eq!(other.generator("cursor").unwrap().owned, 2);
    assert_eq!(other.resource("points"), 29.0);
    assert!(storage.contains("ClickRegenSave"));
}

#[test]
fn import_errors_are_reported_and_harmless() {
    let (mut engine, _, _) = running_engine(sample_config());
    engine.click("points", 3.0);
    let errors = record_events(&mut engine, EventKind::Error);

    assert!(matches!(
        engine.import_save("definitely not a save"),
        Err(PersistenceError::Base64(_))
    ));
    assert_eq!(engine.resource("points"), 3.0);
    assert_eq!(errors.borrow().len(), 1);
}
