//! Clickforge Core -- an embeddable engine for incremental ("clicker") games.
//!
//! This crate provides the declarative game configuration, the mutable state
//! tree, the modifier resolver and cost curve, the tick engine with its
//! transaction operations, notifications, and save/load persistence that a
//! host application drives.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Engine::advance`] moves simulated time forward:
//!
//! 1. **Pre-tick** -- Run commands queued with [`engine::Engine::queue`].
//! 2. **Clock** -- Accumulate play time and stamp the last update.
//! 3. **Production** -- Owned generators credit their currency.
//! 4. **Events** -- Timed events progress and complete; a random event may
//!    start.
//! 5. **Predicates** -- Achievements, quests and unlocks settle to a fixpoint.
//! 6. **Post-tick** -- Emit `Update`, deliver notifications, and run commands
//!    returned by reactive subscribers.
//!
//! Hosts either call [`engine::Engine::poll`] from their own loop (the tick
//! and save tasks fire on the engine's [`clock::Clock`]) or call `advance`
//! directly with an explicit delta.
//!
//! # Re-entrancy Pattern
//!
//! Subscribers never hold the engine. A reactive subscriber returns commands
//! that the engine runs once delivery is over:
//!
//! ```rust,ignore
//! engine.on_reactive(EventKind::AchievementUnlocked, |n, _| match &n.event {
//!     Event::AchievementUnlocked { id } => Ok(vec![Command::ClaimAchievement { id: id.clone() }]),
//!     _ => Ok(Vec::new()),
//! });
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns config and state; runs ticks and transactions.
//! - [`config::GameConfig`] -- Typed configuration with documented defaults.
//! - [`state::GameState`] -- The serializable state tree.
//! - [`condition::Condition`] -- Unlock and goal predicates as data, plus
//!   named custom predicates.
//! - [`modifier::ModifierResolver`] -- Sums additive, multiplicative and
//!   exponential modifiers from every source.
//! - [`event::EventBus`] -- Buffered notifications with prioritized
//!   subscribers and a history ring buffer.
//! - [`persistence`] -- Storage backends, save records and export/import.

pub mod clock;
pub mod command;
pub mod condition;
pub mod config;
pub mod cost;
pub mod engine;
pub mod event;
pub mod format;
pub mod id;
pub mod modifier;
pub mod persistence;
pub mod query;
pub mod registry;
pub mod rng;
pub mod scheduler;
pub mod state;
pub mod transaction;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
