//! Read-only query API over game state.
//!
//! [`StateView`] is the narrow interface handed to predicates: it can read
//! balances, counters and entity flags, but never mutate anything or reach
//! back into the engine.

use crate::condition::{PredicateError, Stat};
use crate::config::GameConfig;
use crate::id::EntityKind;
use crate::registry::{
    AchievementState, EventState, GeneratorState, PrestigeUpgradeState, QuestState, UpgradeState,
};
use crate::state::GameState;

/// A borrowed, read-only view of the live configuration and state.
#[derive(Debug, Clone, Copy)]
pub struct StateView<'a> {
    config: &'a GameConfig,
    state: &'a GameState,
}

impl<'a> StateView<'a> {
    pub fn new(config: &'a GameConfig, state: &'a GameState) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &'a GameConfig {
        self.config
    }

    pub fn state(&self) -> &'a GameState {
        self.state
    }

    pub fn resource(&self, currency: &str) -> f64 {
        self.state.resource(currency)
    }

    pub fn total_generated(&self, currency: &str) -> f64 {
        self.state
            .stats
            .total_generated
            .get(currency)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn total_clicks(&self) -> u64 {
        self.state.stats.total_clicks
    }

    pub fn play_time(&self) -> f64 {
        self.state.stats.play_time
    }

    pub fn prestige_level(&self) -> u32 {
        self.state.prestige.level
    }

    pub fn prestige_currency(&self) -> f64 {
        self.state.prestige.currency
    }

    pub fn upgrade(&self, id: &str) -> Option<&'a UpgradeState> {
        self.state.entities.upgrade(id)
    }

    pub fn generator(&self, id: &str) -> Option<&'a GeneratorState> {
        self.state.entities.generator(id)
    }

    pub fn achievement(&self, id: &str) -> Option<&'a AchievementState> {
        self.state.entities.achievement(id)
    }

    pub fn event(&self, id: &str) -> Option<&'a EventState> {
        self.state.entities.event(id)
    }

    pub fn quest(&self, id: &str) -> Option<&'a QuestState> {
        self.state.entities.quest(id)
    }

    pub fn prestige_upgrade(&self, id: &str) -> Option<&'a PrestigeUpgradeState> {
        self.state.prestige.upgrade(id)
    }

    pub fn claimed_achievements(&self) -> usize {
        self.state.entities.claimed_achievements()
    }

    /// Read a [`Stat`] as a number. Unknown entity ids are errors; unknown
    /// currencies read as zero.
    pub fn stat(&self, stat: &Stat) -> Result<f64, PredicateError> {
        let unknown = |kind: EntityKind, id: &str| PredicateError::UnknownEntity {
            kind,
            id: id.to_string(),
        };
        let flag = |b: bool| if b { 1.0 } else { 0.0 };

        Ok(match stat {
            Stat::Resource(currency) => self.resource(currency),
            Stat::TotalGenerated(currency) => self.total_generated(currency),
            Stat::TotalClicks => self.total_clicks() as f64,
            Stat::PlayTime => self.play_time(),
            Stat::PrestigeLevel => f64::from(self.prestige_level()),
            Stat::PrestigeCurrency => self.prestige_currency(),
            Stat::UpgradeOwned(id) => f64::from(
                self.upgrade(id)
                    .ok_or_else(|| unknown(EntityKind::Upgrade, id))?
                    .owned,
            ),
            Stat::GeneratorOwned(id) => f64::from(
                self.generator(id)
                    .ok_or_else(|| unknown(EntityKind::Generator, id))?
                    .owned,
            ),
            Stat::PrestigeUpgradeOwned(id) => f64::from(
                self.prestige_upgrade(id)
                    .ok_or_else(|| unknown(EntityKind::PrestigeUpgrade, id))?
                    .owned,
            ),
            Stat::AchievementsClaimed => self.claimed_achievements() as f64,
            Stat::AchievementUnlocked(id) => flag(
                self.achievement(id)
                    .ok_or_else(|| unknown(EntityKind::Achievement, id))?
                    .unlocked,
            ),
            Stat::QuestCompleted(id) => flag(
                self.quest(id)
                    .ok_or_else(|| unknown(EntityKind::Quest, id))?
                    .completed,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn reads_counters_and_flags() {
        let config = sample_config();
        let mut state = GameState::new(&config, 0);
        state.stats.total_clicks = 12;
        state.entities.generators[0].owned = 4;
        state.entities.achievements[0].unlocked = true;

        let view = StateView::new(&config, &state);
        assert_eq!(view.stat(&Stat::TotalClicks).unwrap(), 12.0);
        assert_eq!(view.stat(&Stat::GeneratorOwned("cursor".into())).unwrap(), 4.0);
        assert_eq!(
            view.stat(&Stat::AchievementUnlocked("first_clicks".into())).unwrap(),
            1.0
        );
        assert_eq!(view.stat(&Stat::AchievementsClaimed).unwrap(), 0.0);
    }

    #[test]
    fn unknown_generator_is_error() {
        let config = sample_config();
        let state = GameState::new(&config, 0);
        let view = StateView::new(&config, &state);
        assert!(matches!(
            view.stat(&Stat::GeneratorOwned("ghost".into())),
            Err(PredicateError::UnknownEntity {
                kind: EntityKind::Generator,
                ..
            })
        ));
    }

    #[test]
    fn total_generated_defaults_to_zero() {
        let config = sample_config();
        let state = GameState::new(&config, 0);
        let view = StateView::new(&config, &state);
        assert_eq!(view.total_generated("points"), 0.0);
        assert_eq!(view.total_generated("unknown"), 0.0);
    }
}
