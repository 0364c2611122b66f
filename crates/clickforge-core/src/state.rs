//! The mutable game state tree owned by the engine.
//!
//! This is also the persisted layout: a save record carries the whole
//! [`GameState`] as JSON. Entity lists are flattened into the top level, and
//! counters use camelCase keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::modifier::GrantedModifier;
use crate::registry::{self, EntityRegistry, PrestigeUpgradeState};

/// Cross-epoch progress. Survives `prestige()`, cleared by `reset()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrestigeState {
    pub level: u32,
    pub currency: f64,
    pub upgrades: Vec<PrestigeUpgradeState>,
}

impl PrestigeState {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            level: 0,
            currency: 0.0,
            upgrades: config.prestige.iter().map(|d| registry::fresh(&d.id)).collect(),
        }
    }

    pub fn upgrade(&self, id: &str) -> Option<&PrestigeUpgradeState> {
        registry::find(&self.upgrades, id)
    }

    fn reconcile(self, config: &GameConfig) -> Self {
        Self {
            upgrades: registry::reconcile_list(
                self.upgrades,
                config.prestige.iter().map(|d| d.id.as_str()),
            ),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stats {
    pub total_clicks: u64,
    /// Generator output per currency in this epoch. Clicks do not count.
    pub total_generated: BTreeMap<String, f64>,
    /// Seconds of ticked time in this epoch.
    pub play_time: f64,
    pub last_reset: i64,
}

/// Absolute epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timestamps {
    pub last_update: i64,
    pub game_start: i64,
    pub last_save: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    pub resources: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub entities: EntityRegistry,
    pub prestige: PrestigeState,
    pub stats: Stats,
    pub timestamps: Timestamps,
    /// Modifiers granted by claimed quests and completed events.
    pub granted: Vec<GrantedModifier>,
}

impl GameState {
    /// Fresh state at the start of a new game.
    pub fn new(config: &GameConfig, now_ms: i64) -> Self {
        let mut state = Self {
            resources: config.resources.clone(),
            entities: EntityRegistry::from_config(config),
            prestige: PrestigeState::from_config(config),
            stats: Stats {
                last_reset: now_ms,
                ..Stats::default()
            },
            timestamps: Timestamps {
                last_update: now_ms,
                game_start: now_ms,
                last_save: None,
            },
            granted: Vec::new(),
        };
        state.track_currencies(config);
        state
    }

    /// Fresh epoch that keeps the prestige block.
    pub fn next_epoch(&self, config: &GameConfig, now_ms: i64) -> Self {
        Self {
            prestige: self.prestige.clone(),
            ..Self::new(config, now_ms)
        }
    }

    /// Align a deserialized state with the live configuration.
    pub fn reconcile(self, config: &GameConfig) -> Self {
        let mut state = Self {
            entities: self.entities.reconcile(config),
            prestige: self.prestige.reconcile(config),
            ..self
        };
        state.track_currencies(config);
        state
    }

    fn track_currencies(&mut self, config: &GameConfig) {
        for currency in &config.currencies {
            self.ensure_resource(currency);
            self.stats
                .total_generated
                .entry(currency.clone())
                .or_insert(0.0);
        }
    }

    /// Balance of `currency`, creating it at zero if it was never seen.
    pub fn ensure_resource(&mut self, currency: &str) -> &mut f64 {
        self.resources.entry(currency.to_string()).or_insert(0.0)
    }

    /// Balance of `currency`. Unknown currencies read as zero.
    pub fn resource(&self, currency: &str) -> f64 {
        self.resources.get(currency).copied().unwrap_or(0.0)
    }

    /// Credit generator output to the balance and the lifetime total.
    pub fn add_generated(&mut self, currency: &str, amount: f64) {
        *self.ensure_resource(currency) += amount;
        *self
            .stats
            .total_generated
            .entry(currency.to_string())
            .or_insert(0.0) += amount;
    }

    /// Credit a reward mapping.
    pub fn grant(&mut self, rewards: &BTreeMap<String, f64>) {
        for (currency, amount) in rewards {
            *self.ensure_resource(currency) += amount;
        }
    }
}
