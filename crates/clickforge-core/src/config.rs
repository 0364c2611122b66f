//! Declarative game configuration.
//!
//! A [`GameConfig`] is immutable once handed to the engine. Every field has a
//! documented default, so a data file only needs to spell out what differs:
//! missing scalar fields take their default and missing lists are empty.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::condition::{self, Condition};
use crate::cost::DEFAULT_GROWTH_RATE;
use crate::id::EntityKind;
use crate::modifier::ModifierDef;

/// Currency used when the configuration names none.
pub const DEFAULT_CURRENCY: &str = "points";

// ---------------------------------------------------------------------------
// Content definitions
// ---------------------------------------------------------------------------

/// A purchasable upgrade. Its modifiers scale with the owned count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: String,
    /// Base price per currency. Every currency must be affordable for the
    /// purchase to go through.
    #[serde(default)]
    pub cost: BTreeMap<String, f64>,
    #[serde(default)]
    pub modifiers: Vec<ModifierDef>,
    #[serde(default = "condition::always")]
    pub unlock: Condition,
    #[serde(default)]
    pub max_level: Option<u32>,
    /// Purchasable even while locked.
    #[serde(default)]
    pub always_visible: bool,
}

/// A passive producer of one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorDef {
    pub id: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub cost: f64,
    /// Currency the generator is paid in; defaults to the one it produces.
    #[serde(default)]
    pub cost_currency: Option<String>,
    /// Units produced per owned generator per second.
    pub base_production: f64,
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
    #[serde(default = "condition::always")]
    pub unlock: Condition,
}

impl GeneratorDef {
    pub fn payment_currency(&self) -> &str {
        self.cost_currency.as_deref().unwrap_or(&self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: String,
    #[serde(default = "condition::never")]
    pub condition: Condition,
    #[serde(default)]
    pub reward: BTreeMap<String, f64>,
    /// Active once the achievement is claimed.
    #[serde(default)]
    pub modifiers: Vec<ModifierDef>,
}

/// A timed or manually completed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    pub id: String,
    /// Seconds of ticking after which the event completes on its own.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub rewards: BTreeMap<String, f64>,
    /// Granted permanently (for the epoch) on every completion.
    #[serde(default)]
    pub modifiers: Vec<ModifierDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestDef {
    pub id: String,
    pub goal: QuestGoal,
    #[serde(default)]
    pub reward: BTreeMap<String, f64>,
    /// Granted when the quest is claimed.
    #[serde(default)]
    pub modifiers: Vec<ModifierDef>,
}

/// A prestige tier. Its unlock condition gates `prestige()`, and once
/// unlocked it can be bought with prestige currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrestigeDef {
    pub id: String,
    /// Flat price in prestige currency.
    pub cost: f64,
    #[serde(default = "condition::never")]
    pub unlock: Condition,
    #[serde(default)]
    pub modifiers: Vec<ModifierDef>,
}

// ---------------------------------------------------------------------------
// Quest goals
// ---------------------------------------------------------------------------

/// What a quest tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestGoal {
    /// Completes on the first pass where the condition holds.
    Condition(Condition),
    /// Accumulates progress as the player performs an action.
    Action {
        action: QuestAction,
        /// Restricts progress to one currency (clicks) or entity id (buys).
        #[serde(default)]
        subject: Option<String>,
        #[serde(default)]
        measure: QuestMeasure,
        target: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestAction {
    Click,
    BuyUpgrade,
    BuyGenerator,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestMeasure {
    /// One per click, or the quantity bought.
    #[default]
    Count,
    /// Currency gained by clicking. Same as `Count` for purchases.
    Amount,
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// The full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Compared against the version stored in a save; a mismatch rejects the
    /// load.
    pub version: String,
    /// Starting balances.
    pub resources: BTreeMap<String, f64>,
    /// Currencies initialized to zero at startup and tracked for prestige.
    pub currencies: Vec<String>,
    pub upgrades: Vec<UpgradeDef>,
    pub generators: Vec<GeneratorDef>,
    pub achievements: Vec<AchievementDef>,
    pub events: Vec<EventDef>,
    pub quests: Vec<QuestDef>,
    pub prestige: Vec<PrestigeDef>,

    pub tick_interval_ms: u64,
    pub save_interval_ms: u64,
    pub offline_progress: bool,
    /// Cap on offline catch-up, in seconds.
    pub max_offline_time: f64,
    pub save_key: String,

    pub growth_rate: f64,
    /// Used when no modifier targets `critChance`.
    pub crit_chance: f64,
    pub crit_multiplier: f64,
    pub event_chance: f64,

    /// Capacity of the notification history ring buffer.
    pub event_history: usize,
    /// Rounds of commands from reactive subscribers executed per operation.
    pub max_cascade_depth: usize,
    /// Fixed RNG seed. `None` seeds from the clock.
    pub rng_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            version: "1.2".to_string(),
            resources: BTreeMap::from([(DEFAULT_CURRENCY.to_string(), 0.0)]),
            currencies: vec![DEFAULT_CURRENCY.to_string()],
            upgrades: Vec::new(),
            generators: Vec::new(),
            achievements: Vec::new(),
            events: Vec::new(),
            quests: Vec::new(),
            prestige: Vec::new(),
            tick_interval_ms: 250,
            save_interval_ms: 1000,
            offline_progress: true,
            max_offline_time: 86_400.0,
            save_key: "ClickRegenSave".to_string(),
            growth_rate: DEFAULT_GROWTH_RATE,
            crit_chance: 0.05,
            crit_multiplier: 2.0,
            event_chance: 0.001,
            event_history: 256,
            max_cascade_depth: 8,
            rng_seed: None,
        }
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_efficiency() -> f64 {
    1.0
}

impl GameConfig {
    /// Check structural invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unique(EntityKind::Upgrade, self.upgrades.iter().map(|d| d.id.as_str()))?;
        check_unique(EntityKind::Generator, self.generators.iter().map(|d| d.id.as_str()))?;
        check_unique(EntityKind::Achievement, self.achievements.iter().map(|d| d.id.as_str()))?;
        check_unique(EntityKind::Event, self.events.iter().map(|d| d.id.as_str()))?;
        check_unique(EntityKind::Quest, self.quests.iter().map(|d| d.id.as_str()))?;
        check_unique(EntityKind::PrestigeUpgrade, self.prestige.iter().map(|d| d.id.as_str()))?;

        for (currency, amount) in &self.resources {
            if !(*amount >= 0.0 && amount.is_finite()) {
                return Err(ConfigError::InvalidStartingResource {
                    currency: currency.clone(),
                    value: *amount,
                });
            }
        }

        for def in &self.upgrades {
            for amount in def.cost.values() {
                check_non_negative(EntityKind::Upgrade, &def.id, "cost", *amount)?;
            }
        }
        for def in &self.generators {
            check_non_negative(EntityKind::Generator, &def.id, "cost", def.cost)?;
            check_non_negative(EntityKind::Generator, &def.id, "base_production", def.base_production)?;
            check_non_negative(EntityKind::Generator, &def.id, "efficiency", def.efficiency)?;
        }
        for def in &self.prestige {
            check_non_negative(EntityKind::PrestigeUpgrade, &def.id, "cost", def.cost)?;
        }
        for def in &self.events {
            if let Some(duration) = def.duration {
                check_non_negative(EntityKind::Event, &def.id, "duration", duration)?;
            }
            for amount in def.rewards.values() {
                check_non_negative(EntityKind::Event, &def.id, "rewards", *amount)?;
            }
        }
        for def in &self.achievements {
            for amount in def.reward.values() {
                check_non_negative(EntityKind::Achievement, &def.id, "reward", *amount)?;
            }
        }
        for def in &self.quests {
            for amount in def.reward.values() {
                check_non_negative(EntityKind::Quest, &def.id, "reward", *amount)?;
            }
        }

        if self.growth_rate < 1.0 || !self.growth_rate.is_finite() {
            return Err(ConfigError::InvalidGrowthRate(self.growth_rate));
        }
        if self.max_offline_time.is_nan() || self.max_offline_time < 0.0 {
            return Err(ConfigError::NegativeOfflineTime(self.max_offline_time));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    pub fn upgrade(&self, id: &str) -> Option<&UpgradeDef> {
        self.upgrades.iter().find(|d| d.id == id)
    }

    pub fn generator(&self, id: &str) -> Option<&GeneratorDef> {
        self.generators.iter().find(|d| d.id == id)
    }

    pub fn prestige_tier(&self, id: &str) -> Option<&PrestigeDef> {
        self.prestige.iter().find(|d| d.id == id)
    }
}

fn check_unique<'a>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ConfigError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn check_non_negative(
    kind: EntityKind,
    id: &str,
    field: &'static str,
    value: f64,
) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            kind,
            id: id.to_string(),
            field,
            value,
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("{kind} '{id}' has invalid {field}: {value}")]
    InvalidValue {
        kind: EntityKind,
        id: String,
        field: &'static str,
        value: f64,
    },

    #[error("starting amount of '{currency}' must be non-negative, got {value}")]
    InvalidStartingResource { currency: String, value: f64 },

    #[error("growth rate must be at least 1, got {0}")]
    InvalidGrowthRate(f64),

    #[error("max offline time must not be negative, got {0}")]
    NegativeOfflineTime(f64),

    #[error("tick interval must be positive")]
    ZeroTickInterval,
}
