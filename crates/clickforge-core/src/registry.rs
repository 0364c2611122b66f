//! Mutable per-entity state built from configuration.
//!
//! Each list in [`EntityRegistry`] holds exactly one entry per configured
//! entity, in configuration order. Code elsewhere relies on that: modifier
//! resolution zips config definitions with these lists by position, and
//! the engine addresses entries by index during predicate passes.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

/// Anything addressable by a string id.
pub trait Keyed {
    fn id(&self) -> &str;
}

/// Write access to the id, used when building fresh entries.
pub(crate) trait HasId {
    fn set_id(&mut self, id: &str);
}

macro_rules! entity_state {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Keyed for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }

            impl HasId for $ty {
                fn set_id(&mut self, id: &str) {
                    self.id = id.to_string();
                }
            }
        )*
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeState {
    pub id: String,
    pub owned: u32,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorState {
    pub id: String,
    pub owned: u32,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementState {
    pub id: String,
    pub unlocked: bool,
    pub claimed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventState {
    pub id: String,
    pub active: bool,
    /// Seconds elapsed since the event started.
    pub progress: f64,
    pub started_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestState {
    pub id: String,
    pub completed: bool,
    pub progress: f64,
    pub claimed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrestigeUpgradeState {
    pub id: String,
    pub unlocked: bool,
    pub owned: u32,
}

entity_state!(
    UpgradeState,
    GeneratorState,
    AchievementState,
    EventState,
    QuestState,
    PrestigeUpgradeState,
);

/// A fresh entry for the given id.
pub(crate) fn fresh<T: Default + HasId>(id: &str) -> T {
    let mut entry = T::default();
    entry.set_id(id);
    entry
}

/// Rebuild `loaded` to follow `ids`: entries are matched by id, unknown ids
/// are dropped and missing ones start fresh.
pub(crate) fn reconcile_list<'a, T>(mut loaded: Vec<T>, ids: impl Iterator<Item = &'a str>) -> Vec<T>
where
    T: Default + Keyed + HasId,
{
    ids.map(|id| match loaded.iter().position(|entry| entry.id() == id) {
        Some(pos) => loaded.swap_remove(pos),
        None => fresh(id),
    })
    .collect()
}

pub(crate) fn find<'a, T: Keyed>(list: &'a [T], id: &str) -> Option<&'a T> {
    list.iter().find(|entry| entry.id() == id)
}

pub(crate) fn position<T: Keyed>(list: &[T], id: &str) -> Option<usize> {
    list.iter().position(|entry| entry.id() == id)
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Runtime state for every epoch-scoped entity. Prestige upgrades live in
/// [`crate::state::PrestigeState`] because they survive a prestige.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityRegistry {
    pub upgrades: Vec<UpgradeState>,
    pub generators: Vec<GeneratorState>,
    pub achievements: Vec<AchievementState>,
    pub events: Vec<EventState>,
    pub quests: Vec<QuestState>,
}

impl EntityRegistry {
    /// Every entity locked, unowned and inactive.
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            upgrades: config.upgrades.iter().map(|d| fresh(&d.id)).collect(),
            generators: config.generators.iter().map(|d| fresh(&d.id)).collect(),
            achievements: config.achievements.iter().map(|d| fresh(&d.id)).collect(),
            events: config.events.iter().map(|d| fresh(&d.id)).collect(),
            quests: config.quests.iter().map(|d| fresh(&d.id)).collect(),
        }
    }

    /// Bring a registry from a save in line with the live configuration.
    pub fn reconcile(self, config: &GameConfig) -> Self {
        Self {
            upgrades: reconcile_list(self.upgrades, config.upgrades.iter().map(|d| d.id.as_str())),
            generators: reconcile_list(
                self.generators,
                config.generators.iter().map(|d| d.id.as_str()),
            ),
            achievements: reconcile_list(
                self.achievements,
                config.achievements.iter().map(|d| d.id.as_str()),
            ),
            events: reconcile_list(self.events, config.events.iter().map(|d| d.id.as_str())),
            quests: reconcile_list(self.quests, config.quests.iter().map(|d| d.id.as_str())),
        }
    }

    pub fn upgrade(&self, id: &str) -> Option<&UpgradeState> {
        find(&self.upgrades, id)
    }

    pub fn generator(&self, id: &str) -> Option<&GeneratorState> {
        find(&self.generators, id)
    }

    pub fn achievement(&self, id: &str) -> Option<&AchievementState> {
        find(&self.achievements, id)
    }

    pub fn event(&self, id: &str) -> Option<&EventState> {
        find(&self.events, id)
    }

    pub fn quest(&self, id: &str) -> Option<&QuestState> {
        find(&self.quests, id)
    }

    pub fn claimed_achievements(&self) -> usize {
        self.achievements.iter().filter(|a| a.claimed).count()
    }
}
