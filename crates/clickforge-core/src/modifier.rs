//! Modifier descriptors and the resolver that folds them into numbers.
//!
//! A modifier is a typed numeric contribution keyed by a named effect
//! (`click`, `production`, `generator_<id>`, `critChance`, ...). The resolver
//! scans its sources in a fixed order:
//!
//! 1. owned upgrades (value scaled by owned count)
//! 2. claimed achievements (value counted once)
//! 3. owned prestige upgrades (value scaled by owned count)
//! 4. granted modifiers from claimed quests and completed events (once each)
//!
//! The flat [`ModifierResolver::resolve`] sum feeds the `1 + sum` multiplier
//! convention used by the click and production paths. Exponential entries
//! only take part through a compound [`ModifierStack`].

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::state::GameState;

/// Bonus applied to manual clicks.
pub const CLICK: &str = "click";
/// Bonus applied to every generator's output.
pub const PRODUCTION: &str = "production";
/// Probability of a critical click.
pub const CRIT_CHANCE: &str = "critChance";
/// Multiplier applied to a critical click.
pub const CRIT_MULTIPLIER: &str = "critMultiplier";
/// Per-tick probability of a random event starting.
pub const EVENT_CHANCE: &str = "eventChance";

/// Key of the per-generator production bonus.
pub fn generator_key(generator_id: &str) -> String {
    format!("generator_{generator_id}")
}

/// How a modifier composes with others targeting the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    #[default]
    Additive,
    Multiplicative,
    Exponential,
}

/// A modifier descriptor attached to a piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierDef {
    #[serde(default)]
    pub kind: ModifierKind,
    /// The modifier key this contributes to.
    pub target: String,
    pub value: f64,
}

impl ModifierDef {
    pub fn additive(target: &str, value: f64) -> Self {
        Self {
            kind: ModifierKind::Additive,
            target: target.to_string(),
            value,
        }
    }

    pub fn multiplicative(target: &str, value: f64) -> Self {
        Self {
            kind: ModifierKind::Multiplicative,
            target: target.to_string(),
            value,
        }
    }

    pub fn exponential(target: &str, value: f64) -> Self {
        Self {
            kind: ModifierKind::Exponential,
            target: target.to_string(),
            value,
        }
    }
}

/// A modifier granted permanently by a claimed quest or a completed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantedModifier {
    /// Where it came from, e.g. `quest:first_steps`.
    pub source: String,
    pub modifier: ModifierDef,
}

// ---------------------------------------------------------------------------
// Compound stacks
// ---------------------------------------------------------------------------

/// A list of typed contributions composed in a fixed order: add every
/// additive entry, multiply by the product of the multiplicative entries,
/// then raise to each exponential entry in listed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifierStack {
    pub additive: Vec<f64>,
    pub multiplicative: Vec<f64>,
    pub exponential: Vec<f64>,
}

impl ModifierStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ModifierKind, value: f64) {
        match kind {
            ModifierKind::Additive => self.additive.push(value),
            ModifierKind::Multiplicative => self.multiplicative.push(value),
            ModifierKind::Exponential => self.exponential.push(value),
        }
    }

    pub fn apply(&self, base: f64) -> f64 {
        let mut value = base + self.additive.iter().sum::<f64>();
        value *= self.multiplicative.iter().product::<f64>();
        self.exponential
            .iter()
            .fold(value, |acc, exponent| acc.powf(*exponent))
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Read-only view that resolves modifier keys against the current state.
///
/// Relies on the registry invariant that `state.upgrades` and
/// `state.prestige.upgrades` are in configuration order.
#[derive(Debug, Clone, Copy)]
pub struct ModifierResolver<'a> {
    config: &'a GameConfig,
    state: &'a GameState,
}

impl<'a> ModifierResolver<'a> {
    pub fn new(config: &'a GameConfig, state: &'a GameState) -> Self {
        Self { config, state }
    }

    /// Every contribution to `key` in scan order, already scaled by the
    /// owning count.
    pub fn contributions(&self, key: &str) -> Vec<(ModifierKind, f64)> {
        let mut out = Vec::new();
        let mut collect = |mods: &[ModifierDef], count: f64| {
            for m in mods.iter().filter(|m| m.target == key) {
                out.push((m.kind, m.value * count));
            }
        };

        for (def, upgrade) in self.config.upgrades.iter().zip(&self.state.entities.upgrades) {
            if upgrade.owned > 0 {
                collect(&def.modifiers, f64::from(upgrade.owned));
            }
        }
        for (def, achievement) in self
            .config
            .achievements
            .iter()
            .zip(&self.state.entities.achievements)
        {
            if achievement.claimed {
                collect(&def.modifiers, 1.0);
            }
        }
        for (def, upgrade) in self.config.prestige.iter().zip(&self.state.prestige.upgrades) {
            if upgrade.owned > 0 {
                collect(&def.modifiers, f64::from(upgrade.owned));
            }
        }
        for granted in &self.state.granted {
            collect(std::slice::from_ref(&granted.modifier), 1.0);
        }

        out
    }

    /// Flat sum of every non-exponential contribution. Zero when nothing
    /// matches.
    pub fn resolve(&self, key: &str) -> f64 {
        self.contributions(key)
            .into_iter()
            .filter(|(kind, _)| *kind != ModifierKind::Exponential)
            .map(|(_, value)| value)
            .sum()
    }

    /// `1 + resolve(key)`: neutral when no modifier targets the key.
    pub fn global_multiplier(&self, key: &str) -> f64 {
        1.0 + self.resolve(key)
    }

    /// The resolved value, or `default` when it resolves to exactly zero.
    pub fn resolve_or(&self, key: &str, default: f64) -> f64 {
        let value = self.resolve(key);
        if value == 0.0 { default } else { value }
    }

    /// Exponential contributions for `key`, in scan order.
    pub fn exponents(&self, key: &str) -> Vec<f64> {
        self.contributions(key)
            .into_iter()
            .filter(|(kind, _)| *kind == ModifierKind::Exponential)
            .map(|(_, value)| value)
            .collect()
    }

    /// The compound stack applied to a generator's base output: the global
    /// and per-generator multipliers, then any exponential entries for
    /// either key.
    pub fn production_stack(&self, generator_id: &str) -> ModifierStack {
        let per_generator = generator_key(generator_id);
        let mut stack = ModifierStack::new();
        stack.push(
            ModifierKind::Multiplicative,
            self.global_multiplier(PRODUCTION),
        );
        stack.push(
            ModifierKind::Multiplicative,
            self.global_multiplier(&per_generator),
        );
        for exponent in self
            .exponents(PRODUCTION)
            .into_iter()
            .chain(self.exponents(&per_generator))
        {
            stack.push(ModifierKind::Exponential, exponent);
        }
        stack
    }
}
