//! Unlock and completion predicates as data.
//!
//! A [`Condition`] is a small expression tree evaluated against a read-only
//! [`StateView`]. Game-specific logic that does not fit the built-in stats
//! can be registered as a named predicate and referenced with
//! [`Condition::Custom`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::EntityKind;
use crate::query::StateView;

/// Comparison operator for conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
    Ne,
}

impl ComparisonOp {
    pub fn compare(self, left: f64, right: f64) -> bool {
        match self {
            ComparisonOp::Gt => left > right,
            ComparisonOp::Lt => left < right,
            ComparisonOp::Eq => left == right,
            ComparisonOp::Gte => left >= right,
            ComparisonOp::Lte => left <= right,
            ComparisonOp::Ne => left != right,
        }
    }
}

/// A numeric quantity read from game state. Flags read as 1.0 / 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    /// Current balance of a currency.
    Resource(String),
    /// Lifetime generator output of a currency in this epoch.
    TotalGenerated(String),
    TotalClicks,
    /// Seconds of play in this epoch.
    PlayTime,
    PrestigeLevel,
    PrestigeCurrency,
    UpgradeOwned(String),
    GeneratorOwned(String),
    PrestigeUpgradeOwned(String),
    AchievementsClaimed,
    AchievementUnlocked(String),
    QuestCompleted(String),
}

/// A predicate over game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Always,
    Never,
    Compare {
        stat: Stat,
        op: ComparisonOp,
        value: f64,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
    /// A predicate registered on the engine under this name.
    Custom(String),
}

impl Condition {
    pub fn compare(stat: Stat, op: ComparisonOp, value: f64) -> Self {
        Condition::Compare { stat, op, value }
    }

    /// `stat >= value`, the common threshold shape.
    pub fn at_least(stat: Stat, value: f64) -> Self {
        Self::compare(stat, ComparisonOp::Gte, value)
    }

    pub fn custom(name: &str) -> Self {
        Condition::Custom(name.to_string())
    }

    /// Evaluate against a state view. `All` and `Any` short-circuit, so an
    /// erroring operand after a decisive one is never reached.
    pub fn evaluate(
        &self,
        view: &StateView<'_>,
        predicates: &PredicateRegistry,
    ) -> Result<bool, PredicateError> {
        match self {
            Condition::Always => Ok(true),
            Condition::Never => Ok(false),
            Condition::Compare { stat, op, value } => Ok(op.compare(view.stat(stat)?, *value)),
            Condition::All(conditions) => {
                for c in conditions {
                    if !c.evaluate(view, predicates)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any(conditions) => {
                for c in conditions {
                    if c.evaluate(view, predicates)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not(inner) => Ok(!inner.evaluate(view, predicates)?),
            Condition::Custom(name) => predicates.evaluate(name, view),
        }
    }
}

pub(crate) fn always() -> Condition {
    Condition::Always
}

pub(crate) fn never() -> Condition {
    Condition::Never
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a predicate could not be evaluated. The entity is treated as not yet
/// satisfied for the current pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredicateError {
    #[error("unknown custom predicate '{0}'")]
    UnknownPredicate(String),

    #[error("condition references unknown {kind} '{id}'")]
    UnknownEntity { kind: EntityKind, id: String },

    #[error("predicate '{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

// ---------------------------------------------------------------------------
// Custom predicates
// ---------------------------------------------------------------------------

/// A named predicate supplied by game code. Returning `Err` marks the
/// evaluation as failed.
pub type PredicateFn = Box<dyn Fn(&StateView<'_>) -> Result<bool, String>>;

/// Predicates registered by name for [`Condition::Custom`].
#[derive(Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, PredicateFn>,
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.predicates.keys().collect();
        names.sort();
        f.debug_struct("PredicateRegistry")
            .field("names", &names)
            .finish()
    }
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a predicate.
    pub fn register(&mut self, name: &str, predicate: PredicateFn) {
        self.predicates.insert(name.to_string(), predicate);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    fn evaluate(&self, name: &str, view: &StateView<'_>) -> Result<bool, PredicateError> {
        let predicate = self
            .predicates
            .get(name)
            .ok_or_else(|| PredicateError::UnknownPredicate(name.to_string()))?;
        predicate(view).map_err(|reason| PredicateError::Failed {
            name: name.to_string(),
            reason,
        })
    }
}
