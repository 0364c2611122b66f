//! Deferred transaction commands.
//!
//! Reactive subscribers cannot call into the engine while it is delivering
//! notifications, so they return [`Command`]s instead. Hosts can also queue
//! commands to run at the start of the next tick. Each command maps onto
//! exactly one public engine operation.

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Click { currency: String, amount: f64 },
    BuyUpgrade { id: String, quantity: u32 },
    BuyGenerator { id: String, quantity: u32 },
    ClaimAchievement { id: String },
    ClaimQuest { id: String },
    Prestige,
    BuyPrestigeUpgrade { id: String },
    StartEvent { id: String },
    CompleteEvent { id: String },
    CheckUnlocks,
    Save,
}

/// An executed command and whether the engine accepted it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    pub timestamp: i64,
    pub command: Command,
    pub accepted: bool,
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting for the next tick, plus an optional bounded history of
/// executed ones.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<Command>,
    history: Vec<CommandRecord>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.pending.extend(commands);
    }

    /// Take every pending command, in submission order.
    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending)
    }

    /// Record an executed command, evicting the oldest entry when full.
    pub fn record(&mut self, timestamp: i64, command: Command, accepted: bool) {
        if self.max_history == 0 {
            return;
        }
        if self.history.len() == self.max_history {
            self.history.remove(0);
        }
        self.history.push(CommandRecord {
            timestamp,
            command,
            accepted,
        });
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[CommandRecord] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
