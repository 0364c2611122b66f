//! Typed notifications and the synchronous event bus.
//!
//! Operations emit [`Event`]s into the bus while they run. Nothing is
//! delivered mid-operation: the engine calls [`EventBus::deliver`] once the
//! operation has finished mutating state, so subscribers always observe a
//! consistent state tree.
//!
//! # Subscriber Types
//!
//! - **Passive listeners**: read-only, used for UI updates, audio, analytics.
//! - **Reactive handlers**: return [`Command`]s that the engine executes after
//!   delivery, which is how a subscriber safely calls back into the engine.
//!
//! A subscriber returning `Err` never reaches the caller of the operation.
//! The failure is turned into an [`Event::Error`] notification instead.

use tracing::{error, warn};

use crate::command::Command;
use crate::id::SubscriptionId;
use crate::state::GameState;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A state transition observable from outside the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // -- Lifecycle --
    GameStarted,
    GameStopped,
    Update {
        delta: f64,
    },
    Reset,

    // -- Transactions --
    Click {
        currency: String,
        amount: f64,
        is_critical: bool,
    },
    UpgradeBought {
        id: String,
        quantity: u32,
        new_level: u32,
    },
    GeneratorBought {
        id: String,
        quantity: u32,
        new_count: u32,
    },
    AchievementClaimed {
        id: String,
    },
    QuestClaimed {
        id: String,
    },
    Prestige {
        level: u32,
        earned: f64,
        currency: f64,
    },
    PrestigeUpgradeBought {
        id: String,
        new_level: u32,
    },

    // -- Predicate transitions --
    UpgradeUnlocked {
        id: String,
    },
    GeneratorUnlocked {
        id: String,
    },
    PrestigeUpgradeUnlocked {
        id: String,
    },
    AchievementUnlocked {
        id: String,
    },
    QuestCompleted {
        id: String,
    },

    // -- Timed events --
    EventStarted {
        id: String,
    },
    EventCompleted {
        id: String,
    },

    // -- Persistence --
    Save {
        timestamp: i64,
    },
    Load {
        timestamp: i64,
    },
    VersionMismatch {
        saved_version: String,
        current_version: String,
    },
    OfflineProgress {
        seconds: f64,
    },

    Error {
        message: String,
    },
}

/// Discriminant of [`Event`], used to subscribe by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    GameStarted,
    GameStopped,
    Update,
    Reset,
    Click,
    UpgradeBought,
    GeneratorBought,
    AchievementClaimed,
    QuestClaimed,
    Prestige,
    PrestigeUpgradeBought,
    UpgradeUnlocked,
    GeneratorUnlocked,
    PrestigeUpgradeUnlocked,
    AchievementUnlocked,
    QuestCompleted,
    EventStarted,
    EventCompleted,
    Save,
    Load,
    VersionMismatch,
    OfflineProgress,
    Error,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::GameStarted => EventKind::GameStarted,
            Event::GameStopped => EventKind::GameStopped,
            Event::Update { .. } => EventKind::Update,
            Event::Reset => EventKind::Reset,
            Event::Click { .. } => EventKind::Click,
            Event::UpgradeBought { .. } => EventKind::UpgradeBought,
            Event::GeneratorBought { .. } => EventKind::GeneratorBought,
            Event::AchievementClaimed { .. } => EventKind::AchievementClaimed,
            Event::QuestClaimed { .. } => EventKind::QuestClaimed,
            Event::Prestige { .. } => EventKind::Prestige,
            Event::PrestigeUpgradeBought { .. } => EventKind::PrestigeUpgradeBought,
            Event::UpgradeUnlocked { .. } => EventKind::UpgradeUnlocked,
            Event::GeneratorUnlocked { .. } => EventKind::GeneratorUnlocked,
            Event::PrestigeUpgradeUnlocked { .. } => EventKind::PrestigeUpgradeUnlocked,
            Event::AchievementUnlocked { .. } => EventKind::AchievementUnlocked,
            Event::QuestCompleted { .. } => EventKind::QuestCompleted,
            Event::EventStarted { .. } => EventKind::EventStarted,
            Event::EventCompleted { .. } => EventKind::EventCompleted,
            Event::Save { .. } => EventKind::Save,
            Event::Load { .. } => EventKind::Load,
            Event::VersionMismatch { .. } => EventKind::VersionMismatch,
            Event::OfflineProgress { .. } => EventKind::OfflineProgress,
            Event::Error { .. } => EventKind::Error,
        }
    }
}

/// An event stamped with the wall-clock time it was emitted at.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub event: Event,
    pub timestamp: i64,
}

impl Notification {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

// ---------------------------------------------------------------------------
// NotificationHistory: fixed-capacity ring buffer
// ---------------------------------------------------------------------------

/// The most recent notifications, oldest dropped first.
#[derive(Debug)]
pub struct NotificationHistory {
    slots: Vec<Option<Notification>>,
    /// Next write position.
    head: usize,
    len: usize,
    total_written: u64,
}

impl NotificationHistory {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, notification: Notification) {
        self.slots[self.head] = Some(notification);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total notifications recorded, including ones since overwritten.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> + '_ {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        (0..self.len).filter_map(move |offset| {
            self.slots[(start + offset) % self.capacity()].as_ref()
        })
    }

    pub fn last(&self) -> Option<&Notification> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.capacity() - 1) % self.capacity();
        self.slots[idx].as_ref()
    }

    /// Recorded notifications of one kind, oldest first.
    pub fn of_kind(&self, kind: EventKind) -> Vec<&Notification> {
        self.iter().filter(|n| n.kind() == kind).collect()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// A subscriber failure. Reported through an [`Event::Error`] notification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Receives notifications together with the post-operation state.
pub type PassiveListener = Box<dyn FnMut(&Notification, &GameState) -> Result<(), HandlerError>>;

/// Like a passive listener, but may ask the engine to run commands once
/// delivery finishes.
pub type ReactiveHandler =
    Box<dyn FnMut(&Notification, &GameState) -> Result<Vec<Command>, HandlerError>>;

enum Subscriber {
    Passive(PassiveListener),
    Reactive(ReactiveHandler),
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscriber::Passive(_) => write!(f, "Passive(<fn>)"),
            Subscriber::Reactive(_) => write!(f, "Reactive(<fn>)"),
        }
    }
}

/// Priority level for subscribers. Lower priorities run first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    #[default]
    Normal = 1,
    Post = 2,
}

#[derive(Debug)]
struct SubscriberEntry {
    id: SubscriptionId,
    kind: EventKind,
    priority: SubscriberPriority,
    subscriber: Subscriber,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Buffers emitted notifications, records them in the history and fans them
/// out to subscribers on delivery.
pub struct EventBus {
    pending: Vec<Notification>,
    history: NotificationHistory,
    /// Kept sorted by `(priority, id)`; ids are issued in registration order.
    subscribers: Vec<SubscriberEntry>,
    pending_commands: Vec<Command>,
    next_id: u64,
    debug_mode: bool,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending.len())
            .field("history", &self.history.len())
            .field("subscribers", &self.subscribers.len())
            .field("pending_commands", &self.pending_commands)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            history: NotificationHistory::new(history_capacity),
            subscribers: Vec::new(),
            pending_commands: Vec::new(),
            next_id: 0,
            debug_mode: false,
        }
    }

    /// Also log every error notification at `error` level.
    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.debug_mode = enabled;
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Queue an event for the next delivery.
    pub fn emit(&mut self, event: Event, timestamp: i64) {
        if self.debug_mode
            && let Event::Error { message } = &event
        {
            error!(%message, "engine error");
        }
        let notification = Notification { event, timestamp };
        self.history.push(notification.clone());
        self.pending.push(notification);
    }

    pub fn on_passive(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        listener: PassiveListener,
    ) -> SubscriptionId {
        self.subscribe(kind, priority, Subscriber::Passive(listener))
    }

    pub fn on_reactive(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        handler: ReactiveHandler,
    ) -> SubscriptionId {
        self.subscribe(kind, priority, Subscriber::Reactive(handler))
    }

    fn subscribe(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        subscriber: Subscriber,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(SubscriberEntry {
            id,
            kind,
            priority,
            subscriber,
        });
        self.subscribers
            .sort_by_key(|entry| (entry.priority, entry.id.0));
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|entry| entry.id != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver every pending notification, oldest first, to the subscribers
    /// of its kind in `(priority, registration)` order.
    ///
    /// A failing subscriber produces an `Error` notification that is
    /// delivered in the same call. Failures while handling an `Error`
    /// notification are only logged, so delivery always terminates.
    pub fn deliver(&mut self, state: &GameState) {
        let mut cursor = 0;
        while cursor < self.pending.len() {
            let notification = self.pending[cursor].clone();
            cursor += 1;
            let kind = notification.kind();

            let mut failures = Vec::new();
            for entry in self.subscribers.iter_mut().filter(|e| e.kind == kind) {
                let result = match &mut entry.subscriber {
                    Subscriber::Passive(listener) => listener(&notification, state),
                    Subscriber::Reactive(handler) => {
                        handler(&notification, state).map(|commands| {
                            self.pending_commands.extend(commands);
                        })
                    }
                };
                if let Err(err) = result {
                    warn!(?kind, subscription = entry.id.0, error = %err, "subscriber failed");
                    failures.push(err);
                }
            }

            if kind != EventKind::Error {
                for err in failures {
                    self.emit(
                        Event::Error {
                            message: format!("{kind:?} handler failed: {err}"),
                        },
                        notification.timestamp,
                    );
                }
            }
        }
        self.pending.clear();
    }

    /// Commands collected from reactive handlers since the last drain.
    pub fn drain_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending_commands)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn history(&self) -> &NotificationHistory {
        &self.history
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::test_utils::*;

    fn state() -> GameState {
        GameState::new(&sample_config(), 0)
    }

    fn click_event() -> Event {
        Event::Click {
            currency: "points".into(),
            amount: 1.0,
            is_critical: false,
        }
    }

    // -----------------------------------------------------------------------
    // NotificationHistory
    // -----------------------------------------------------------------------

    #[test]
    fn history_wraps_and_keeps_newest() {
        let mut history = NotificationHistory::new(3);
        for ts in 0..5 {
            history.push(Notification {
                event: Event::Update { delta: 1.0 },
                timestamp: ts,
            });
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.total_written(), 5);
        assert_eq!(history.dropped_count(), 2);
        let stamps: Vec<i64> = history.iter().map(|n| n.timestamp).collect();
        assert_eq!(stamps, vec![2, 3, 4]);
        assert_eq!(history.last().map(|n| n.timestamp), Some(4));
    }

    #[test]
    fn history_zero_capacity_clamped() {
        let history = NotificationHistory::new(0);
        assert_eq!(history.capacity(), 1);
        assert!(history.is_empty());
        assert!(history.last().is_none());
    }

    #[test]
    fn history_clear() {
        let mut history = NotificationHistory::new(2);
        history.push(Notification {
            event: Event::Reset,
            timestamp: 1,
        });
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.iter().count(), 0);
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    #[test]
    fn nothing_delivered_until_deliver() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(0));
        let s = seen.clone();
        bus.on_passive(
            EventKind::Click,
            SubscriberPriority::Normal,
            Box::new(move |_, _| {
                *s.borrow_mut() += 1;
                Ok(())
            }),
        );
        bus.emit(click_event(), 10);
        assert_eq!(*seen.borrow(), 0);
        assert_eq!(bus.pending_count(), 1);

        bus.deliver(&state());
        assert_eq!(*seen.borrow(), 1);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn only_matching_kind_is_delivered() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        bus.on_passive(
            EventKind::Reset,
            SubscriberPriority::Normal,
            Box::new(move |n, _| {
                s.borrow_mut().push(n.kind());
                Ok(())
            }),
        );
        bus.emit(click_event(), 0);
        bus.emit(Event::Reset, 0);
        bus.deliver(&state());
        assert_eq!(*seen.borrow(), vec![EventKind::Reset]);
    }

    #[test]
    fn priority_then_registration_order() {
        let mut bus = EventBus::new(16);
        let order = Rc::new(RefCell::new(Vec::new()));
        for (label, priority) in [
            ("post", SubscriberPriority::Post),
            ("normal_a", SubscriberPriority::Normal),
            ("pre", SubscriberPriority::Pre),
            ("normal_b", SubscriberPriority::Normal),
        ] {
            let o = order.clone();
            bus.on_passive(
                EventKind::Click,
                priority,
                Box::new(move |_, _| {
                    o.borrow_mut().push(label);
                    Ok(())
                }),
            );
        }
        bus.emit(click_event(), 0);
        bus.deliver(&state());
        assert_eq!(*order.borrow(), vec!["pre", "normal_a", "normal_b", "post"]);
    }

    #[test]
    fn off_removes_subscriber() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(0));
        let s = seen.clone();
        let id = bus.on_passive(
            EventKind::Click,
            SubscriberPriority::Normal,
            Box::new(move |_, _| {
                *s.borrow_mut() += 1;
                Ok(())
            }),
        );
        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit(click_event(), 0);
        bus.deliver(&state());
        assert_eq!(*seen.borrow(), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn handler_error_becomes_error_notification() {
        let mut bus = EventBus::new(16);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = errors.clone();
        bus.on_passive(
            EventKind::Click,
            SubscriberPriority::Normal,
            Box::new(|_, _| Err(HandlerError::new("boom"))),
        );
        bus.on_passive(
            EventKind::Error,
            SubscriberPriority::Normal,
            Box::new(move |n, _| {
                if let Event::Error { message } = &n.event {
                    e.borrow_mut().push(message.clone());
                }
                Ok(())
            }),
        );
        bus.emit(click_event(), 7);
        bus.deliver(&state());

        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].contains("boom"));
        let recorded = bus.history().of_kind(EventKind::Error);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].timestamp, 7);
    }

    #[test]
    fn failing_error_handler_does_not_loop() {
        let mut bus = EventBus::new(16);
        bus.on_passive(
            EventKind::Error,
            SubscriberPriority::Normal,
            Box::new(|_, _| Err(HandlerError::new("again"))),
        );
        bus.emit(
            Event::Error {
                message: "first".into(),
            },
            0,
        );
        bus.deliver(&state());
        assert_eq!(bus.history().of_kind(EventKind::Error).len(), 1);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn reactive_commands_are_collected() {
        let mut bus = EventBus::new(16);
        bus.on_reactive(
            EventKind::Click,
            SubscriberPriority::Normal,
            Box::new(|_, _| {
                Ok(vec![Command::BuyGenerator {
                    id: "cursor".into(),
                    quantity: 1,
                }])
            }),
        );
        bus.emit(click_event(), 0);
        bus.emit(click_event(), 0);
        bus.deliver(&state());
        let commands = bus.drain_commands();
        assert_eq!(commands.len(), 2);
        assert!(bus.drain_commands().is_empty());
    }

    #[test]
    fn subscribers_see_delivered_state() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        bus.on_passive(
            EventKind::Click,
            SubscriberPriority::Normal,
            Box::new(move |_, state| {
                *s.borrow_mut() = Some(state.resource("points"));
                Ok(())
            }),
        );
        let mut state = state();
        *state.ensure_resource("points") = 42.0;
        bus.emit(click_event(), 0);
        bus.deliver(&state);
        assert_eq!(*seen.borrow(), Some(42.0));
    }
}
