//! The game engine: owns configuration and state and runs the tick pipeline.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - The immutable [`GameConfig`]
//! - The mutable [`GameState`] tree
//! - A [`Storage`] backend and a [`Clock`]
//! - A [`SimRng`] for critical clicks and random events
//! - An [`EventBus`] and a [`PredicateRegistry`] of named predicates
//! - Two [`RecurringTask`]s (tick and save) polled by [`Engine::poll`]
//!
//! # Tick Pipeline
//!
//! Each `advance(delta)` runs:
//! 1. **Pre-tick** -- execute commands queued with [`Engine::queue`]
//! 2. **Clock** -- add `delta` to play time, stamp `last_update`
//! 3. **Production** -- every owned generator credits its currency
//! 4. **Events** -- active timed events progress and may complete; a random
//!    event may start
//! 5. **Predicates** -- achievements, quests and unlocks are re-evaluated
//!    until nothing changes
//! 6. **Post-tick** -- emit `Update`, deliver notifications, run commands
//!    returned by reactive subscribers
//!
//! Transaction operations live in [`crate::transaction`], save/load in
//! [`crate::persistence`].

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock, elapsed_secs};
use crate::command::{Command, CommandQueue, CommandRecord};
use crate::condition::{Condition, PredicateError, PredicateRegistry};
use crate::config::{ConfigError, GameConfig, QuestAction, QuestGoal, QuestMeasure};
use crate::event::{
    Event, EventBus, EventKind, HandlerError, Notification, NotificationHistory,
    SubscriberPriority,
};
use crate::id::{EntityKind, SubscriptionId};
use crate::modifier::{EVENT_CHANCE, GrantedModifier, ModifierResolver};
use crate::persistence::{MemoryStorage, Storage};
use crate::query::StateView;
use crate::registry::{
    AchievementState, EventState, GeneratorState, PrestigeUpgradeState, QuestState, UpgradeState,
};
use crate::rng::SimRng;
use crate::scheduler::RecurringTask;
use crate::state::GameState;

/// Executed commands kept for inspection.
const COMMAND_HISTORY: usize = 64;

/// Which predicate families a settle pass re-evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    /// Upgrade, generator and prestige-upgrade unlocks.
    Unlocks,
    /// Achievements and quests as well.
    Full,
}

/// What a call to [`Engine::poll`] ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Polled {
    pub ticked: bool,
    pub saved: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    pub(crate) config: GameConfig,
    pub(crate) state: GameState,
    pub(crate) storage: Box<dyn Storage>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) rng: SimRng,
    pub(crate) bus: EventBus,
    pub(crate) predicates: PredicateRegistry,
    pub(crate) commands: CommandQueue,
    pub(crate) running: bool,
    tick_task: RecurringTask,
    save_task: RecurringTask,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("running", &self.running)
            .field("state", &self.state)
            .field("bus", &self.bus)
            .field("predicates", &self.predicates)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine over a validated configuration. State starts fresh;
    /// call [`Engine::boot`] or [`Engine::load`] to restore a save.
    pub fn new(
        config: GameConfig,
        storage: Box<dyn Storage>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let now = clock.now_ms();
        let seed = config.rng_seed.unwrap_or(now as u64);
        let mut engine = Self {
            state: GameState::new(&config, now),
            storage,
            clock,
            rng: SimRng::new(seed),
            bus: EventBus::new(config.event_history),
            predicates: PredicateRegistry::new(),
            commands: CommandQueue::with_max_history(COMMAND_HISTORY),
            running: false,
            tick_task: RecurringTask::new(config.tick_interval_ms),
            save_task: RecurringTask::new(config.save_interval_ms),
            config,
        };
        engine.settle(Pass::Unlocks);
        engine.flush();
        Ok(engine)
    }

    /// An engine on the system clock with in-memory storage.
    pub fn in_memory(config: GameConfig) -> Result<Self, ConfigError> {
        Self::new(config, Box::new(MemoryStorage::new()), Box::new(SystemClock))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Restore the saved game, if any, then start. Load failures are
    /// reported and the engine starts from fresh state.
    pub fn boot(&mut self) -> bool {
        // Failures are already reported through the bus.
        let _ = self.load();
        self.start()
    }

    /// Arm the tick and save tasks. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        let now = self.clock.now_ms();
        self.running = true;
        self.state.timestamps.last_update = now;
        self.tick_task.arm(now);
        self.save_task.arm(now);
        self.settle(Pass::Unlocks);
        self.emit(Event::GameStarted);
        info!(tick_ms = self.config.tick_interval_ms, "engine started");
        self.flush();
        true
    }

    /// Disarm both tasks and save once. After this, gated operations report
    /// "not running" until the next `start`.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.tick_task.disarm();
        self.save_task.disarm();
        self.running = false;
        let _ = self.apply_save();
        self.emit(Event::GameStopped);
        info!("engine stopped");
        self.flush();
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run whichever recurring tasks are due on the engine clock.
    pub fn poll(&mut self) -> Polled {
        if !self.running {
            return Polled::default();
        }
        let now = self.clock.now_ms();
        let mut polled = Polled::default();
        if self.tick_task.poll(now) {
            polled.ticked = self.tick();
        }
        if self.save_task.poll(now) {
            polled.saved = self.save().is_ok();
        }
        polled
    }

    /// Wipe all progress, including prestige, and delete the save record.
    pub fn reset(&mut self) {
        let now = self.clock.now_ms();
        self.state = GameState::new(&self.config, now);
        if let Err(err) = self.storage.remove(&self.config.save_key) {
            self.report_error(format!("failed to delete save: {err}"));
        }
        self.settle(Pass::Unlocks);
        self.emit(Event::Reset);
        info!("game reset");
        self.flush();
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Advance by the wall-clock time since the last update.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now_ms();
        let delta = elapsed_secs(self.state.timestamps.last_update, now);
        self.advance(delta)
    }

    /// Advance simulated time by `delta_seconds`. Rejects negative or
    /// non-finite deltas and does nothing while stopped.
    pub fn advance(&mut self, delta_seconds: f64) -> bool {
        if !self.running || !delta_seconds.is_finite() || delta_seconds < 0.0 {
            return false;
        }
        for command in self.commands.drain() {
            self.run_command(command);
        }
        self.step(delta_seconds);
        self.flush();
        true
    }

    fn step(&mut self, delta: f64) {
        self.state.stats.play_time += delta;
        self.state.timestamps.last_update = self.clock.now_ms();

        self.produce(delta);
        self.progress_events(delta);
        self.roll_random_event();
        self.settle(Pass::Full);

        self.emit(Event::Update { delta });
    }

    /// Credit every owned generator's output for `delta` seconds.
    pub(crate) fn produce(&mut self, delta: f64) {
        for index in 0..self.config.generators.len() {
            let amount = self.generator_output(index, delta);
            if amount > 0.0 && amount.is_finite() {
                let currency = self.config.generators[index].currency.clone();
                self.state.add_generated(&currency, amount);
            }
        }
    }

    fn generator_output(&self, index: usize, delta: f64) -> f64 {
        let def = &self.config.generators[index];
        let owned = self.state.entities.generators[index].owned;
        if owned == 0 {
            return 0.0;
        }
        let base = def.base_production * f64::from(owned) * delta * def.efficiency;
        self.resolver().production_stack(&def.id).apply(base)
    }

    fn progress_events(&mut self, delta: f64) {
        for index in 0..self.config.events.len() {
            let event = &mut self.state.entities.events[index];
            if !event.active {
                continue;
            }
            event.progress += delta;
            let progress = event.progress;
            if let Some(duration) = self.config.events[index].duration
                && progress >= duration
            {
                self.finish_event(index);
            }
        }
    }

    fn roll_random_event(&mut self) {
        let chance = self
            .resolver()
            .resolve_or(EVENT_CHANCE, self.config.event_chance);
        if !self.rng.chance(chance) {
            return;
        }
        let idle: Vec<usize> = (0..self.config.events.len())
            .filter(|&i| !self.state.entities.events[i].active)
            .collect();
        if let Some(pick) = self.rng.pick(idle.len()) {
            self.begin_event(idle[pick]);
        }
    }

    // -----------------------------------------------------------------------
    // Timed events
    // -----------------------------------------------------------------------

    pub(crate) fn begin_event(&mut self, index: usize) -> bool {
        let now = self.clock.now_ms();
        let event = &mut self.state.entities.events[index];
        if event.active {
            return false;
        }
        event.active = true;
        event.progress = 0.0;
        event.started_at = Some(now);
        let id = event.id.clone();
        debug!(%id, "event started");
        self.emit(Event::EventStarted { id });
        true
    }

    /// Grant rewards and modifiers, then deactivate.
    pub(crate) fn finish_event(&mut self, index: usize) -> bool {
        if !self.state.entities.events[index].active {
            return false;
        }
        let def = &self.config.events[index];
        self.state.grant(&def.rewards);
        let source = format!("event:{}", def.id);
        // A repeated completion replaces its earlier grant rather than stacking.
        self.state.granted.retain(|granted| granted.source != source);
        self.state
            .granted
            .extend(def.modifiers.iter().map(|modifier| GrantedModifier {
                source: source.clone(),
                modifier: modifier.clone(),
            }));

        let event = &mut self.state.entities.events[index];
        event.active = false;
        event.progress = 0.0;
        event.started_at = None;
        let id = event.id.clone();
        debug!(%id, "event completed");
        self.emit(Event::EventCompleted { id });
        true
    }

    /// Start an event by id. Fails if unknown or already active.
    pub fn start_event(&mut self, id: &str) -> bool {
        let started = self.event_index(id).is_some_and(|index| self.begin_event(index));
        self.flush();
        started
    }

    /// Complete an active event by id, granting its rewards.
    pub fn complete_event(&mut self, id: &str) -> bool {
        let completed = self
            .event_index(id)
            .is_some_and(|index| self.finish_event(index));
        self.flush();
        completed
    }

    fn event_index(&self, id: &str) -> Option<usize> {
        self.config.events.iter().position(|d| d.id == id)
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    /// Re-evaluate unlock conditions for upgrades, generators and prestige
    /// upgrades. Returns the number of entities that unlocked.
    pub fn check_unlocks(&mut self) -> usize {
        let unlocked = self.settle(Pass::Unlocks);
        self.flush();
        unlocked
    }

    /// Register a named predicate for [`Condition::Custom`].
    pub fn register_predicate<F>(&mut self, name: &str, predicate: F)
    where
        F: Fn(&StateView<'_>) -> Result<bool, String> + 'static,
    {
        self.predicates.register(name, Box::new(predicate));
    }

    pub(crate) fn evaluate(&self, condition: &Condition) -> Result<bool, PredicateError> {
        let view = StateView::new(&self.config, &self.state);
        condition.evaluate(&view, &self.predicates)
    }

    /// Run passes until a fixpoint. An entity whose predicate errors is
    /// reported once and skipped for the rest of the call.
    pub(crate) fn settle(&mut self, pass: Pass) -> usize {
        let mut failed = HashSet::new();
        let mut total = 0;
        loop {
            let mut changed = 0;
            if pass == Pass::Full {
                changed += self.achievement_pass(&mut failed);
                changed += self.quest_pass(&mut failed);
            }
            changed += self.unlock_pass(&mut failed);
            if changed == 0 {
                return total;
            }
            total += changed;
        }
    }

    fn unlock_pass(&mut self, failed: &mut HashSet<(EntityKind, usize)>) -> usize {
        let mut changed = 0;
        for i in 0..self.config.upgrades.len() {
            if !self.state.entities.upgrades[i].unlocked
                && self.holds(EntityKind::Upgrade, i, failed)
            {
                let upgrade = &mut self.state.entities.upgrades[i];
                upgrade.unlocked = true;
                let id = upgrade.id.clone();
                self.emit(Event::UpgradeUnlocked { id });
                changed += 1;
            }
        }
        for i in 0..self.config.generators.len() {
            if !self.state.entities.generators[i].unlocked
                && self.holds(EntityKind::Generator, i, failed)
            {
                let generator = &mut self.state.entities.generators[i];
                generator.unlocked = true;
                let id = generator.id.clone();
                self.emit(Event::GeneratorUnlocked { id });
                changed += 1;
            }
        }
        for i in 0..self.config.prestige.len() {
            if !self.state.prestige.upgrades[i].unlocked
                && self.holds(EntityKind::PrestigeUpgrade, i, failed)
            {
                let upgrade = &mut self.state.prestige.upgrades[i];
                upgrade.unlocked = true;
                let id = upgrade.id.clone();
                self.emit(Event::PrestigeUpgradeUnlocked { id });
                changed += 1;
            }
        }
        changed
    }

    fn achievement_pass(&mut self, failed: &mut HashSet<(EntityKind, usize)>) -> usize {
        let mut changed = 0;
        for i in 0..self.config.achievements.len() {
            if !self.state.entities.achievements[i].unlocked
                && self.holds(EntityKind::Achievement, i, failed)
            {
                let achievement = &mut self.state.entities.achievements[i];
                achievement.unlocked = true;
                let id = achievement.id.clone();
                self.emit(Event::AchievementUnlocked { id });
                changed += 1;
            }
        }
        changed
    }

    fn quest_pass(&mut self, failed: &mut HashSet<(EntityKind, usize)>) -> usize {
        let mut changed = 0;
        for i in 0..self.config.quests.len() {
            if !self.state.entities.quests[i].completed
                && self.holds(EntityKind::Quest, i, failed)
            {
                self.complete_quest(i);
                changed += 1;
            }
        }
        changed
    }

    /// Evaluate the predicate guarding entity `index` of `kind`.
    fn holds(
        &mut self,
        kind: EntityKind,
        index: usize,
        failed: &mut HashSet<(EntityKind, usize)>,
    ) -> bool {
        if failed.contains(&(kind, index)) {
            return false;
        }
        let condition = match kind {
            EntityKind::Upgrade => &self.config.upgrades[index].unlock,
            EntityKind::Generator => &self.config.generators[index].unlock,
            EntityKind::PrestigeUpgrade => &self.config.prestige[index].unlock,
            EntityKind::Achievement => &self.config.achievements[index].condition,
            EntityKind::Quest => match &self.config.quests[index].goal {
                QuestGoal::Condition(condition) => condition,
                QuestGoal::Action { .. } => return false,
            },
            EntityKind::Event => return false,
        };
        let result = self.evaluate(condition);
        match result {
            Ok(holds) => holds,
            Err(err) => {
                failed.insert((kind, index));
                let id = self.entity_id(kind, index);
                warn!(%kind, %id, error = %err, "predicate failed");
                self.report_error(format!("{kind} '{id}' predicate failed: {err}"));
                false
            }
        }
    }

    fn entity_id(&self, kind: EntityKind, index: usize) -> String {
        match kind {
            EntityKind::Upgrade => self.config.upgrades[index].id.clone(),
            EntityKind::Generator => self.config.generators[index].id.clone(),
            EntityKind::Achievement => self.config.achievements[index].id.clone(),
            EntityKind::Event => self.config.events[index].id.clone(),
            EntityKind::Quest => self.config.quests[index].id.clone(),
            EntityKind::PrestigeUpgrade => self.config.prestige[index].id.clone(),
        }
    }

    fn complete_quest(&mut self, index: usize) {
        let quest = &mut self.state.entities.quests[index];
        quest.completed = true;
        let id = quest.id.clone();
        debug!(%id, "quest completed");
        self.emit(Event::QuestCompleted { id });
    }

    /// Feed an action into every matching, unfinished action quest.
    pub(crate) fn record_action(
        &mut self,
        action: QuestAction,
        subject: &str,
        count: f64,
        amount: f64,
    ) {
        for index in 0..self.config.quests.len() {
            let QuestGoal::Action {
                action: wanted,
                subject: filter,
                measure,
                target,
            } = &self.config.quests[index].goal
            else {
                continue;
            };
            if *wanted != action || filter.as_deref().is_some_and(|s| s != subject) {
                continue;
            }
            let step = match measure {
                QuestMeasure::Count => count,
                QuestMeasure::Amount => amount,
            };
            let target = *target;

            let quest = &mut self.state.entities.quests[index];
            if quest.completed || quest.claimed {
                continue;
            }
            quest.progress += step;
            if quest.progress >= target {
                self.complete_quest(index);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    pub(crate) fn emit(&mut self, event: Event) {
        let now = self.clock.now_ms();
        self.bus.emit(event, now);
    }

    pub(crate) fn report_error(&mut self, message: String) {
        warn!(%message, "engine error");
        self.emit(Event::Error { message });
    }

    /// Deliver pending notifications, then run commands returned by reactive
    /// subscribers, for at most `max_cascade_depth` rounds.
    pub(crate) fn flush(&mut self) {
        let mut depth = 0;
        loop {
            self.bus.deliver(&self.state);
            let commands = self.bus.drain_commands();
            if commands.is_empty() {
                return;
            }
            if depth >= self.config.max_cascade_depth {
                warn!(dropped = commands.len(), depth, "command cascade too deep");
                return;
            }
            depth += 1;
            for command in commands {
                self.run_command(command);
            }
        }
    }

    /// Subscribe a passive listener at normal priority.
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: FnMut(&Notification, &GameState) -> Result<(), HandlerError> + 'static,
    {
        self.on_with_priority(kind, SubscriberPriority::Normal, listener)
    }

    pub fn on_with_priority<F>(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        listener: F,
    ) -> SubscriptionId
    where
        F: FnMut(&Notification, &GameState) -> Result<(), HandlerError> + 'static,
    {
        self.bus.on_passive(kind, priority, Box::new(listener))
    }

    /// Subscribe a handler whose returned commands run after delivery.
    pub fn on_reactive<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Notification, &GameState) -> Result<Vec<Command>, HandlerError> + 'static,
    {
        self.bus
            .on_reactive(kind, SubscriberPriority::Normal, Box::new(handler))
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.bus.off(id)
    }

    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.bus.set_debug_mode(enabled);
    }

    pub fn history(&self) -> &NotificationHistory {
        self.bus.history()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Run a command now, as if its operation had been called directly.
    pub fn execute(&mut self, command: Command) -> bool {
        let accepted = self.run_command(command);
        self.flush();
        accepted
    }

    /// Run a command at the start of the next tick.
    pub fn queue(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn command_history(&self) -> &[CommandRecord] {
        self.commands.history()
    }

    fn run_command(&mut self, command: Command) -> bool {
        let accepted = match &command {
            Command::Click { currency, amount } => self.apply_click(currency, *amount),
            Command::BuyUpgrade { id, quantity } => self.apply_buy_upgrade(id, *quantity),
            Command::BuyGenerator { id, quantity } => self.apply_buy_generator(id, *quantity),
            Command::ClaimAchievement { id } => self.apply_claim_achievement(id),
            Command::ClaimQuest { id } => self.apply_claim_quest(id),
            Command::Prestige => self.apply_prestige(),
            Command::BuyPrestigeUpgrade { id } => self.apply_buy_prestige_upgrade(id),
            Command::StartEvent { id } => {
                self.event_index(id).is_some_and(|index| self.begin_event(index))
            }
            Command::CompleteEvent { id } => {
                self.event_index(id).is_some_and(|index| self.finish_event(index))
            }
            Command::CheckUnlocks => {
                self.settle(Pass::Unlocks);
                true
            }
            Command::Save => self.apply_save().is_ok(),
        };
        let now = self.clock.now_ms();
        self.commands.record(now, command, accepted);
        accepted
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Read-only view for custom predicate checks outside the engine.
    pub fn view(&self) -> StateView<'_> {
        StateView::new(&self.config, &self.state)
    }

    pub(crate) fn resolver(&self) -> ModifierResolver<'_> {
        ModifierResolver::new(&self.config, &self.state)
    }

    pub fn resource(&self, currency: &str) -> f64 {
        self.state.resource(currency)
    }

    pub fn upgrade(&self, id: &str) -> Option<&UpgradeState> {
        self.state.entities.upgrade(id)
    }

    pub fn generator(&self, id: &str) -> Option<&GeneratorState> {
        self.state.entities.generator(id)
    }

    pub fn achievement(&self, id: &str) -> Option<&AchievementState> {
        self.state.entities.achievement(id)
    }

    pub fn quest(&self, id: &str) -> Option<&QuestState> {
        self.state.entities.quest(id)
    }

    pub fn event(&self, id: &str) -> Option<&EventState> {
        self.state.entities.event(id)
    }

    pub fn prestige_upgrade(&self, id: &str) -> Option<&PrestigeUpgradeState> {
        self.state.prestige.upgrade(id)
    }

    pub fn play_time(&self) -> f64 {
        self.state.stats.play_time
    }

    pub fn total_clicks(&self) -> u64 {
        self.state.stats.total_clicks
    }

    pub fn prestige_level(&self) -> u32 {
        self.state.prestige.level
    }

    pub fn prestige_currency(&self) -> f64 {
        self.state.prestige.currency
    }

    /// Current output per second of `currency` across all generators.
    pub fn resource_per_second(&self, currency: &str) -> f64 {
        (0..self.config.generators.len())
            .filter(|&i| self.config.generators[i].currency == currency)
            .map(|i| self.generator_output(i, 1.0))
            .sum()
    }

    pub fn resolve_modifier(&self, key: &str) -> f64 {
        self.resolver().resolve(key)
    }

    pub fn global_multiplier(&self, key: &str) -> f64 {
        self.resolver().global_multiplier(key)
    }
}
