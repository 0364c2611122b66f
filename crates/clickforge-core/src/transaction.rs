//! Transaction operations: check-then-apply mutations driven by the player.
//!
//! Every operation validates everything it needs before touching state, so
//! a rejection (returned as `false`) leaves the state tree exactly as it was.
//! Purchases check the full batch price in every currency before deducting
//! any of it.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::QuestAction;
use crate::cost::{batch_cost, batch_cost_within, clamp_quantity};
use crate::engine::{Engine, Pass};
use crate::event::Event;
use crate::modifier::{CLICK, CRIT_CHANCE, CRIT_MULTIPLIER, GrantedModifier};
use crate::registry;

/// Prestige currency is `sqrt(total / PRESTIGE_DIVISOR)` per currency.
const PRESTIGE_DIVISOR: f64 = 1e6;
/// Bonus per claimed achievement applied to earned prestige currency.
const ACHIEVEMENT_PRESTIGE_BONUS: f64 = 0.05;

impl Engine {
    // -----------------------------------------------------------------------
    // Clicking
    // -----------------------------------------------------------------------

    /// Manually earn `amount` of `currency`, scaled by the click multiplier
    /// and possibly critical. Rejects negative or non-finite amounts.
    pub fn click(&mut self, currency: &str, amount: f64) -> bool {
        let accepted = self.apply_click(currency, amount);
        self.flush();
        accepted
    }

    pub(crate) fn apply_click(&mut self, currency: &str, amount: f64) -> bool {
        if !self.running {
            debug!(%currency, "click ignored: engine not running");
            return false;
        }
        if !amount.is_finite() || amount < 0.0 {
            return false;
        }

        let resolver = self.resolver();
        let base = amount * resolver.global_multiplier(CLICK);
        let crit_chance = resolver.resolve_or(CRIT_CHANCE, self.config.crit_chance);
        let crit_multiplier = resolver.resolve_or(CRIT_MULTIPLIER, self.config.crit_multiplier);

        let is_critical = self.rng.chance(crit_chance);
        let gained = if is_critical {
            base * crit_multiplier
        } else {
            base
        };
        let gained = if gained.is_finite() { gained.max(0.0) } else { 0.0 };

        *self.state.ensure_resource(currency) += gained;
        self.state.stats.total_clicks += 1;
        self.record_action(QuestAction::Click, currency, 1.0, gained);
        self.settle(Pass::Unlocks);
        self.emit(Event::Click {
            currency: currency.to_string(),
            amount: gained,
            is_critical,
        });
        true
    }

    // -----------------------------------------------------------------------
    // Purchases
    // -----------------------------------------------------------------------

    /// Price of the next `quantity` levels of an upgrade, per currency, after
    /// clamping to its max level. `None` if unknown or nothing can be bought.
    pub fn upgrade_cost(&self, id: &str, quantity: u32) -> Option<BTreeMap<String, f64>> {
        let index = self.config.upgrades.iter().position(|d| d.id == id)?;
        let def = &self.config.upgrades[index];
        let owned = self.state.entities.upgrades[index].owned;
        let quantity = clamp_quantity(owned, quantity, def.max_level)?;
        Some(
            def.cost
                .iter()
                .map(|(currency, base)| {
                    let total = batch_cost(*base, owned, quantity, self.config.growth_rate);
                    (currency.clone(), total)
                })
                .collect(),
        )
    }

    /// Price of the next `quantity` generators in their payment currency.
    pub fn generator_cost(&self, id: &str, quantity: u32) -> Option<f64> {
        let index = self.config.generators.iter().position(|d| d.id == id)?;
        let quantity = clamp_quantity(self.state.entities.generators[index].owned, quantity, None)?;
        Some(batch_cost(
            self.config.generators[index].cost,
            self.state.entities.generators[index].owned,
            quantity,
            self.config.growth_rate,
        ))
    }

    /// Buy up to `quantity` levels of an upgrade. The quantity is clamped to
    /// the max level; the purchase fails if nothing remains to buy, if the
    /// upgrade is locked (and not always visible), or if any currency is
    /// short for the whole batch.
    pub fn buy_upgrade(&mut self, id: &str, quantity: u32) -> bool {
        let bought = self.apply_buy_upgrade(id, quantity);
        self.flush();
        bought
    }

    pub(crate) fn apply_buy_upgrade(&mut self, id: &str, quantity: u32) -> bool {
        if !self.running {
            return false;
        }
        let Some(index) = registry::position(&self.state.entities.upgrades, id) else {
            return false;
        };
        let def = &self.config.upgrades[index];
        if !self.state.entities.upgrades[index].unlocked && !def.always_visible {
            return false;
        }
        let owned = self.state.entities.upgrades[index].owned;
        let Some(quantity) = clamp_quantity(owned, quantity, def.max_level) else {
            return false;
        };
        let Some(new_level) = owned.checked_add(quantity) else {
            return false;
        };

        let mut prices = Vec::with_capacity(def.cost.len());
        for (currency, base) in &def.cost {
            let balance = self.state.resource(currency);
            match batch_cost_within(*base, owned, quantity, self.config.growth_rate, balance) {
                Some(price) => prices.push((currency.clone(), price)),
                None => return false,
            }
        }
        for (currency, price) in &prices {
            *self.state.ensure_resource(currency) -= price;
        }

        let upgrade = &mut self.state.entities.upgrades[index];
        upgrade.owned = new_level;
        upgrade.unlocked = true;
        debug!(%id, quantity, new_level, "upgrade bought");

        self.record_action(QuestAction::BuyUpgrade, id, f64::from(quantity), f64::from(quantity));
        self.settle(Pass::Unlocks);
        self.emit(Event::UpgradeBought {
            id: id.to_string(),
            quantity,
            new_level,
        });
        true
    }

    /// Buy `quantity` generators, paid in the generator's payment currency.
    pub fn buy_generator(&mut self, id: &str, quantity: u32) -> bool {
        let bought = self.apply_buy_generator(id, quantity);
        self.flush();
        bought
    }

    pub(crate) fn apply_buy_generator(&mut self, id: &str, quantity: u32) -> bool {
        if !self.running || quantity == 0 {
            return false;
        }
        let Some(index) = registry::position(&self.state.entities.generators, id) else {
            return false;
        };
        if !self.state.entities.generators[index].unlocked {
            return false;
        }
        let def = &self.config.generators[index];
        let owned = self.state.entities.generators[index].owned;
        let Some(new_count) = owned.checked_add(quantity) else {
            return false;
        };
        let currency = def.payment_currency().to_string();
        let balance = self.state.resource(&currency);
        let Some(price) =
            batch_cost_within(def.cost, owned, quantity, self.config.growth_rate, balance)
        else {
            return false;
        };
        *self.state.ensure_resource(&currency) -= price;

        self.state.entities.generators[index].owned = new_count;
        debug!(%id, quantity, new_count, %price, "generator bought");

        self.record_action(QuestAction::BuyGenerator, id, f64::from(quantity), f64::from(quantity));
        self.settle(Pass::Unlocks);
        self.emit(Event::GeneratorBought {
            id: id.to_string(),
            quantity,
            new_count,
        });
        true
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    /// Claim an unlocked achievement's reward. Its modifiers apply from now
    /// on. Fails if locked or already claimed.
    pub fn claim_achievement(&mut self, id: &str) -> bool {
        let claimed = self.apply_claim_achievement(id);
        self.flush();
        claimed
    }

    pub(crate) fn apply_claim_achievement(&mut self, id: &str) -> bool {
        let Some(index) = registry::position(&self.state.entities.achievements, id) else {
            return false;
        };
        let achievement = &self.state.entities.achievements[index];
        if !achievement.unlocked || achievement.claimed {
            return false;
        }
        self.state.grant(&self.config.achievements[index].reward);
        self.state.entities.achievements[index].claimed = true;
        debug!(%id, "achievement claimed");
        self.settle(Pass::Unlocks);
        self.emit(Event::AchievementClaimed { id: id.to_string() });
        true
    }

    /// Claim a completed quest's reward and grant its modifiers. Fails if
    /// incomplete or already claimed.
    pub fn claim_quest(&mut self, id: &str) -> bool {
        let claimed = self.apply_claim_quest(id);
        self.flush();
        claimed
    }

    pub(crate) fn apply_claim_quest(&mut self, id: &str) -> bool {
        let Some(index) = registry::position(&self.state.entities.quests, id) else {
            return false;
        };
        let quest = &self.state.entities.quests[index];
        if !quest.completed || quest.claimed {
            return false;
        }
        let def = &self.config.quests[index];
        self.state.grant(&def.reward);
        let source = format!("quest:{}", def.id);
        self.state
            .granted
            .extend(def.modifiers.iter().map(|modifier| GrantedModifier {
                source: source.clone(),
                modifier: modifier.clone(),
            }));
        self.state.entities.quests[index].claimed = true;
        debug!(%id, "quest claimed");
        self.settle(Pass::Unlocks);
        self.emit(Event::QuestClaimed { id: id.to_string() });
        true
    }

    // -----------------------------------------------------------------------
    // Prestige
    // -----------------------------------------------------------------------

    /// Whether any prestige tier's unlock condition currently holds.
    /// Predicates that fail to evaluate count as not satisfied.
    pub fn can_prestige(&self) -> bool {
        let view = self.view();
        self.config
            .prestige
            .iter()
            .any(|tier| tier.unlock.evaluate(&view, &self.predicates) == Ok(true))
    }

    /// Like [`Engine::can_prestige`], but reports tiers whose predicate fails.
    fn prestige_ready(&mut self) -> bool {
        let mut failures = Vec::new();
        let mut ready = false;
        for tier in &self.config.prestige {
            match self.evaluate(&tier.unlock) {
                Ok(true) => {
                    ready = true;
                    break;
                }
                Ok(false) => {}
                Err(err) => failures.push(format!("prestige '{}' predicate failed: {err}", tier.id)),
            }
        }
        for message in failures {
            self.report_error(message);
        }
        ready
    }

    /// Prestige currency a prestige would award right now.
    pub fn pending_prestige_currency(&self) -> f64 {
        let from_production: f64 = self
            .state
            .stats
            .total_generated
            .values()
            .map(|total| (total.max(0.0) / PRESTIGE_DIVISOR).sqrt())
            .sum();
        let claimed = self.state.entities.claimed_achievements() as f64;
        from_production * (1.0 + ACHIEVEMENT_PRESTIGE_BONUS * claimed)
    }

    /// Start a new epoch: convert lifetime production into prestige currency,
    /// rebuild everything but the prestige block, and save immediately.
    pub fn prestige(&mut self) -> bool {
        let done = self.apply_prestige();
        self.flush();
        done
    }

    pub(crate) fn apply_prestige(&mut self) -> bool {
        if !self.prestige_ready() {
            return false;
        }
        let earned = self.pending_prestige_currency();
        let now = self.clock.now_ms();

        let mut next = self.state.next_epoch(&self.config, now);
        next.prestige.level += 1;
        next.prestige.currency += earned;
        self.state = next;

        let level = self.state.prestige.level;
        let currency = self.state.prestige.currency;
        info!(level, earned, currency, "prestiged");

        self.settle(Pass::Unlocks);
        self.emit(Event::Prestige {
            level,
            earned,
            currency,
        });
        // Failures are reported through the bus.
        let _ = self.apply_save();
        true
    }

    /// Buy one level of an unlocked prestige upgrade with prestige currency.
    pub fn buy_prestige_upgrade(&mut self, id: &str) -> bool {
        let bought = self.apply_buy_prestige_upgrade(id);
        self.flush();
        bought
    }

    pub(crate) fn apply_buy_prestige_upgrade(&mut self, id: &str) -> bool {
        if !self.running {
            return false;
        }
        let Some(index) = registry::position(&self.state.prestige.upgrades, id) else {
            return false;
        };
        if !self.state.prestige.upgrades[index].unlocked {
            return false;
        }
        let cost = self.config.prestige[index].cost;
        if self.state.prestige.currency < cost {
            return false;
        }
        let Some(new_level) = self.state.prestige.upgrades[index].owned.checked_add(1) else {
            return false;
        };
        self.state.prestige.currency -= cost;
        self.state.prestige.upgrades[index].owned = new_level;
        debug!(%id, new_level, "prestige upgrade bought");

        self.settle(Pass::Unlocks);
        self.emit(Event::PrestigeUpgradeBought {
            id: id.to_string(),
            new_level,
        });
        true
    }
}

/// Every listed price is covered by the current balance. Reads without
/// creating missing currencies.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Stat};
    use crate::event::EventKind;
    use crate::test_utils::*;

    fn funded(points: f64) -> crate::config::GameConfig {
        let mut config = sample_config();
        config.resources.insert("points".into(), points);
        config
    }

    // -----------------------------------------------------------------------
    // Clicks
    // -----------------------------------------------------------------------

    #[test]
    fn click_requires_running() {
        let (mut engine, _, _) = test_engine(sample_config());
        assert!(!engine.click("points", 1.0));
        assert_eq!(engine.total_clicks(), 0);
        assert_eq!(engine.resource("points"), 0.0);
    }

    #[test]
    fn click_rejects_bad_amounts() {
        let (mut engine, _, _) = running_engine(sample_config());
        assert!(!engine.click("points", -1.0));
        assert!(!engine.click("points", f64::INFINITY));
        assert_eq!(engine.total_clicks(), 0);
    }

    #[test]
    fn click_applies_multiplier() {
        let (mut engine, _, _) = running_engine(sample_config());
        engine.state.entities.upgrades[0].owned = 2; // click +1.0 each
        assert!(engine.click("points", 2.0));
        assert_eq!(engine.resource("points"), 6.0);
        assert_eq!(engine.total_clicks(), 1);
    }

    #[test]
    fn click_creates_unknown_currency() {
        let (mut engine, _, _) = running_engine(sample_config());
        assert!(engine.click("gems", 1.0));
        assert_eq!(engine.resource("gems"), 1.0);
    }

    #[test]
    fn certain_critical_uses_multiplier() {
        let mut config = sample_config();
        config.crit_chance = 1.0;
        config.crit_multiplier = 3.0;
        let (mut engine, _, _) = running_engine(config);
        engine.click("points", 2.0);
        assert_eq!(engine.resource("points"), 6.0);
        let clicks = engine.history().of_kind(EventKind::Click);
        assert_eq!(
            clicks[0].event,
            Event::Click {
                currency: "points".into(),
                amount: 6.0,
                is_critical: true
            }
        );
    }

    #[test]
    fn click_progresses_action_quest() {
        let (mut engine, _, _) = running_engine(sample_config());
        for _ in 0..9 {
            engine.click("points", 1.0);
        }
        assert!(!engine.quest("clicker").unwrap().completed);
        assert_eq!(engine.quest("clicker").unwrap().progress, 9.0);
        engine.click("points", 1.0);
        assert!(engine.quest("clicker").unwrap().completed);
    }

    // -----------------------------------------------------------------------
    // Generators
    // -----------------------------------------------------------------------

    #[test]
    fn single_generator_scenario() {
        let (mut engine, clock, _) = running_engine(single_generator_config());
        assert!(engine.buy_generator("miner", 1));
        assert_eq!(engine.resource("points"), 0.0);
        clock.advance_secs(5.0);
        engine.tick();
        assert!((engine.resource("points") - 5.0).abs() < 1e-9);
    }

    #[test]
    fn generator_rejections_leave_state_untouched() {
        let (mut engine, _, _) = running_engine(funded(5.0));
        let before = engine.state().clone();
        assert!(!engine.buy_generator("cursor", 1)); // too poor
        assert!(!engine.buy_generator("cursor", 0));
        assert!(!engine.buy_generator("ghost", 1));
        assert!(!engine.buy_generator("farm", 1)); // locked
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn generator_batch_matches_sequential() {
        let (mut batch, _, _) = running_engine(funded(1_000.0));
        let (mut single, _, _) = running_engine(funded(1_000.0));
        assert_eq!(batch.generator_cost("cursor", 5), Some(10.0 + 11.0 + 13.0 + 15.0 + 17.0));
        assert!(batch.buy_generator("cursor", 5));
        for _ in 0..5 {
            assert!(single.buy_generator("cursor", 1));
        }
        assert_eq!(batch.resource("points"), single.resource("points"));
        assert_eq!(batch.resource("points"), 1_000.0 - 66.0);
    }

    #[test]
    fn generator_paid_in_other_currency() {
        let mut config = sample_config();
        config.generators[0].cost_currency = Some("gold".into());
        config.resources.insert("gold".into(), 10.0);
        let (mut engine, _, _) = running_engine(config);
        assert!(engine.buy_generator("cursor", 1));
        assert_eq!(engine.resource("gold"), 0.0);
        assert_eq!(engine.resource("points"), 0.0);
    }

    #[test]
    fn buying_after_stop_is_rejected() {
        let (mut engine, _, _) = running_engine(funded(100.0));
        engine.stop();
        assert!(!engine.buy_generator("cursor", 1));
        assert!(!engine.buy_upgrade("better_clicks", 1));
        assert_eq!(engine.resource("points"), 100.0);
    }

    // -----------------------------------------------------------------------
    // Upgrades
    // -----------------------------------------------------------------------

    #[test]
    fn upgrade_batch_clamps_to_max_level() {
        let (mut engine, _, _) = running_engine(funded(10_000.0));
        assert!(engine.buy_upgrade("better_clicks", 3));
        assert!(engine.buy_upgrade("better_clicks", 10)); // clamped to 2
        assert_eq!(engine.upgrade("better_clicks").unwrap().owned, 5);
        assert!(!engine.buy_upgrade("better_clicks", 1));
        assert_eq!(engine.upgrade_cost("better_clicks", 1), None);
    }

    #[test]
    fn upgrade_requires_every_currency() {
        let mut config = funded(1_000.0);
        config.upgrades[0].cost.insert("gold".into(), 5.0);
        config.resources.insert("gold".into(), 4.0);
        let (mut engine, _, _) = running_engine(config);
        assert!(!engine.buy_upgrade("better_clicks", 1));
        assert_eq!(engine.resource("points"), 1_000.0);
        assert_eq!(engine.resource("gold"), 4.0);
    }

    #[test]
    fn upgrade_deducts_each_currency() {
        let mut config = funded(100.0);
        config.upgrades[0].cost.insert("gold".into(), 5.0);
        config.resources.insert("gold".into(), 20.0);
        let (mut engine, _, _) = running_engine(config);
        assert!(engine.buy_upgrade("better_clicks", 2));
        assert_eq!(engine.resource("points"), 100.0 - 21.0);
        // 5 + floor(5.75)
        assert_eq!(engine.resource("gold"), 20.0 - 10.0);
        let bought = engine.history().of_kind(EventKind::UpgradeBought);
        assert_eq!(
            bought[0].event,
            Event::UpgradeBought {
                id: "better_clicks".into(),
                quantity: 2,
                new_level: 2
            }
        );
    }

    #[test]
    fn locked_upgrade_needs_always_visible() {
        let (mut engine, _, _) = running_engine(funded(1_000.0));
        assert!(!engine.upgrade("efficient_cursors").unwrap().unlocked);
        assert!(!engine.buy_upgrade("efficient_cursors", 1));

        let mut config = funded(1_000.0);
        config.upgrades[1].always_visible = true;
        let (mut engine, _, _) = running_engine(config);
        assert!(engine.buy_upgrade("efficient_cursors", 1));
        assert!(engine.upgrade("efficient_cursors").unwrap().unlocked);
    }

    #[test]
    fn purchase_triggers_unlock_check() {
        let (mut engine, _, _) = running_engine(funded(10.0));
        engine.buy_generator("cursor", 1);
        assert!(engine.upgrade("efficient_cursors").unwrap().unlocked);
        let kinds: Vec<EventKind> = engine
            .history()
            .iter()
            .filter(|n| match &n.event {
                Event::UpgradeUnlocked { id } => id == "efficient_cursors",
                Event::GeneratorBought { .. } => true,
                _ => false,
            })
            .map(|n| n.kind())
            .collect();
        assert_eq!(kinds, vec![EventKind::UpgradeUnlocked, EventKind::GeneratorBought]);
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    #[test]
    fn achievement_claim_flow() {
        let (mut engine, _, _) = running_engine(sample_config());
        assert!(!engine.claim_achievement("first_clicks"));
        for _ in 0..5 {
            engine.click("points", 1.0);
        }
        engine.advance(0.1);
        assert!(engine.claim_achievement("first_clicks"));
        assert!(!engine.claim_achievement("first_clicks"));
        assert_eq!(engine.resource("points"), 10.0);
        assert!((engine.global_multiplier("production") - 1.1).abs() < 1e-12);
    }

    #[test]
    fn quest_claim_grants_modifiers_once() {
        let (mut engine, _, _) = running_engine(sample_config());
        for _ in 0..10 {
            engine.click("points", 1.0);
        }
        assert!(engine.claim_quest("clicker"));
        assert!(!engine.claim_quest("clicker"));
        assert_eq!(engine.resource("points"), 35.0);
        assert_eq!(engine.state().granted.len(), 1);
        assert_eq!(engine.state().granted[0].source, "quest:clicker");
        assert!(!engine.claim_quest("builder"));
        assert!(!engine.claim_quest("ghost"));
    }

    // -----------------------------------------------------------------------
    // Prestige
    // -----------------------------------------------------------------------

    #[test]
    fn prestige_requires_unlocked_tier() {
        let (mut engine, _, _) = running_engine(sample_config());
        assert!(!engine.can_prestige());
        assert!(!engine.prestige());
        assert_eq!(engine.prestige_level(), 0);
    }

    #[test]
    fn prestige_converts_production() {
        let (mut engine, _, storage) = running_engine(sample_config());
        engine.state.add_generated("points", 4e6);
        engine.state.entities.generators[0].owned = 3;
        engine.state.entities.achievements[0].unlocked = true;
        engine.state.entities.achievements[0].claimed = true;
        assert!(engine.can_prestige());
        // sqrt(4) * (1 + 0.05)
        assert!((engine.pending_prestige_currency() - 2.1).abs() < 1e-12);

        assert!(engine.prestige());
        assert_eq!(engine.prestige_level(), 1);
        assert!((engine.prestige_currency() - 2.1).abs() < 1e-12);
        assert_eq!(engine.generator("cursor").unwrap().owned, 0);
        assert_eq!(engine.resource("points"), 0.0);
        assert!(!engine.achievement("first_clicks").unwrap().claimed);
        assert!(storage.contains("ClickRegenSave"));
        assert_eq!(engine.history().of_kind(EventKind::Prestige).len(), 1);
    }

    #[test]
    fn prestige_currency_accumulates_and_buys_upgrades() {
        let (mut engine, _, _) = running_engine(sample_config());
        engine.state.prestige.currency = 0.5;
        engine.state.add_generated("points", 1e6);
        engine.settle(Pass::Unlocks);
        assert!(engine.prestige_upgrade("ascend").unwrap().unlocked);
        assert!(engine.prestige());
        assert!((engine.prestige_currency() - 1.5).abs() < 1e-12);

        // Tier stays unlocked across the epoch.
        assert!(engine.buy_prestige_upgrade("ascend"));
        assert_eq!(engine.prestige_upgrade("ascend").unwrap().owned, 1);
        assert!((engine.prestige_currency() - 0.5).abs() < 1e-12);
        assert!(!engine.buy_prestige_upgrade("ascend"));
        assert!((engine.global_multiplier("production") - 1.5).abs() < 1e-12);
    }

    #[test]
    fn locked_prestige_upgrade_rejected() {
        let (mut engine, _, _) = running_engine(sample_config());
        engine.state.prestige.currency = 100.0;
        assert!(!engine.buy_prestige_upgrade("ascend"));
        assert!(!engine.buy_prestige_upgrade("ghost"));
        assert_eq!(engine.prestige_currency(), 100.0);
    }

    #[test]
    fn erroring_prestige_tier_cannot_prestige() {
        let mut config = sample_config();
        config.prestige[0].unlock = Condition::All(vec![
            Condition::at_least(Stat::TotalClicks, 0.0),
            Condition::custom("missing"),
        ]);
        let (mut engine, _, _) = running_engine(config);
        assert!(!engine.can_prestige());
        let errors = engine.history().of_kind(EventKind::Error).len();
        assert!(!engine.prestige());

        let reported = engine.history().of_kind(EventKind::Error);
        assert_eq!(reported.len(), errors + 1);
        match &reported[errors].event {
            Event::Error { message } => assert!(message.contains("prestige 'ascend'"), "{message}"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Counter limits
    // -----------------------------------------------------------------------

    fn free_config() -> crate::config::GameConfig {
        let mut config = sample_config();
        config.growth_rate = 1.0;
        config.generators[0].cost = 0.0;
        config.upgrades[0].cost.insert("points".into(), 0.0);
        config.upgrades[0].max_level = None;
        config
    }

    #[test]
    fn generator_count_cannot_overflow() {
        let (mut engine, _, _) = running_engine(free_config());
        engine.state.entities.generators[0].owned = u32::MAX - 1;
        let before = engine.state().clone();
        assert!(!engine.buy_generator("cursor", 2));
        assert_eq!(engine.state(), &before);

        assert!(engine.buy_generator("cursor", 1));
        assert_eq!(engine.generator("cursor").unwrap().owned, u32::MAX);
        assert!(!engine.buy_generator("cursor", 1));
    }

    #[test]
    fn upgrade_level_cannot_overflow() {
        let (mut engine, _, _) = running_engine(free_config());
        engine.state.entities.upgrades[0].owned = u32::MAX;
        let before = engine.state().clone();
        assert!(!engine.buy_upgrade("better_clicks", 1));
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn unaffordable_huge_batch_is_rejected() {
        let (mut engine, _, _) = running_engine(funded(100.0));
        assert!(!engine.buy_generator("cursor", u32::MAX));
        assert_eq!(engine.resource("points"), 100.0);
        assert_eq!(engine.generator("cursor").unwrap().owned, 0);
    }

    // -----------------------------------------------------------------------
    // Rewards
    // -----------------------------------------------------------------------

    #[test]
    fn negative_reward_config_is_refused() {
        let mut config = sample_config();
        config.achievements[0].reward.insert("points".into(), -50.0);
        assert!(crate::engine::Engine::in_memory(config).is_err());
    }
}
