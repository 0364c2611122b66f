use serde::{Deserialize, Serialize};

/// Identifies a subscriber registered on the event bus. Returned by
/// `Engine::on` and friends; pass it to `Engine::off` to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// The content list an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Upgrade,
    Generator,
    Achievement,
    Event,
    Quest,
    PrestigeUpgrade,
}

impl EntityKind {
    /// Lowercase label used in log fields and error messages.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Upgrade => "upgrade",
            EntityKind::Generator => "generator",
            EntityKind::Achievement => "achievement",
            EntityKind::Event => "event",
            EntityKind::Quest => "quest",
            EntityKind::PrestigeUpgrade => "prestige upgrade",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_id_ordering() {
        assert!(SubscriptionId(1) < SubscriptionId(2));
        assert_eq!(SubscriptionId(7), SubscriptionId(7));
    }

    #[test]
    fn entity_kind_labels() {
        assert_eq!(EntityKind::Upgrade.to_string(), "upgrade");
        assert_eq!(EntityKind::PrestigeUpgrade.label(), "prestige upgrade");
    }

    #[test]
    fn entity_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EntityKind::PrestigeUpgrade).unwrap();
        assert_eq!(json, "\"prestige_upgrade\"");
    }
}
