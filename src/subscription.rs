use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-owning handle to the subscription a rule belongs to.
///
/// Identifies the parent by topic and subscription name only; holding one
/// never keeps a subscription alive and says nothing about whether it exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionRef {
    pub topic: String,
    pub name: String,
}

impl SubscriptionRef {
    pub fn new(topic: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            name: name.into(),
        }
    }

    /// Resource path relative to the namespace: `{topic}/subscriptions/{name}`.
    pub fn path(&self) -> String {
        format!("{}/subscriptions/{}", self.topic, self.name)
    }

    /// Resource path of a rule under this subscription.
    pub fn rule_path(&self, rule_name: &str) -> String {
        format!("{}/rules/{}", self.path(), rule_name)
    }
}

impl fmt::Display for SubscriptionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}
