//! Service seams: the collaborators a [`Rule`] talks to.
//!
//! Transport, authentication and retry policy live behind these traits.
//! [`InMemoryRuleService`] is the in-process implementation.

pub mod in_memory;

pub use in_memory::InMemoryRuleService;

use crate::codec;
use crate::error::RuleError;
use crate::rule::Rule;
use crate::subscription::SubscriptionRef;
use async_trait::async_trait;

/// Deletes rules on the remote service.
#[async_trait]
pub trait RuleService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Remove the remote resource identified by `rule`.
    /// Returns whether the service reports the rule as deleted.
    async fn delete(&self, rule: &Rule) -> Result<bool, Self::Error>;
}

/// Retrieves rule entry documents from the remote service.
#[async_trait]
pub trait RuleFetcher: Send + Sync {
    type Error: std::error::Error + From<RuleError> + Send + Sync + 'static;

    /// Raw Atom entry for one rule.
    async fn fetch_document(
        &self,
        subscription: &SubscriptionRef,
        name: &str,
    ) -> Result<String, Self::Error>;

    /// Fetch and decode a rule; decode failures convert into `Self::Error`.
    async fn get_rule(
        &self,
        subscription: &SubscriptionRef,
        name: &str,
    ) -> Result<Rule, Self::Error> {
        let document = self.fetch_document(subscription, name).await?;
        Ok(codec::decode_rule(&document, Some(subscription.clone()))?)
    }
}
