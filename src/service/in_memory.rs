//! In-process rule service.
//!
//! Keeps encoded entry documents per subscription, so every read goes through
//! the same decode path as a response from the management API.

use super::{RuleFetcher, RuleService};
use crate::codec;
use crate::error::ServiceError;
use crate::filter::{RuleAction, RuleFilter};
use crate::rule::Rule;
use crate::subscription::SubscriptionRef;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

type Documents = BTreeMap<SubscriptionRef, BTreeMap<String, String>>;

#[derive(Debug, Default)]
pub struct InMemoryRuleService {
    documents: RwLock<Documents>,
}

impl InMemoryRuleService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `rule` and return it as the service would echo it back.
    ///
    /// A rule without a filter gets `TrueFilter`, one without an action gets
    /// `EmptyRuleAction`, as the management API does.
    pub async fn create_rule(&self, rule: &Rule) -> Result<Rule, ServiceError> {
        let subscription = rule
            .subscription()
            .ok_or_else(|| ServiceError::MissingSubscription(rule.name().to_string()))?;
        rule.validate()?;

        let mut stored = rule.clone();
        if stored.filter().is_none() {
            stored.set_filter(RuleFilter::match_all());
        }
        if stored.action().is_none() {
            stored.set_action(RuleAction::Empty);
        }
        let document = codec::encode_rule(&stored)?;

        let mut documents = self.documents.write().await;
        let rules = documents.entry(subscription.clone()).or_default();
        if rules.contains_key(rule.name()) {
            return Err(ServiceError::Conflict(subscription.rule_path(rule.name())));
        }
        let created = codec::decode_rule(&document, Some(subscription.clone()))?;
        rules.insert(rule.name().to_string(), document);

        tracing::debug!(rule = %subscription.rule_path(rule.name()), "created rule");
        Ok(created)
    }

    /// All rules of a subscription, ordered by name.
    pub async fn list_rules(&self, subscription: &SubscriptionRef) -> Result<Vec<Rule>, ServiceError> {
        let rules: Vec<Rule> = {
            let documents = self.documents.read().await;
            match documents.get(subscription) {
                Some(rules) => rules
                    .values()
                    .map(|doc| codec::decode_rule(doc, Some(subscription.clone())))
                    .collect::<Result<_, _>>()?,
                None => Vec::new(),
            }
        };
        // Round-trip through a feed, the list-rules response shape.
        let feed = codec::encode_feed(&subscription.path(), &rules)?;
        let listed = codec::decode_feed(&feed, Some(subscription.clone()))?;

        tracing::debug!(subscription = %subscription, count = listed.len(), "listed rules");
        Ok(listed)
    }
}

#[async_trait]
impl RuleFetcher for InMemoryRuleService {
    type Error = ServiceError;

    async fn fetch_document(
        &self,
        subscription: &SubscriptionRef,
        name: &str,
    ) -> Result<String, ServiceError> {
        let documents = self.documents.read().await;
        documents
            .get(subscription)
            .and_then(|rules| rules.get(name))
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(subscription.rule_path(name)))
    }
}

#[async_trait]
impl RuleService for InMemoryRuleService {
    type Error = ServiceError;

    async fn delete(&self, rule: &Rule) -> Result<bool, ServiceError> {
        let subscription = rule
            .subscription()
            .ok_or_else(|| ServiceError::MissingSubscription(rule.name().to_string()))?;

        let mut documents = self.documents.write().await;
        let removed = documents
            .get_mut(subscription)
            .and_then(|rules| rules.remove(rule.name()))
            .is_some();

        tracing::debug!(rule = %subscription.rule_path(rule.name()), removed, "delete rule");
        Ok(removed)
    }
}
