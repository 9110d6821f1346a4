use crate::codec;
use crate::config::ServiceBusConfig;
use crate::error::{ConfigError, RuleError};
use crate::filter::{RuleAction, RuleFilter};
use crate::service::RuleService;
use crate::subscription::SubscriptionRef;
use serde::{Deserialize, Serialize};
use url::Url;

/// A message-routing rule attached to a topic subscription.
///
/// `name` and `subscription` identify the remote resource and are fixed once
/// built. `filter` and `action` may be replaced before the rule is sent back
/// to the service. `None` means the rule carries no filter (or action).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    name: String,
    subscription: Option<SubscriptionRef>,
    filter: Option<RuleFilter>,
    action: Option<RuleAction>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> RuleBuilder {
        RuleBuilder {
            name: name.into(),
            subscription: None,
            filter: None,
            action: None,
        }
    }

    /// Decode a rule entry fetched from the management API.
    pub fn from_document(
        xml: &str,
        subscription: Option<SubscriptionRef>,
    ) -> Result<Self, RuleError> {
        codec::decode_rule(xml, subscription)
    }

    /// Encode the Atom entry used to create this rule.
    pub fn to_document(&self) -> Result<String, RuleError> {
        codec::encode_rule(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscription(&self) -> Option<&SubscriptionRef> {
        self.subscription.as_ref()
    }

    pub fn filter(&self) -> Option<&RuleFilter> {
        self.filter.as_ref()
    }

    pub fn set_filter(&mut self, filter: impl Into<Option<RuleFilter>>) {
        self.filter = filter.into();
    }

    pub fn action(&self) -> Option<&RuleAction> {
        self.action.as_ref()
    }

    pub fn set_action(&mut self, action: impl Into<Option<RuleAction>>) {
        self.action = action.into();
    }

    /// Construction never validates; this is the only check a rule has.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.name.is_empty() {
            return Err(RuleError::InvalidRule("name is empty".to_string()));
        }
        Ok(())
    }

    /// Management API URL of this rule.
    pub fn resource_url(&self, config: &ServiceBusConfig) -> Result<Url, ConfigError> {
        let subscription = self
            .subscription
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSubscription(self.name.clone()))?;
        config.rule_url(subscription, &self.name)
    }

    /// Ask `service` to delete this rule and return its answer unchanged.
    ///
    /// The call is made exactly once; errors are the service's own.
    pub async fn delete<S>(&self, service: &S) -> Result<bool, S::Error>
    where
        S: RuleService + ?Sized,
    {
        tracing::debug!(rule = %self.name, subscription = ?self.subscription, "deleting rule");
        service.delete(self).await
    }
}

/// Builder for [`Rule`]; replaces a post-construction configuration callback.
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    name: String,
    subscription: Option<SubscriptionRef>,
    filter: Option<RuleFilter>,
    action: Option<RuleAction>,
}

impl RuleBuilder {
    pub fn subscription(mut self, subscription: SubscriptionRef) -> Self {
        self.subscription = Some(subscription);
        self
    }

    pub fn filter(mut self, filter: RuleFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn action(mut self, action: RuleAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn build(self) -> Rule {
        Rule {
            name: self.name,
            subscription: self.subscription,
            filter: self.filter,
            action: self.action,
        }
    }
}
