//! Service Bus subscription rules.
//!
//! A [`Rule`] routes messages on a topic subscription: a filter selects
//! messages, an action rewrites their properties. This crate holds the rule
//! entity and converts it to and from the Atom/XML entries of the management
//! REST API. Transport and authentication stay outside, behind the
//! [`service::RuleService`] and [`service::RuleFetcher`] traits.
//!
//! ```text
//! fetch entry XML ──► codec::decode_rule ──► Rule
//! Rule ──► codec::encode_rule ──► entry XML (create)
//! Rule::delete(service) ──► service.delete(rule) ──► bool
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod rule;
pub mod service;
pub mod subscription;

mod xml;

pub use config::ServiceBusConfig;
pub use error::{ConfigError, RuleError, ServiceError};
pub use filter::{CorrelationFilter, Descriptor, FieldMap, RuleAction, RuleFilter, SqlExpression};
pub use rule::{Rule, RuleBuilder};
pub use service::{InMemoryRuleService, RuleFetcher, RuleService};
pub use subscription::SubscriptionRef;

pub type Result<T> = std::result::Result<T, RuleError>;
