//! Error types for rule decoding, encoding and the in-memory service.

use thiserror::Error;

/// Errors raised while decoding, encoding or validating a rule.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A required element (`title`, `Filter` or `Action`) is absent.
    #[error("malformed document: missing <{element}> element")]
    MalformedDocument { element: &'static str },

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("xml attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("invalid utf-8 in document: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural problem the tokenizer does not report itself.
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),
}

/// Errors raised by [`crate::service::InMemoryRuleService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("rule '{0}' has no subscription")]
    MissingSubscription(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Codec(#[from] RuleError),
}

/// Errors raised while deriving management API URLs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("service bus namespace is not configured")]
    MissingNamespace,

    #[error("rule '{0}' has no subscription")]
    MissingSubscription(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("url cannot be a base: {0}")]
    NotABase(String),
}
