//! Namespace configuration and management API URL derivation.

use crate::error::ConfigError;
use crate::subscription::SubscriptionRef;
use serde::{Deserialize, Serialize};
use url::Url;

pub const NAMESPACE_ENV: &str = "AZURE_SERVICEBUS_NAMESPACE";
pub const HOST_SUFFIX_ENV: &str = "AZURE_SERVICEBUS_HOST_SUFFIX";
pub const DEFAULT_HOST_SUFFIX: &str = "servicebus.windows.net";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBusConfig {
    /// Namespace name, the first label of the host.
    pub namespace: String,
    pub host_suffix: String,
    pub scheme: String,
}

impl Default for ServiceBusConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ServiceBusConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            host_suffix: DEFAULT_HOST_SUFFIX.to_string(),
            scheme: "https".to_string(),
        }
    }

    /// Read `AZURE_SERVICEBUS_NAMESPACE` and `AZURE_SERVICEBUS_HOST_SUFFIX`.
    pub fn from_env() -> Self {
        let mut config = Self::new(std::env::var(NAMESPACE_ENV).unwrap_or_default());
        if let Ok(suffix) = std::env::var(HOST_SUFFIX_ENV) {
            config.host_suffix = suffix;
        }
        config
    }

    pub fn namespace_url(&self) -> Result<Url, ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::MissingNamespace);
        }
        let url = Url::parse(&format!(
            "{}://{}.{}/",
            self.scheme, self.namespace, self.host_suffix
        ))?;
        Ok(url)
    }

    /// `{namespace url}/{topic}/subscriptions/{subscription}/rules/{rule}`,
    /// each segment percent-encoded.
    pub fn rule_url(
        &self,
        subscription: &SubscriptionRef,
        rule_name: &str,
    ) -> Result<Url, ConfigError> {
        let mut url = self.namespace_url()?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ConfigError::NotABase(self.scheme.clone()))?;
            segments.pop_if_empty().extend([
                subscription.topic.as_str(),
                "subscriptions",
                subscription.name.as_str(),
                "rules",
                rule_name,
            ]);
        }
        Ok(url)
    }
}
