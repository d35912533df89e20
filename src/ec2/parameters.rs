//! Per-subscription provider parameters.

use std::collections::BTreeMap;

/// Credentials and target instance attached to one subscription.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscriptionParameters {
    /// Access key identifier.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Region override; `None` falls back to the configured default.
    pub region: Option<String>,
    /// Instance the subscription manages.
    pub instance_id: String,
}

impl SubscriptionParameters {
    /// Returns the subscription's region, or `default` when none is set.
    #[must_use]
    pub fn region_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.region
            .as_deref()
            .filter(|region| !region.trim().is_empty())
            .unwrap_or(default)
    }
}

/// Source of subscription parameters, owned by the host application.
pub trait ParameterSource: Send + Sync {
    /// Returns the parameters of `subscription`, or `None` when it is unknown.
    fn parameters(&self, subscription: u32) -> Option<SubscriptionParameters>;
}

impl ParameterSource for BTreeMap<u32, SubscriptionParameters> {
    fn parameters(&self, subscription: u32) -> Option<SubscriptionParameters> {
        self.get(&subscription).cloned()
    }
}
