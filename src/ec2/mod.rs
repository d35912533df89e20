//! EC2 Query API client.
//!
//! The client turns an action plus its parameters into a form-encoded body,
//! signs it for the subscription's region and hands it to a [`Gateway`]. The
//! gateway's answer is returned untouched; callers decode what they need.

mod error;
mod instances;
mod parameters;
pub(crate) mod xml;

use chrono::Utc;
use tracing::debug;
use url::form_urlencoded;

use crate::gateway::Gateway;
use crate::signer::{self, SignatureQuery, SignedRequest};

pub use error::Ec2Error;
pub use instances::{Vm, VmNetwork, VmOperation, VmStatus};
pub use parameters::{ParameterSource, SubscriptionParameters};

/// Service name of the compute API.
pub const EC2_SERVICE: &str = "ec2";
/// Query API version sent with every compute call.
pub const EC2_API_VERSION: &str = "2016-11-15";
/// Service name of the security token API.
pub const STS_SERVICE: &str = "sts";
/// Query API version of the security token service.
pub const STS_API_VERSION: &str = "2011-06-15";
/// Region used when neither the subscription nor the configuration sets one.
pub const DEFAULT_REGION: &str = "eu-west-1";
/// Content type of every Query API body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

const REQUEST_PATH: &str = "/";

/// One Query API action and its parameters, in sending order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryAction {
    pairs: Vec<(String, String)>,
}

impl QueryAction {
    /// Starts a query for `action`.
    #[must_use]
    pub fn new(action: &str) -> Self {
        Self {
            pairs: vec![(String::from("Action"), action.to_owned())],
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Appends every pair of `extra`.
    #[must_use]
    pub fn params(mut self, extra: &[(String, String)]) -> Self {
        self.pairs.extend_from_slice(extra);
        self
    }

    /// The action name.
    #[must_use]
    pub fn action(&self) -> &str {
        self.pairs
            .first()
            .map_or("", |(_, action)| action.as_str())
    }

    /// Form-encodes the query followed by `Version=<version>`.
    #[must_use]
    pub fn body(&self, version: &str) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.append_pair("Version", version);
        serializer.finish()
    }
}

/// Settings shared by every call of one client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientSettings {
    /// Region used when a subscription has none.
    pub default_region: String,
    /// Compute API version.
    pub api_version: String,
    /// Base URL replacing `https://<host>` when set, for proxies and tests.
    pub endpoint: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.to_owned(),
            api_version: EC2_API_VERSION.to_owned(),
            endpoint: None,
        }
    }
}

/// Signs and sends Query API calls through a gateway.
#[derive(Clone, Debug)]
pub struct Ec2Client<G> {
    gateway: G,
    settings: ClientSettings,
}

impl<G: Gateway> Ec2Client<G> {
    /// Creates a client with default settings.
    #[must_use]
    pub fn new(gateway: G) -> Self {
        Self::with_settings(gateway, ClientSettings::default())
    }

    /// Creates a client with explicit settings.
    #[must_use]
    pub const fn with_settings(gateway: G, settings: ClientSettings) -> Self {
        Self { gateway, settings }
    }

    /// The underlying gateway.
    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The client settings.
    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Sends a compute API action for the subscription described by
    /// `parameters`.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Signature`] when the credentials or region are
    /// blank. Transport failures are not errors; they yield `Ok(None)`.
    pub async fn process(
        &self,
        parameters: &SubscriptionParameters,
        query: &QueryAction,
    ) -> Result<Option<String>, Ec2Error> {
        let body = query.body(&self.settings.api_version);
        self.send(parameters, EC2_SERVICE, query.action(), body)
            .await
    }

    pub(crate) async fn send(
        &self,
        parameters: &SubscriptionParameters,
        service: &str,
        action: &str,
        body: String,
    ) -> Result<Option<String>, Ec2Error> {
        let request = self.signed(parameters, service, body)?;
        debug!(service, action, url = %request.url, "sending provider action");
        Ok(self.gateway.execute(&request).await)
    }

    fn signed(
        &self,
        parameters: &SubscriptionParameters,
        service: &str,
        body: String,
    ) -> Result<SignedRequest, Ec2Error> {
        let query = SignatureQuery::builder()
            .path(REQUEST_PATH)
            .service(service)
            .region(parameters.region_or(&self.settings.default_region))
            .access_key(parameters.access_key_id.as_str())
            .secret_key(parameters.secret_access_key.as_str())
            .header("Content-Type", FORM_CONTENT_TYPE)
            .body(body)
            .build()?;
        let mut request = signer::sign_request(query, Utc::now())?;
        if let Some(endpoint) = &self.settings.endpoint {
            request.url = format!("{}{REQUEST_PATH}", endpoint.trim_end_matches('/'));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests;
