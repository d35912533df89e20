//! Test support utilities shared across unit and integration tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use url::form_urlencoded;

use crate::ec2::{ParameterSource, SubscriptionParameters};
use crate::gateway::{Gateway, GatewayFuture};
use crate::signer::SignedRequest;
use crate::snapshot::{Identity, IdentityDirectory};

pub use crate::snapshot::{MemoryTaskStore, StoreEvent};

#[derive(Clone, Debug)]
struct Rule {
    pairs: Vec<(String, String)>,
    response: Option<String>,
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<Rule>,
    requests: Vec<SignedRequest>,
}

/// Gateway double answering from scripted rules.
///
/// A rule matches a request when every one of its form pairs appears in the
/// request body. The first matching rule wins; requests matching no rule get
/// no response. Clones share the script and the request log.
#[derive(Clone, Debug, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
    /// Creates a gateway with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers requests carrying every pair of `pairs` with `body`.
    #[must_use]
    pub fn respond(self, pairs: &[(&str, &str)], body: &str) -> Self {
        self.push(pairs, Some(body.to_owned()));
        self
    }

    /// Answers requests carrying every pair of `pairs` with no response.
    #[must_use]
    pub fn fail(self, pairs: &[(&str, &str)]) -> Self {
        self.push(pairs, None);
        self
    }

    /// Answers requests carrying every pair of `pairs` with `response`.
    #[must_use]
    pub fn reply(self, pairs: &[(&str, &str)], response: Option<&str>) -> Self {
        self.push(pairs, response.map(str::to_owned));
        self
    }

    /// Every request sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<SignedRequest> {
        self.lock().requests.clone()
    }

    /// Decoded form pairs of every request sent so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<(String, String)>> {
        self.requests().iter().map(form_pairs).collect()
    }

    /// `Action` of every request sent so far.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|pairs| value(pairs, "Action").map(str::to_owned))
            .collect()
    }

    fn push(&self, pairs: &[(&str, &str)], response: Option<String>) {
        self.lock().rules.push(Rule {
            pairs: pairs
                .iter()
                .map(|(key, val)| ((*key).to_owned(), (*val).to_owned()))
                .collect(),
            response,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer(&self, request: &SignedRequest) -> Option<String> {
        let sent = form_pairs(request);
        let mut script = self.lock();
        script.requests.push(request.clone());
        script
            .rules
            .iter()
            .find(|rule| rule.pairs.iter().all(|pair| sent.contains(pair)))
            .and_then(|rule| rule.response.clone())
    }
}

impl Gateway for ScriptedGateway {
    fn execute<'a>(&'a self, request: &'a SignedRequest) -> GatewayFuture<'a> {
        let response = self.answer(request);
        Box::pin(async move { response })
    }
}

/// Decodes the form body of `request`.
#[must_use]
pub fn form_pairs(request: &SignedRequest) -> Vec<(String, String)> {
    request
        .body
        .as_deref()
        .map(|body| {
            form_urlencoded::parse(body.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// Returns the value of `key` in decoded form pairs.
#[must_use]
pub fn value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, found)| found.as_str())
}

/// Parameter source serving one subscription.
#[derive(Clone, Debug)]
pub struct StaticParameters {
    subscription: u32,
    parameters: SubscriptionParameters,
}

impl StaticParameters {
    /// Serves `parameters` for `subscription`.
    #[must_use]
    pub const fn new(subscription: u32, parameters: SubscriptionParameters) -> Self {
        Self {
            subscription,
            parameters,
        }
    }

    /// Sample credentials for instance `i-0123456789abcdef0`.
    #[must_use]
    pub fn sample(subscription: u32) -> Self {
        Self::new(
            subscription,
            SubscriptionParameters {
                access_key_id: String::from("AKIDEXAMPLE"),
                secret_access_key: String::from("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
                region: None,
                instance_id: String::from("i-0123456789abcdef0"),
            },
        )
    }

    /// The served parameters.
    #[must_use]
    pub const fn subscription_parameters(&self) -> &SubscriptionParameters {
        &self.parameters
    }
}

impl ParameterSource for StaticParameters {
    fn parameters(&self, subscription: u32) -> Option<SubscriptionParameters> {
        (subscription == self.subscription).then(|| self.parameters.clone())
    }
}

/// Directory double backed by a fixed set of identities.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    identities: BTreeMap<String, Identity>,
}

impl StaticDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user.
    #[must_use]
    pub fn with_user(mut self, login: &str, name: &str, company: &str) -> Self {
        self.identities.insert(
            login.to_owned(),
            Identity {
                login: login.to_owned(),
                name: Some(name.to_owned()),
                company: Some(company.to_owned()),
            },
        );
        self
    }
}

impl IdentityDirectory for StaticDirectory {
    fn find_by_login(&self, login: &str) -> Option<Identity> {
        self.identities.get(login).cloned()
    }
}
