//! Instance details, search, power operations and access validation.

use std::fmt;

use serde::Serialize;
use tracing::info;

use super::xml::{self, InstanceRecord};
use super::{Ec2Client, Ec2Error, QueryAction, STS_API_VERSION, STS_SERVICE, SubscriptionParameters};
use crate::gateway::Gateway;

/// Power operation requested on an instance.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VmOperation {
    /// Start a stopped instance.
    On,
    /// Force the instance off.
    Off,
    /// Stop the instance gracefully.
    Shutdown,
    /// Reboot the instance.
    Reboot,
    /// Hard reset, mapped to a reboot.
    Reset,
}

impl VmOperation {
    fn query(self, instance_id: &str) -> QueryAction {
        let query = match self {
            Self::Off => QueryAction::new("StopInstances").param("Force", "true"),
            Self::Shutdown => QueryAction::new("StopInstances"),
            Self::On => QueryAction::new("StartInstances"),
            Self::Reboot | Self::Reset => QueryAction::new("RebootInstances"),
        };
        query.param("InstanceId.1", instance_id)
    }
}

impl fmt::Display for VmOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Shutdown => "shutdown",
            Self::Reboot => "reboot",
            Self::Reset => "reset",
        };
        f.write_str(label)
    }
}

/// Coarse power state derived from the provider's state code.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmStatus {
    /// Pending or running.
    PoweredOn,
    /// Shutting down, terminated, stopping or stopped.
    PoweredOff,
}

impl VmStatus {
    /// Maps a provider state code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 | 16 => Some(Self::PoweredOn),
            32 | 48 | 64 | 80 => Some(Self::PoweredOff),
            _ => None,
        }
    }
}

/// Whether a state code denotes an ongoing transition.
const fn is_busy(code: i32) -> bool {
    matches!(code, 0 | 32 | 64)
}

/// One network attachment of an instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VmNetwork {
    /// `private` or `public`.
    #[serde(rename = "type")]
    pub kind: String,
    /// IP address.
    pub ip: String,
    /// DNS name, when the provider reports one.
    pub dns: Option<String>,
}

/// An instance as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Vm {
    /// Instance identifier.
    pub id: String,
    /// `Name` tag, or the identifier when untagged.
    pub name: String,
    /// `description` tag.
    pub description: Option<String>,
    /// Power state; `None` for codes with no mapping.
    pub status: Option<VmStatus>,
    /// Whether the instance is transitioning.
    pub busy: bool,
    /// Whether the instance is powered on.
    pub deployed: bool,
    /// VPC identifier.
    pub vpc: Option<String>,
    /// Availability zone.
    pub az: Option<String>,
    /// Network attachments; only filled by detail lookups.
    pub networks: Vec<VmNetwork>,
}

impl Vm {
    fn from_record(record: InstanceRecord, with_networks: bool) -> Self {
        let id = record.instance_id.clone().unwrap_or_default();
        let code = record
            .state_code
            .as_deref()
            .and_then(|code| code.trim().parse::<i32>().ok());
        let status = code.and_then(VmStatus::from_code);
        let networks = if with_networks {
            networks(&record)
        } else {
            Vec::new()
        };
        Self {
            name: tag(&record, "name").unwrap_or_else(|| id.clone()),
            description: tag(&record, "description"),
            id,
            status,
            busy: code.is_some_and(is_busy),
            deployed: status == Some(VmStatus::PoweredOn),
            vpc: record.vpc_id,
            az: record.availability_zone,
            networks,
        }
    }

    /// Returns the `"<name>,<id>"` label used in execution records.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{},{}", self.name, self.id)
    }
}

fn tag(record: &InstanceRecord, name: &str) -> Option<String> {
    record
        .tags
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.clone())
}

fn networks(record: &InstanceRecord) -> Vec<VmNetwork> {
    let mut networks = Vec::new();
    if let Some(ip) = &record.private_ip {
        networks.push(VmNetwork {
            kind: String::from("private"),
            ip: ip.clone(),
            dns: record.private_dns.clone(),
        });
    }
    if let Some(ip) = &record.public_ip {
        networks.push(VmNetwork {
            kind: String::from("public"),
            ip: ip.clone(),
            dns: record.public_dns.clone(),
        });
    }
    networks.extend(record.ipv6.iter().map(|ip| VmNetwork {
        kind: String::from("public"),
        ip: ip.clone(),
        dns: None,
    }));
    networks
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl<G: Gateway> Ec2Client<G> {
    async fn describe_instances(
        &self,
        parameters: &SubscriptionParameters,
        filter: &[(String, String)],
    ) -> Result<Vec<InstanceRecord>, Ec2Error> {
        let query = QueryAction::new("DescribeInstances").params(filter);
        let Some(response) = self.process(parameters, &query).await? else {
            return Ok(Vec::new());
        };
        xml::decode_instances(&response).map_err(|err| Ec2Error::DescribeInstancesFailed {
            message: err.to_string(),
        })
    }

    /// Returns the subscription's instance with its networks.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::InstanceNotFound`] when the instance is not
    /// visible, or [`Ec2Error::DescribeInstancesFailed`] when the listing is
    /// not XML.
    pub async fn vm_details(&self, parameters: &SubscriptionParameters) -> Result<Vm, Ec2Error> {
        let filter = [
            (String::from("Filter.1.Name"), String::from("instance-id")),
            (
                String::from("Filter.1.Value.1"),
                parameters.instance_id.clone(),
            ),
        ];
        self.describe_instances(parameters, &filter)
            .await?
            .into_iter()
            .next()
            .map(|record| Vm::from_record(record, true))
            .ok_or_else(|| Ec2Error::InstanceNotFound {
                instance_id: parameters.instance_id.clone(),
            })
    }

    /// Lists every visible instance whose name or identifier contains
    /// `criteria`, ignoring case, ordered by name then identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::DescribeInstancesFailed`] when the listing is not
    /// XML.
    pub async fn find_instances(
        &self,
        parameters: &SubscriptionParameters,
        criteria: &str,
    ) -> Result<Vec<Vm>, Ec2Error> {
        let mut vms = self
            .describe_instances(parameters, &[])
            .await?
            .into_iter()
            .map(|record| Vm::from_record(record, false))
            .filter(|vm| {
                contains_ignore_case(&vm.name, criteria) || contains_ignore_case(&vm.id, criteria)
            })
            .collect::<Vec<_>>();
        vms.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name).then_with(|| lhs.id.cmp(&rhs.id)));
        Ok(vms)
    }

    /// Runs a power operation on the subscription's instance and returns the
    /// instance label.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::OperationFailed`] when the response neither lists
    /// a state transition nor acknowledges the call, and propagates
    /// [`Ec2Client::vm_details`] failures.
    pub async fn execute(
        &self,
        parameters: &SubscriptionParameters,
        operation: VmOperation,
    ) -> Result<String, Ec2Error> {
        let label = self.vm_details(parameters).await?.label();
        let response = self
            .process(parameters, &operation.query(&parameters.instance_id))
            .await?;

        let transitions = response
            .as_deref()
            .map(xml::decode_transitions)
            .unwrap_or_default();
        for transition in &transitions {
            info!(
                instance = transition.instance_id.as_deref().unwrap_or_default(),
                from = transition.previous_code.as_deref().unwrap_or_default(),
                to = transition.current_code.as_deref().unwrap_or_default(),
                "instance state transition"
            );
        }

        if transitions.is_empty() && !xml::is_return_true(response.as_deref()) {
            return Err(Ec2Error::OperationFailed {
                operation,
                instance_id: parameters.instance_id.clone(),
            });
        }
        Ok(label)
    }

    /// Checks the credentials against the security token service.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Signature`] when the credentials are blank.
    pub async fn validate_access(&self, parameters: &SubscriptionParameters) -> Result<bool, Ec2Error> {
        let body = QueryAction::new("GetCallerIdentity").body(STS_API_VERSION);
        let response = self
            .send(parameters, STS_SERVICE, "GetCallerIdentity", body)
            .await?;
        Ok(response.is_some())
    }
}
